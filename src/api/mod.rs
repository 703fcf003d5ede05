mod handlers;
mod middleware;

pub use middleware::SecurityConfig;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::panel::Panel;

/// Router with no authentication, as used for local runs and tests.
pub fn create_router(panel: Panel) -> Router {
    create_router_with_security(panel, SecurityConfig::disabled())
}

pub fn create_router_with_security(panel: Panel, security: SecurityConfig) -> Router {
    let api = Router::new()
        // Session lifecycle
        .route("/session", get(handlers::get_session))
        .route("/session/connect", post(handlers::connect))
        .route("/session/refresh", post(handlers::refresh))
        .route("/session/save", post(handlers::save))
        .route("/session/disconnect", post(handlers::disconnect))
        .route("/session/missing", get(handlers::list_missing))
        .route("/session/missing/create", post(handlers::create_missing))
        // Models
        .route("/models", get(handlers::list_models))
        .route("/models/raw", get(handlers::list_raw_models))
        .route("/models/import", post(handlers::import_models))
        .route("/models/export", get(handlers::export_models))
        .route("/models/{id}/edit", put(handlers::edit_model))
        // Selection
        .route("/selection", get(handlers::get_selection))
        .route("/selection", put(handlers::set_selection))
        // Patches
        .route("/patches", get(handlers::list_patches))
        .route("/patches/activate", post(handlers::activate_patch))
        .route("/patches/deactivate", post(handlers::deactivate_patch))
        .route("/patches/reset", post(handlers::reset_patches))
        .route("/patches/icon", put(handlers::apply_icon_patch))
        // Prompts
        .route("/prompts", post(handlers::build_prompt))
        .route_layer(from_fn_with_state(
            security.clone(),
            middleware::auth_middleware,
        ))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(security.cors_layer())
        .with_state(panel)
}
