//! HTTP client for the remote model catalog.
//!
//! Every request carries the bearer token from [`ApiConfig`]. Batch
//! operations fan out with a bounded number of requests in flight and record
//! each entry's outcome separately.

use futures::stream::{self, StreamExt};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::config::PanelSettings;
use crate::models::*;
use crate::reconcile::reconcile;

const BASE_LIST_PATH: &str = "/api/v1/models/base";
const FULL_LIST_PATH: &str = "/api/models/base";
const UPDATE_PATH: &str = "/api/v1/models/model/update";
const CREATE_PATH: &str = "/api/v1/models/create";

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: token missing or invalid")]
    Unauthorized,

    #[error("Server error: {0}")]
    Server(String),
}

/// Listings come back either bare or wrapped in `{"data": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ModelListing {
    Wrapped { data: Vec<Model> },
    Bare(Vec<Model>),
}

impl ModelListing {
    fn into_models(self) -> Vec<Model> {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(models) => models,
        }
    }
}

/// HTTP client for one remote catalog.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    base_url: String,
    token: String,
    batch_concurrency: usize,
    client: Client,
}

impl CatalogClient {
    pub fn new(config: &ApiConfig, settings: &PanelSettings) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            batch_concurrency: settings.batch_concurrency.max(1),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with the bearer header.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url).bearer_auth(&self.token)
    }

    /// Convert non-2xx statuses to errors and decode the body.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(status_error(status, body))
        }
    }

    /// Like `handle_response`, for endpoints whose body is not needed.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<(), ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(status_error(status, body))
        }
    }

    // ============================================================
    // Listings
    // ============================================================

    /// The restrictive listing deciding which ids should exist.
    pub async fn fetch_base_list(&self) -> Result<Vec<Model>, ClientError> {
        let response = self.request(Method::GET, BASE_LIST_PATH).send().await?;
        let listing: ModelListing = self.handle_response(response).await?;
        Ok(listing.into_models())
    }

    /// The broader listing carrying full per-model data.
    pub async fn fetch_full_list(&self) -> Result<Vec<Model>, ClientError> {
        let response = self.request(Method::GET, FULL_LIST_PATH).send().await?;
        let listing: ModelListing = self.handle_response(response).await?;
        Ok(listing.into_models())
    }

    /// Fetch both listings concurrently and reconcile them.
    ///
    /// Either request failing fails the whole fetch.
    pub async fn fetch_catalog(&self) -> Result<Reconciliation, ClientError> {
        let (base, full) = tokio::try_join!(self.fetch_base_list(), self.fetch_full_list())?;
        tracing::debug!(
            "Fetched {} base and {} full models from {}",
            base.len(),
            full.len(),
            self.base_url
        );
        Ok(reconcile(&base, &full))
    }

    // ============================================================
    // Writes
    // ============================================================

    /// Push one model's current state.
    pub async fn update_model(&self, model: &Model) -> Result<(), ClientError> {
        let response = self
            .request(Method::POST, UPDATE_PATH)
            .query(&[("id", model.id.as_str())])
            .json(model)
            .send()
            .await?;
        self.handle_empty_response(response).await
    }

    /// Create a model from the default skeleton overlaid with `model`.
    pub async fn create_model(&self, model: &Model) -> Result<Model, ClientError> {
        let body = model.creation_body()?;
        let response = self
            .request(Method::POST, CREATE_PATH)
            .json(&body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Save every model, at most `batch_concurrency` at a time.
    ///
    /// A failing entry is recorded and does not stop the others; nothing is
    /// rolled back.
    pub async fn save_models(&self, models: &[Model]) -> SaveReport {
        let outcomes: Vec<(String, Result<(), ClientError>)> = stream::iter(models.to_vec())
            .map(|model| {
                let client = self.clone();
                async move {
                    let outcome = client.update_model(&model).await;
                    (model.id, outcome)
                }
            })
            .buffer_unordered(self.batch_concurrency)
            .collect()
            .await;

        let mut report = SaveReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    report.success += 1;
                    tracing::debug!("Saved model {}", id);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("Failed to save model {}: {}", id, e);
                    report.errors.insert(id, e.to_string());
                }
            }
        }
        report
    }

    /// Create every model, at most `batch_concurrency` at a time, isolating
    /// failures per model. Created models keep the input order.
    pub async fn create_models(&self, models: &[Model]) -> CreateReport {
        let mut outcomes: Vec<(usize, String, Result<Model, ClientError>)> =
            stream::iter(models.to_vec().into_iter().enumerate())
                .map(|(index, model)| {
                    let client = self.clone();
                    async move {
                        let outcome = client.create_model(&model).await;
                        (index, model.id, outcome)
                    }
                })
                .buffer_unordered(self.batch_concurrency)
                .collect()
                .await;
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut report = CreateReport::default();
        for (_, id, outcome) in outcomes {
            match outcome {
                Ok(model) => report.created.push(model),
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("Failed to create model {}: {}", id, e);
                    report.errors.insert(id, e.to_string());
                }
            }
        }
        report
    }
}

fn status_error(status: StatusCode, body: String) -> ClientError {
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(body),
        StatusCode::BAD_REQUEST => ClientError::BadRequest(body),
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        _ => ClientError::Server(format!("{}: {}", status, body)),
    }
}
