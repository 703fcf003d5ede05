use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use llm_panel::config::PanelSettings;
use llm_panel::models::*;
use llm_panel::panel::{Panel, PanelError};
use llm_panel::patch::{IconCatalog, IconPatchConfig, ModelEdit, DEFAULT_PATCH, ICON_PATCH};
use llm_panel::storage::{self, KeyValueStore, MemoryStore};
use serde_json::json;

fn setup() -> (Panel, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let panel = Panel::new(storage.clone(), PanelSettings::default());
    (panel, storage)
}

/// Catalog with m1 and m2 in the base listing but only m1 in the full one.
async fn catalog() -> MockServer {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/models/base");
            then.status(200)
                .json_body(json!({ "data": [{ "id": "m1" }, { "id": "m2" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/models/base");
            then.status(200).json_body(json!({
                "data": [{ "id": "m1", "name": "One", "owned_by": "openai" }]
            }));
        })
        .await;
    server
}

fn config_for(server: &MockServer) -> ApiConfig {
    ApiConfig::new(server.base_url(), "tok")
}

mod connect {
    use super::*;

    #[tokio::test]
    async fn rejects_incomplete_credentials_without_a_request() {
        let (panel, _) = setup();

        let err = panel.connect(ApiConfig::new("", "tok")).await.unwrap_err();
        assert!(matches!(err, PanelError::Connection(_)));

        let err = panel
            .connect(ApiConfig::new("http://127.0.0.1:1", "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, PanelError::Connection(_)));
        assert_eq!(panel.phase(), SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn loads_the_reconciled_list_and_remembers_credentials() {
        let server = catalog().await;
        let (panel, storage) = setup();

        let summary = panel.connect(config_for(&server)).await.unwrap();

        assert_eq!(summary.models, 1);
        assert_eq!(summary.missing, vec![Model::new("m2")]);
        assert_eq!(panel.phase(), SessionPhase::Connected);
        assert_eq!(panel.raw_models()[0].name, "One");
        assert_eq!(panel.stored_config(), Some(config_for(&server)));
        assert!(storage::is_marked_connected(storage.as_ref()).unwrap());
    }

    #[tokio::test]
    async fn applies_the_default_patch_to_the_effective_list() {
        let server = catalog().await;
        let (panel, _) = setup();
        panel.connect(config_for(&server)).await.unwrap();

        let effective = panel.effective_models();
        assert_eq!(effective[0].meta, Some(ModelMeta::fallback()));
        assert!(panel.raw_models()[0].meta.is_none());
    }

    #[tokio::test]
    async fn leaves_state_untouched_when_the_fetch_fails() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(500);
            })
            .await;
        let (panel, storage) = setup();

        let err = panel.connect(config_for(&server)).await.unwrap_err();

        assert!(matches!(err, PanelError::Fetch(_)));
        assert_eq!(panel.phase(), SessionPhase::Disconnected);
        assert!(panel.raw_models().is_empty());
        assert!(storage.get(storage::CONFIG_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn reports_unparseable_listings_as_parse_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).body("not json");
            })
            .await;
        let (panel, _) = setup();

        let err = panel.connect(config_for(&server)).await.unwrap_err();
        assert!(matches!(err, PanelError::Parse(_)));
    }

    #[tokio::test]
    async fn is_superseded_by_a_disconnect_while_in_flight() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200)
                    .delay(Duration::from_millis(500))
                    .json_body(json!({ "data": [{ "id": "m1" }] }));
            })
            .await;
        let (panel, _) = setup();

        let pending = tokio::spawn({
            let panel = panel.clone();
            let config = config_for(&server);
            async move { panel.connect(config).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        panel.disconnect();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(PanelError::Superseded)));
        assert!(panel.raw_models().is_empty());
        assert_eq!(panel.phase(), SessionPhase::Disconnected);
    }
}

mod refresh {
    use super::*;

    #[tokio::test]
    async fn requires_a_connection() {
        let (panel, _) = setup();
        assert!(matches!(
            panel.refresh().await.unwrap_err(),
            PanelError::NotConnected
        ));
    }

    #[tokio::test]
    async fn keeps_the_previous_list_on_failure() {
        let server = MockServer::start_async().await;
        let base = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/models/base");
                then.status(200).json_body(json!({ "data": [{ "id": "m1" }] }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/models/base");
                then.status(200).json_body(json!({ "data": [{ "id": "m1" }] }));
            })
            .await;
        let (panel, _) = setup();
        panel.connect(config_for(&server)).await.unwrap();

        base.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/models/base");
                then.status(503);
            })
            .await;

        assert!(panel.refresh().await.is_err());
        assert_eq!(panel.raw_models(), vec![Model::new("m1")]);
        assert_eq!(panel.phase(), SessionPhase::Connected);
    }

    #[tokio::test]
    async fn clears_the_selection() {
        let server = catalog().await;
        let (panel, _) = setup();
        panel.connect(config_for(&server)).await.unwrap();
        panel.select(Some("m1")).unwrap();

        panel.refresh().await.unwrap();

        assert!(panel.selected().is_none());
        assert_eq!(panel.raw_models().len(), 1);
    }
}

mod save {
    use super::*;

    #[tokio::test]
    async fn requires_a_connection() {
        let (panel, _) = setup();
        assert!(matches!(
            panel.save().await.unwrap_err(),
            PanelError::NotConnected
        ));
    }

    #[tokio::test]
    async fn refuses_an_empty_list() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).json_body(json!({ "data": [] }));
            })
            .await;
        let (panel, _) = setup();
        panel.connect(config_for(&server)).await.unwrap();

        assert!(matches!(
            panel.save().await.unwrap_err(),
            PanelError::NothingToSave
        ));
    }

    #[tokio::test]
    async fn submits_the_effective_list_and_backs_it_up() {
        let server = catalog().await;
        let update = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/models/model/update")
                    .query_param("id", "m1")
                    .body_contains("/static/favicon.png");
                then.status(200);
            })
            .await;
        let (panel, storage) = setup();
        panel.connect(config_for(&server)).await.unwrap();

        let report = panel.save().await.unwrap();

        assert_eq!(report.success, 1);
        assert_eq!(report.failed, 0);
        update.assert_async().await;
        assert_eq!(panel.phase(), SessionPhase::Connected);

        let latest = storage::load_latest_batch(storage.as_ref()).unwrap().unwrap();
        assert_eq!(latest, panel.effective_models());
        let backups = storage
            .keys()
            .unwrap()
            .into_iter()
            .filter(|k| k.starts_with(storage::BACKUP_PREFIX))
            .count();
        assert_eq!(backups, 1);
    }

    #[tokio::test]
    async fn saves_imported_models_with_active_edits() {
        let server = catalog().await;
        let update = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/models/model/update")
                    .query_param("id", "x1")
                    .body_contains("\"name\":\"Edited\"");
                then.status(200);
            })
            .await;
        let (panel, _) = setup();
        panel.connect(config_for(&server)).await.unwrap();
        panel.import_models(vec![Model::new("x1").with_name("Imported")]);
        panel
            .edit_model(
                "x1",
                ModelEdit {
                    name: Some("Edited".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let report = panel.save().await.unwrap();

        assert_eq!(report.success, 1);
        update.assert_async().await;
    }
}

mod create_missing {
    use super::*;

    #[tokio::test]
    async fn moves_created_models_into_the_list() {
        let server = catalog().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/models/create")
                    .body_contains("\"id\":\"m2\"");
                then.status(200).json_body(json!({ "id": "m2", "name": "Two" }));
            })
            .await;
        let (panel, _) = setup();
        panel.connect(config_for(&server)).await.unwrap();

        let report = panel.create_missing().await.unwrap();

        assert_eq!(report.created.len(), 1);
        assert!(panel.missing_models().is_empty());
        let ids: Vec<String> = panel.raw_models().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn keeps_failed_models_missing() {
        let server = catalog().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/models/create");
                then.status(500).body("nope");
            })
            .await;
        let (panel, _) = setup();
        panel.connect(config_for(&server)).await.unwrap();

        let report = panel.create_missing().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(panel.missing_models(), vec![Model::new("m2")]);
        assert_eq!(panel.raw_models().len(), 1);
    }
}

mod overlapping_writes {
    use super::*;

    /// Connected panel whose pending create for m2 answers after 300ms.
    async fn slow_create() -> (MockServer, Panel) {
        let server = catalog().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/models/create");
                then.status(200)
                    .delay(Duration::from_millis(300))
                    .json_body(json!({ "id": "m2", "name": "Two" }));
            })
            .await;
        let (panel, _) = setup();
        panel.connect(config_for(&server)).await.unwrap();
        (server, panel)
    }

    #[tokio::test]
    async fn create_does_not_repopulate_a_disconnected_panel() {
        let (_server, panel) = slow_create().await;

        let pending = tokio::spawn({
            let panel = panel.clone();
            async move { panel.create_missing().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        panel.disconnect();

        let report = pending.await.unwrap().unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(panel.phase(), SessionPhase::Disconnected);
        assert!(panel.raw_models().is_empty());
        assert!(panel.missing_models().is_empty());
    }

    #[tokio::test]
    async fn create_keeps_the_missing_set_of_a_newer_refresh() {
        let server = MockServer::start_async().await;
        let base = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/models/base");
                then.status(200)
                    .json_body(json!({ "data": [{ "id": "m1" }, { "id": "m2" }] }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/models/base");
                then.status(200).json_body(json!({ "data": [{ "id": "m1" }] }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/models/create");
                then.status(200)
                    .delay(Duration::from_millis(300))
                    .json_body(json!({ "id": "m2" }));
            })
            .await;
        let (panel, _) = setup();
        panel.connect(config_for(&server)).await.unwrap();

        let pending = tokio::spawn({
            let panel = panel.clone();
            async move { panel.create_missing().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        base.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/models/base");
                then.status(200).json_body(json!({
                    "data": [{ "id": "m1" }, { "id": "m2" }, { "id": "m3" }]
                }));
            })
            .await;
        panel.refresh().await.unwrap();

        pending.await.unwrap().unwrap();

        let missing: Vec<String> = panel.missing_models().into_iter().map(|m| m.id).collect();
        assert_eq!(missing, vec!["m2", "m3"]);
        assert_eq!(panel.raw_models(), vec![Model::new("m1")]);
    }

    #[tokio::test]
    async fn import_is_not_overwritten_by_an_older_refresh() {
        let server = MockServer::start_async().await;
        let listing = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).json_body(json!({ "data": [{ "id": "m1" }] }));
            })
            .await;
        let (panel, _) = setup();
        panel.connect(config_for(&server)).await.unwrap();

        listing.delete_async().await;
        let slow_listing = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200)
                    .delay(Duration::from_millis(300))
                    .json_body(json!({ "data": [{ "id": "m1" }] }));
            })
            .await;

        let pending = tokio::spawn({
            let panel = panel.clone();
            async move { panel.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        panel.import_models(vec![Model::new("x1")]);

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(PanelError::Superseded)));
        assert_eq!(panel.raw_models(), vec![Model::new("x1")]);
        assert_eq!(panel.phase(), SessionPhase::Connected);
        slow_listing.assert_hits_async(2).await;
    }
}

mod disconnect {
    use super::*;

    #[tokio::test]
    async fn wipes_the_session_and_is_idempotent() {
        let server = catalog().await;
        let (panel, storage) = setup();
        panel.connect(config_for(&server)).await.unwrap();
        panel.select(Some("m1")).unwrap();

        panel.disconnect();
        panel.disconnect();

        assert_eq!(panel.phase(), SessionPhase::Disconnected);
        assert!(panel.raw_models().is_empty());
        assert!(panel.missing_models().is_empty());
        assert!(panel.selected().is_none());
        assert!(panel.stored_config().is_none());
        assert!(!storage::is_marked_connected(storage.as_ref()).unwrap());
    }
}

mod working_set {
    use super::*;

    #[tokio::test]
    async fn lists_patches_in_registration_order() {
        let (panel, _) = setup();
        panel.apply_icon_config(IconPatchConfig::default(), IconCatalog::builtin());

        assert_eq!(
            panel.patches(),
            vec![
                (DEFAULT_PATCH.to_string(), true),
                (ICON_PATCH.to_string(), true),
            ]
        );

        panel.reset_active();
        assert!(panel.patches().iter().all(|(_, active)| !active));
    }

    #[tokio::test]
    async fn rejects_edits_and_selection_of_unknown_models() {
        let (panel, _) = setup();
        panel.import_models(vec![Model::new("a")]);

        assert!(matches!(
            panel.edit_model("zz", ModelEdit::default()),
            Err(PanelError::UnknownModel(_))
        ));
        assert!(matches!(
            panel.select(Some("zz")),
            Err(PanelError::UnknownModel(_))
        ));
        assert_eq!(panel.select(None).unwrap(), None);
    }

    #[tokio::test]
    async fn reports_status() {
        let server = catalog().await;
        let (panel, _) = setup();
        panel.connect(config_for(&server)).await.unwrap();
        panel.select(Some("m1")).unwrap();

        let status = panel.status();
        assert_eq!(status.phase, SessionPhase::Connected);
        assert_eq!(status.base_url.as_deref(), Some(server.base_url().as_str()));
        assert_eq!(status.models, 1);
        assert_eq!(status.missing, 1);
        assert_eq!(status.selected.as_deref(), Some("m1"));
        assert_eq!(status.active_patches, vec![DEFAULT_PATCH]);
    }
}
