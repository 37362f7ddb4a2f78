use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use phonebook_core::models::DirectoryId;
use phonebook_core::quick_action::{QuickActionOutcome, QuickActionResolver};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    resolver: Arc<QuickActionResolver>,
}

impl AppState {
    pub fn new(resolver: QuickActionResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/directories/{id}/quick-add/{guid}", get(quick_add))
        .route("/directories/{id}/quick-update/{guid}", get(quick_update))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

async fn quick_add(
    State(state): State<AppState>,
    Path((id, guid)): Path<(DirectoryId, String)>,
) -> Result<String, AppError> {
    let outcome = state.resolver.apply_create(id, &guid).await?;
    log_outcome("quick_add", id, &guid, &outcome);
    Ok(outcome.to_string())
}

async fn quick_update(
    State(state): State<AppState>,
    Path((id, guid)): Path<(DirectoryId, String)>,
) -> Result<String, AppError> {
    let outcome = state.resolver.apply_update(id, &guid).await?;
    log_outcome("quick_update", id, &guid, &outcome);
    Ok(outcome.to_string())
}

fn log_outcome(endpoint: &str, directory_id: DirectoryId, guid: &str, outcome: &QuickActionOutcome) {
    tracing::info!(endpoint, directory_id, guid, outcome = ?outcome, "Quick action handled");
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use phonebook_core::directory::{DirectoryConnector, DirectoryError, DirectorySession};
    use phonebook_core::models::{DirectoryConfig, RemoteRecord};
    use phonebook_core::services::DatabaseService;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use super::*;

    const GUID: &str = "{d4c3b2a1-f6e5-1807-293a-4b5c6d7e8f90}";
    const ENCODED_GUID: &str = "%7Bd4c3b2a1-f6e5-1807-293a-4b5c6d7e8f90%7D";

    /// Serves a fixed snapshot, or refuses every connection
    struct StubDirectory {
        records: Option<Vec<RemoteRecord>>,
    }

    struct StubSession(Vec<RemoteRecord>);

    #[async_trait]
    impl DirectoryConnector for StubDirectory {
        async fn connect(
            &self,
            _config: &DirectoryConfig,
        ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
            match &self.records {
                Some(records) => Ok(Box::new(StubSession(records.clone()))),
                None => Err(DirectoryError::Network("connection refused".to_string())),
            }
        }
    }

    #[async_trait]
    impl DirectorySession for StubSession {
        async fn fetch_all(
            &mut self,
            _search_filter: &str,
            _attributes: &[&str],
        ) -> Result<Vec<RemoteRecord>, DirectoryError> {
            Ok(self.0.clone())
        }

        async fn disconnect(&mut self) {}
    }

    async fn router(records: Option<Vec<RemoteRecord>>) -> (Router, DatabaseService, DirectoryId) {
        let db = DatabaseService::open_in_memory().unwrap();
        let directory = db
            .create_directory(&DirectoryConfig::new("corp", "dc1", "dc=corp", "svc", "pw"))
            .await
            .unwrap();
        let resolver = QuickActionResolver::new(db.clone(), Arc::new(StubDirectory { records }));
        (app_router(AppState::new(resolver)), db, directory.id)
    }

    fn ada(mail: &str) -> RemoteRecord {
        RemoteRecord {
            display_name: Some("Ada".to_string()),
            mail: Some(mail.to_string()),
            ..RemoteRecord::new(GUID)
        }
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let (router, _, _) = router(Some(Vec::new())).await;
        let (status, body) = get(&router, "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["timestamp"].as_i64().is_some());
    }

    #[tokio::test]
    async fn quick_add_creates_once() {
        let (router, db, id) = router(Some(vec![ada("ada@corp")])).await;
        let uri = format!("/directories/{id}/quick-add/{ENCODED_GUID}");

        assert_eq!(get(&router, &uri).await, (StatusCode::OK, "Contact added.".to_string()));
        let (status, body) = get(&router, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Already up to date; nothing to do.");
        assert_eq!(db.list_contacts(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quick_update_without_local_contact() {
        let (router, _, id) = router(Some(vec![ada("ada@corp")])).await;
        let (status, body) = get(&router, &format!("/directories/{id}/quick-update/{ENCODED_GUID}")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "No local contact has this GUID.");
    }

    #[tokio::test]
    async fn quick_add_for_vanished_entry() {
        let (router, _, id) = router(Some(Vec::new())).await;
        let (status, body) = get(&router, &format!("/directories/{id}/quick-add/{ENCODED_GUID}")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "The directory no longer has this entry.");
    }

    #[tokio::test]
    async fn unknown_directory_is_404() {
        let (router, _, _) = router(Some(Vec::new())).await;
        let (status, _) = get(&router, &format!("/directories/999/quick-add/{ENCODED_GUID}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unreachable_directory_is_502() {
        let (router, _, id) = router(None).await;
        let (status, body) = get(&router, &format!("/directories/{id}/quick-add/{ENCODED_GUID}")).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("connection refused"));
    }
}
