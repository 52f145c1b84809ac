use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::config::GameConfig;
use crate::eligibility::EligibilityChecker;
use crate::leaderboard::LeaderboardAggregator;
use crate::notifications::{Broadcaster, Notifier};
use crate::prize_round::PrizeRoundManager;
use crate::questions::{QuestionSessionManager, SessionRegistry};
use crate::scoring::ScoringEngine;
use crate::storage::GameStore;
use crate::user::UserService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GameConfig>,
    pub store: Arc<dyn GameStore>,
    pub users: Arc<UserService>,
    pub questions: Arc<QuestionSessionManager>,
    pub leaderboard: Arc<LeaderboardAggregator>,
    pub prize_round: Arc<PrizeRoundManager>,
    pub broadcaster: Broadcaster,
}

impl AppState {
    /// Wires every service against one store and one notifier
    pub fn new(
        config: Arc<GameConfig>,
        store: Arc<dyn GameStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let broadcaster = Broadcaster::new(notifier);
        let eligibility = Arc::new(EligibilityChecker::new(store.clone(), config.clone()));
        let leaderboard = Arc::new(LeaderboardAggregator::new(
            store.clone(),
            config.leaderboard.clone(),
        ));
        let questions = Arc::new(QuestionSessionManager::new(
            store.clone(),
            eligibility.clone(),
            ScoringEngine::new(&config),
            Arc::new(SessionRegistry::default()),
        ));
        let prize_round = Arc::new(PrizeRoundManager::new(
            store.clone(),
            leaderboard.clone(),
            eligibility,
            broadcaster.clone(),
            config.clone(),
        ));

        Self {
            users: Arc::new(UserService::new(store.clone())),
            config,
            store,
            questions,
            leaderboard,
            prize_round,
            broadcaster,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

/// Liveness probe reporting backend reachability
///
/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    if state.store.health_check().await {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "writable": state.store.has_write_access()
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::AppStateBuilder;
    use super::*;
    use crate::storage::InMemoryGameStore;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_write_access() {
        let app_state = AppStateBuilder::new()
            .with_store(Arc::new(InMemoryGameStore::new().read_only()))
            .build();
        let app = Router::new()
            .route("/health", get(health))
            .with_state(app_state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["writable"], false);
    }

    #[tokio::test]
    async fn test_health_unavailable_when_store_unreachable() {
        let store = Arc::new(InMemoryGameStore::new());
        store.set_reachable(false);
        let app = Router::new()
            .route("/health", get(health))
            .with_state(AppStateBuilder::new().with_store(store).build());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::BadRequest("x".to_string()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Internal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
