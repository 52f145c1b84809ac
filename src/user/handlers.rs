use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::{info, instrument};

use super::models::User;
use crate::shared::{AppError, AppState};

/// Request payload for first contact with the bot
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: i64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub referral_code: Option<String>,
}

/// HTTP handler for registering a user
///
/// POST /users
/// Idempotent: a known user is returned as stored
#[instrument(name = "register_user", skip(state))]
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .users
        .register(
            request.user_id,
            &request.display_name,
            request.referral_code.as_deref(),
        )
        .await?;

    info!(user_id = %user.id, "User registration handled");
    Ok(Json(user))
}
