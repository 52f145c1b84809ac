use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::models::{IsoWeek, LeaderboardEntry};
use super::service::UserPosition;
use crate::shared::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
    /// Adds the caller's own position to the response
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub week: IsoWeek,
    pub entries: Vec<LeaderboardEntry>,
    pub position: Option<UserPosition>,
}

/// HTTP handler for the weekly leaderboard
///
/// GET /leaderboard?limit=&user_id=
#[instrument(name = "get_leaderboard", skip(state))]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let entries = match query.limit {
        Some(0) => return Err(AppError::BadRequest("limit must be positive".to_string())),
        Some(limit) => {
            let limit = limit.min(state.config.leaderboard.top_count);
            state.leaderboard.get_current_leaderboard(limit).await
        }
        None => state.leaderboard.get_display_leaderboard().await,
    };

    let position = match query.user_id {
        Some(user_id) => {
            let user = state.users.get_user(user_id).await?;
            Some(
                state
                    .leaderboard
                    .user_position(user.id, user.weekly_points)
                    .await,
            )
        }
        None => None,
    };

    info!(entries = entries.len(), "Leaderboard served");
    Ok(Json(LeaderboardResponse {
        week: IsoWeek::current(),
        entries,
        position,
    }))
}
