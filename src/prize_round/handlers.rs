use axum::{extract::State, Json};
use tracing::{debug, instrument};

use super::models::RoundStatus;
use crate::shared::AppState;

/// HTTP handler for the live prize round state
///
/// GET /prize-round
#[instrument(name = "get_prize_round_status", skip(state))]
pub async fn get_prize_round_status(State(state): State<AppState>) -> Json<RoundStatus> {
    let status = state.prize_round.status().await;
    debug!(active = status.active, "Prize round status served");
    Json(status)
}
