use axum::{extract::State, Json};
use tracing::{info, instrument};

use super::types::{AnswerOutcome, AnswerRequest, QuestionOutcome, QuestionRequest};
use crate::shared::{AppError, AppState};

/// HTTP handler for requesting a question
///
/// POST /questions
/// Prize mode follows the live round state
#[instrument(name = "request_question", skip(state))]
pub async fn request_question(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<QuestionOutcome>, AppError> {
    let user = state.users.get_user(request.user_id).await?;
    let mode = state.prize_round.current_mode().await;

    let outcome = match request.retry_question_id.as_deref() {
        Some(question_id) => {
            state
                .questions
                .retry_question(&user, question_id, mode)
                .await
        }
        None => state.questions.get_question_for_user(&user, mode).await,
    };

    info!(user_id = %user.id, mode = %mode, "Question request handled");
    Ok(Json(outcome))
}

/// HTTP handler for submitting an answer
///
/// POST /answers
/// Scored under the mode the question was issued in
#[instrument(name = "submit_answer", skip(state))]
pub async fn submit_answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerOutcome>, AppError> {
    if request.selected_option.trim().is_empty() {
        return Err(AppError::BadRequest("selected_option is required".to_string()));
    }

    let mut user = state.users.get_user(request.user_id).await?;

    let outcome = state
        .questions
        .process_answer(&mut user, &request.question_id, &request.selected_option)
        .await;

    Ok(Json(outcome))
}
