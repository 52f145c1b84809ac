use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::models::{ActiveQuestionSession, AnswerOption};
use crate::eligibility::Rejection;
use crate::scoring::{PointType, PointsBreakdown, RoundMode};
use crate::user::User;

/// Request payload for drawing a question, or retrying a missed prize question
#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub user_id: i64,
    #[serde(default)]
    pub retry_question_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub user_id: i64,
    pub question_id: String,
    pub selected_option: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledOption {
    pub label: AnswerOption,
    pub text: String,
}

/// What the transport renders when a question is delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub question_id: String,
    pub category: String,
    pub text: String,
    pub options: Vec<LabeledOption>,
    pub time_limit_seconds: u32,
    pub sponsor: Option<String>,
    pub attempt_number: i32,
    pub mode: RoundMode,
}

impl QuestionPayload {
    pub fn from_session(session: &ActiveQuestionSession) -> Self {
        let question = &session.question;
        Self {
            question_id: question.id.clone(),
            category: question.category.clone(),
            text: question.text.clone(),
            options: AnswerOption::iter()
                .map(|label| LabeledOption {
                    label,
                    text: question.option_text(label).to_string(),
                })
                .collect(),
            time_limit_seconds: question.time_limit_seconds,
            sponsor: question.sponsor.clone(),
            attempt_number: session.attempt_number,
            mode: session.mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuestionOutcome {
    Delivered(QuestionPayload),
    Rejected(Rejection),
    /// Nothing left to draw; the message distinguishes exhausted from empty
    Unavailable { message: String },
}

/// Point balances after an answer was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTotals {
    pub ap: i64,
    pub pp: i64,
    pub weekly_points: i64,
    pub streak: i32,
}

impl From<&User> for UserTotals {
    fn from(user: &User) -> Self {
        Self {
            ap: user.ap,
            pp: user.pp,
            weekly_points: user.weekly_points,
            streak: user.streak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub question_id: String,
    pub is_correct: bool,
    pub selected_option: String,
    pub correct_option: AnswerOption,
    pub correct_answer: String,
    pub response_time_seconds: f64,
    pub attempt_number: i32,
    pub point_type: PointType,
    pub breakdown: PointsBreakdown,
    pub totals: UserTotals,
    pub rank: Option<u32>,
    pub streak_broken: bool,
    /// Subscriber missed a first prize attempt and may retry
    pub second_attempt_available: bool,
    /// False when storage refused the attempt or user update
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
    Scored(Box<AnswerResult>),
    /// Timing was implausible; nothing was scored or stored
    Discarded(Rejection),
    /// No live session for this (user, question)
    Expired { message: String },
}
