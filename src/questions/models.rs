use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::scoring::{PointType, RoundMode};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    fn index(self) -> usize {
        match self {
            AnswerOption::A => 0,
            AnswerOption::B => 1,
            AnswerOption::C => 2,
            AnswerOption::D => 3,
        }
    }
}

/// A quiz item; immutable once delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub category: String,
    pub text: String,
    /// Option texts in A, B, C, D order
    pub options: [String; 4],
    pub correct_option: AnswerOption,
    pub difficulty: String,
    pub time_limit_seconds: u32,
    pub sponsor: Option<String>,
    /// Legacy exhaustion marker; excluded from draws when set
    pub used: bool,
}

impl Question {
    pub fn option_text(&self, option: AnswerOption) -> &str {
        &self.options[option.index()]
    }

    pub fn correct_answer_text(&self) -> &str {
        self.option_text(self.correct_option)
    }

    /// Case-insensitive comparison of a raw submitted letter against the key
    pub fn is_correct(&self, selected: &str) -> bool {
        selected
            .trim()
            .parse::<AnswerOption>()
            .is_ok_and(|option| option == self.correct_option)
    }
}

/// One accepted answer submission; append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub user_id: i64,
    pub question_id: String,
    pub selected_option: String,
    pub is_correct: bool,
    pub response_time_seconds: f64,
    pub points_awarded: i64,
    pub point_type: PointType,
    pub attempt_number: i32,
    pub created_at: DateTime<Utc>,
}

impl Attempt {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: i64,
        question_id: String,
        selected_option: String,
        is_correct: bool,
        response_time_seconds: f64,
        points_awarded: i64,
        point_type: PointType,
        attempt_number: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            question_id,
            selected_option,
            is_correct,
            response_time_seconds,
            points_awarded,
            point_type,
            attempt_number,
            created_at: Utc::now(),
        }
    }
}

/// Binding between a delivered question and its pending answer
///
/// The mode is fixed at issue time and decides how the answer is scored.
#[derive(Debug, Clone)]
pub struct ActiveQuestionSession {
    pub question: Question,
    pub issued_at: DateTime<Utc>,
    pub attempt_number: i32,
    pub mode: RoundMode,
}

impl ActiveQuestionSession {
    pub fn new(question: Question, attempt_number: i32, mode: RoundMode) -> Self {
        Self {
            question,
            issued_at: Utc::now(),
            attempt_number,
            mode,
        }
    }

    /// Seconds elapsed since issue, with sub-second precision
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        (now - self.issued_at).num_milliseconds() as f64 / 1000.0
    }
}
