use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::leaderboard::{IsoWeek, LeaderboardEntry};
use crate::prize_round::{RoundKind, RoundWinner};
use crate::questions::{AnswerResult, QuestionPayload};

/// Everything the core pushes to the messaging transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Announcement {
    QuestionDelivered(QuestionPayload),
    AnswerResult(Box<AnswerResult>),
    RoundWarning(RoundWarningPayload),
    RoundStarted(RoundStartPayload),
    RoundEnded(RoundEndPayload),
    WeeklyReset(WeeklyResetPayload),
    DailyReminder(DailyReminderPayload),
    AdminSummary { message: String },
    AdminAlert { message: String },
}

impl Announcement {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Announcement::QuestionDelivered(_) => "question_delivered",
            Announcement::AnswerResult(_) => "answer_result",
            Announcement::RoundWarning(_) => "round_warning",
            Announcement::RoundStarted(_) => "round_started",
            Announcement::RoundEnded(_) => "round_ended",
            Announcement::WeeklyReset(_) => "weekly_reset",
            Announcement::DailyReminder(_) => "daily_reminder",
            Announcement::AdminSummary { .. } => "admin_summary",
            Announcement::AdminAlert { .. } => "admin_alert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundWarningPayload {
    pub kind: RoundKind,
    pub starts_in_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStartPayload {
    pub kind: RoundKind,
    pub duration_minutes: i64,
    pub question_count: u32,
    pub ends_at: DateTime<Utc>,
    /// Current weekly leaders
    pub preview: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEndPayload {
    pub kind: RoundKind,
    pub winners: Vec<RoundWinner>,
    pub next_round: RoundKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyResetPayload {
    pub week: IsoWeek,
    pub standings: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReminderPayload {
    pub display_name: String,
    pub streak: i32,
}
