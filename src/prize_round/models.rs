use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::shared::AppError;

/// Which of the two daily rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoundKind {
    Morning,
    Evening,
}

impl RoundKind {
    pub fn next(self) -> RoundKind {
        match self {
            RoundKind::Morning => RoundKind::Evening,
            RoundKind::Evening => RoundKind::Morning,
        }
    }
}

/// One ranked finisher of a prize round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundWinner {
    pub rank: u32,
    pub user_id: i64,
    pub display_name: String,
    /// PP earned inside the round window only
    pub gained_pp: i64,
    pub lifetime_ap: i64,
    pub reward_label: String,
}

/// Reward band for a round finishing position
pub fn reward_label(rank: u32) -> &'static str {
    match rank {
        1 => "Cash / Airtime",
        2..=5 => "Airtime / Voucher",
        _ => "Bonus AP",
    }
}

/// Snapshot of the state machine for status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStatus {
    pub active: bool,
    pub kind: Option<RoundKind>,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub snapshot_size: usize,
}

#[derive(Debug, Error)]
pub enum PrizeRoundError {
    #[error("A {0} prize round is already active")]
    AlreadyActive(RoundKind),

    #[error("No prize round is active")]
    NotActive,

    #[error("Prize round storage failure: {0}")]
    Storage(#[from] AppError),
}
