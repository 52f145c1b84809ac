use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Which question flow an attempt belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoundMode {
    Continuous,
    PrizeRound,
}

impl RoundMode {
    pub fn from_prize_flag(is_prize_round: bool) -> Self {
        if is_prize_round {
            RoundMode::PrizeRound
        } else {
            RoundMode::Continuous
        }
    }

    pub fn is_prize_round(self) -> bool {
        self == RoundMode::PrizeRound
    }

    /// Currency credited for answers in this mode
    pub fn point_type(self) -> PointType {
        match self {
            RoundMode::Continuous => PointType::Ap,
            RoundMode::PrizeRound => PointType::Pp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PointType {
    Ap,
    Pp,
}

/// Per-component view of an award, for user-facing display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsBreakdown {
    pub base: i64,
    pub speed_bonus: i64,
    pub streak_bonus: i64,
    pub total: i64,
}

impl PointsBreakdown {
    pub fn new(base: i64, speed_bonus: i64, streak_bonus: i64) -> Self {
        Self {
            base,
            speed_bonus,
            streak_bonus,
            total: base + speed_bonus + streak_bonus,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}
