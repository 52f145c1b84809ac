use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Weekly prize granted for a leaderboard position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardTier {
    Cash { amount_usd: u32 },
    Subscription { months: u32 },
}

impl RewardTier {
    pub fn kind(&self) -> &'static str {
        match self {
            RewardTier::Cash { .. } => "cash",
            RewardTier::Subscription { .. } => "subscription",
        }
    }

    pub fn value(&self) -> u32 {
        match self {
            RewardTier::Cash { amount_usd } => *amount_usd,
            RewardTier::Subscription { months } => *months,
        }
    }

    /// Rebuilds a tier from its stored (type, value) columns
    pub fn from_parts(kind: &str, value: u32) -> Option<Self> {
        match kind {
            "cash" => Some(RewardTier::Cash { amount_usd: value }),
            "subscription" => Some(RewardTier::Subscription { months: value }),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            RewardTier::Cash { amount_usd } => format!("${} cash", amount_usd),
            RewardTier::Subscription { months } => format!("{}-month Premium", months),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RewardStatus {
    #[default]
    Pending,
    Approved,
    Paid,
}

/// Rank bands mapped to weekly rewards
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyRewardTable {
    /// (first rank, last rank, reward), inclusive bands
    bands: Vec<(u32, u32, RewardTier)>,
}

impl WeeklyRewardTable {
    pub fn new(bands: Vec<(u32, u32, RewardTier)>) -> Self {
        Self { bands }
    }

    pub fn reward_for(&self, rank: u32) -> Option<RewardTier> {
        self.bands
            .iter()
            .find(|(first, last, _)| (*first..=*last).contains(&rank))
            .map(|(_, _, reward)| *reward)
    }
}

impl Default for WeeklyRewardTable {
    fn default() -> Self {
        Self::new(vec![
            (1, 1, RewardTier::Cash { amount_usd: 100 }),
            (2, 2, RewardTier::Cash { amount_usd: 50 }),
            (3, 3, RewardTier::Cash { amount_usd: 25 }),
            (4, 10, RewardTier::Subscription { months: 1 }),
        ])
    }
}

/// One weekly ranking row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub week_number: u32,
    pub year: i32,
    pub user_id: i64,
    pub display_name: String,
    pub points: i64,
    pub rank: u32,
    pub reward: Option<RewardTier>,
    pub reward_status: RewardStatus,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl LeaderboardEntry {
    pub fn new(
        week: IsoWeek,
        user_id: i64,
        display_name: String,
        points: i64,
        rank: u32,
    ) -> Self {
        Self {
            week_number: week.week,
            year: week.year,
            user_id,
            display_name,
            points,
            rank,
            reward: None,
            reward_status: RewardStatus::Pending,
            approved_by: None,
            approved_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsoWeek {
    pub week: u32,
    pub year: i32,
}

impl IsoWeek {
    pub fn of(now: DateTime<Utc>) -> Self {
        let iso = now.iso_week();
        Self {
            week: iso.week(),
            year: iso.year(),
        }
    }

    pub fn current() -> Self {
        Self::of(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_table_covers_top_ten() {
        let table = WeeklyRewardTable::default();
        assert_eq!(table.reward_for(1), Some(RewardTier::Cash { amount_usd: 100 }));
        assert_eq!(table.reward_for(3), Some(RewardTier::Cash { amount_usd: 25 }));
        assert_eq!(table.reward_for(4), Some(RewardTier::Subscription { months: 1 }));
        assert_eq!(table.reward_for(10), Some(RewardTier::Subscription { months: 1 }));
        assert_eq!(table.reward_for(11), None);
        assert_eq!(table.reward_for(0), None);
    }

    #[test]
    fn reward_round_trips_through_stored_columns() {
        let reward = RewardTier::Subscription { months: 1 };
        assert_eq!(
            RewardTier::from_parts(reward.kind(), reward.value()),
            Some(reward)
        );
        assert_eq!(RewardTier::from_parts("voucher", 3), None);
    }

    #[test]
    fn iso_week_uses_iso_year() {
        let date = Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(IsoWeek::of(date), IsoWeek { week: 53, year: 2020 });
    }
}
