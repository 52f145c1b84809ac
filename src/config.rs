use std::str::FromStr;
use std::time::Duration;

use chrono::Weekday;
use tracing::warn;

use crate::leaderboard::WeeklyRewardTable;
use crate::scoring::RoundMode;
use crate::user::UserTier;

/// Point values for one (tier, mode) cell of the scoring table
#[derive(Debug, Clone, PartialEq)]
pub struct TierScoring {
    pub correct: i64,
    pub speed_bonus_max: i64,
    /// Applied to the base value on a subscriber's second prize-round attempt
    pub second_attempt_multiplier: f64,
}

impl TierScoring {
    pub fn new(correct: i64, speed_bonus_max: i64) -> Self {
        Self {
            correct,
            speed_bonus_max,
            second_attempt_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringTable {
    pub free_continuous: TierScoring,
    pub free_prize: TierScoring,
    pub subscriber_continuous: TierScoring,
    pub subscriber_prize: TierScoring,
}

impl ScoringTable {
    pub fn lookup(&self, tier: UserTier, mode: RoundMode) -> &TierScoring {
        match (tier, mode) {
            (UserTier::Free, RoundMode::Continuous) => &self.free_continuous,
            (UserTier::Free, RoundMode::PrizeRound) => &self.free_prize,
            (UserTier::Subscriber, RoundMode::Continuous) => &self.subscriber_continuous,
            (UserTier::Subscriber, RoundMode::PrizeRound) => &self.subscriber_prize,
        }
    }
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self {
            free_continuous: TierScoring::new(5, 0),
            free_prize: TierScoring::new(10, 5),
            subscriber_continuous: TierScoring::new(8, 0),
            subscriber_prize: TierScoring {
                correct: 15,
                speed_bonus_max: 7,
                second_attempt_multiplier: 0.8,
            },
        }
    }
}

/// Elapsed/time-limit ratios bounding the speed bonus decay
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedBonusConfig {
    /// Below this ratio the full bonus is awarded
    pub fast_ratio: f64,
    /// At or beyond this ratio no bonus is awarded
    pub slow_ratio: f64,
}

impl Default for SpeedBonusConfig {
    fn default() -> Self {
        Self {
            fast_ratio: 0.3,
            slow_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimits {
    pub free_hourly: u32,
    pub subscriber_hourly: u32,
}

impl RateLimits {
    pub fn hourly_for(&self, tier: UserTier) -> u32 {
        match tier {
            UserTier::Free => self.free_hourly,
            UserTier::Subscriber => self.subscriber_hourly,
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            free_hourly: 20,
            subscriber_hourly: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AntiCheatConfig {
    pub min_answer_seconds: f64,
    pub max_answer_seconds: f64,
    /// Number of recent attempts inspected by the accuracy rule
    pub accuracy_window: usize,
    pub accuracy_flag_threshold: usize,
    pub max_correct_streak: usize,
    /// Flag count at which play is suspended pending review
    pub review_flag_threshold: i32,
}

impl Default for AntiCheatConfig {
    fn default() -> Self {
        Self {
            min_answer_seconds: 2.0,
            max_answer_seconds: 120.0,
            accuracy_window: 20,
            accuracy_flag_threshold: 19,
            max_correct_streak: 50,
            review_flag_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrizeRoundConfig {
    pub duration: Duration,
    pub question_count: u32,
    pub winner_count: usize,
    /// Entry bar on lifetime AP, disabled at zero
    pub min_ap: i64,
    /// Entry bar on answered questions, disabled at zero
    pub min_questions: i32,
}

impl Default for PrizeRoundConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30 * 60),
            question_count: 10,
            winner_count: 10,
            min_ap: 0,
            min_questions: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardConfig {
    pub top_count: usize,
    pub display_count: usize,
    pub preview_count: usize,
    pub rewards: WeeklyRewardTable,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            top_count: 50,
            display_count: 10,
            preview_count: 3,
            rewards: WeeklyRewardTable::default(),
        }
    }
}

/// Wall-clock boundaries for the scheduler, all in UTC
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub morning_hour: u32,
    pub evening_hour: u32,
    pub warning_lead: Duration,
    pub weekly_reset_day: Weekday,
    pub weekly_reset_hour: u32,
    pub weekly_reset_minute: u32,
    pub daily_reminder_hour: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            morning_hour: 9,
            evening_hour: 21,
            warning_lead: Duration::from_secs(5 * 60),
            weekly_reset_day: Weekday::Sun,
            weekly_reset_hour: 23,
            weekly_reset_minute: 59,
            daily_reminder_hour: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub max_age: Duration,
    pub cleanup_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(120),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Every tunable of the game engine
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub scoring: ScoringTable,
    pub speed_bonus: SpeedBonusConfig,
    /// (minimum streak days, bonus) pairs; only the highest reached applies
    pub streak_bonuses: Vec<(i32, i64)>,
    pub rate_limits: RateLimits,
    pub anti_cheat: AntiCheatConfig,
    pub prize_round: PrizeRoundConfig,
    pub leaderboard: LeaderboardConfig,
    pub schedule: ScheduleConfig,
    pub sessions: SessionConfig,
    pub admin_user_ids: Vec<i64>,
    pub database_url: Option<String>,
    pub bind_addr: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringTable::default(),
            speed_bonus: SpeedBonusConfig::default(),
            streak_bonuses: vec![(3, 5), (7, 15), (30, 50)],
            rate_limits: RateLimits::default(),
            anti_cheat: AntiCheatConfig::default(),
            prize_round: PrizeRoundConfig::default(),
            leaderboard: LeaderboardConfig::default(),
            schedule: ScheduleConfig::default(),
            sessions: SessionConfig::default(),
            admin_user_ids: Vec::new(),
            database_url: None,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl GameConfig {
    /// Builds the configuration from defaults overridden by environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        override_from(&lookup, "FREE_USER_HOURLY_LIMIT", &mut config.rate_limits.free_hourly);
        override_from(
            &lookup,
            "SUBSCRIBER_HOURLY_LIMIT",
            &mut config.rate_limits.subscriber_hourly,
        );
        override_from(
            &lookup,
            "FREE_AP_PER_CORRECT",
            &mut config.scoring.free_continuous.correct,
        );
        override_from(
            &lookup,
            "SUBSCRIBER_AP_PER_CORRECT",
            &mut config.scoring.subscriber_continuous.correct,
        );
        override_from(&lookup, "FREE_PP_PER_CORRECT", &mut config.scoring.free_prize.correct);
        override_from(
            &lookup,
            "SUBSCRIBER_PP_PER_CORRECT",
            &mut config.scoring.subscriber_prize.correct,
        );
        override_from(
            &lookup,
            "PRIZE_ROUND_MORNING_HOUR",
            &mut config.schedule.morning_hour,
        );
        override_from(
            &lookup,
            "PRIZE_ROUND_EVENING_HOUR",
            &mut config.schedule.evening_hour,
        );
        override_from(&lookup, "PRIZE_ROUND_MIN_AP", &mut config.prize_round.min_ap);
        override_from(
            &lookup,
            "PRIZE_ROUND_MIN_QUESTIONS",
            &mut config.prize_round.min_questions,
        );
        override_from(
            &lookup,
            "DAILY_REMINDER_HOUR",
            &mut config.schedule.daily_reminder_hour,
        );

        if let Some(ids) = lookup("ADMIN_USER_IDS") {
            config.admin_user_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .filter_map(|id| match id.parse::<i64>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        warn!(value = %id, "Ignoring malformed admin user id");
                        None
                    }
                })
                .collect();
        }

        config.database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if let Some(addr) = lookup("BIND_ADDR") {
            config.bind_addr = addr;
        }

        config
    }
}

fn override_from<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!(key = %key, value = %raw, "Ignoring malformed configuration value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_production_table() {
        let config = GameConfig::default();
        assert_eq!(config.scoring.free_continuous.correct, 5);
        assert_eq!(config.scoring.subscriber_prize.correct, 15);
        assert_eq!(config.scoring.subscriber_prize.speed_bonus_max, 7);
        assert_eq!(config.rate_limits.free_hourly, 20);
        assert_eq!(config.rate_limits.subscriber_hourly, 40);
        assert_eq!(config.prize_round.duration, Duration::from_secs(1800));
    }

    #[test]
    fn environment_overrides_known_keys() {
        let config = GameConfig::from_lookup(lookup_from(&[
            ("FREE_USER_HOURLY_LIMIT", "7"),
            ("SUBSCRIBER_PP_PER_CORRECT", "20"),
            ("ADMIN_USER_IDS", "11, 22,,abc"),
            ("DATABASE_URL", "postgres://localhost/quiz"),
        ]));

        assert_eq!(config.rate_limits.free_hourly, 7);
        assert_eq!(config.scoring.subscriber_prize.correct, 20);
        assert_eq!(config.admin_user_ids, vec![11, 22]);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/quiz")
        );
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let config = GameConfig::from_lookup(lookup_from(&[
            ("FREE_USER_HOURLY_LIMIT", "lots"),
            ("DATABASE_URL", ""),
        ]));
        assert_eq!(config.rate_limits.free_hourly, 20);
        assert!(config.database_url.is_none());
    }
}
