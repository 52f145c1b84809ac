use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use super::models::{PointType, PointsBreakdown, RoundMode};
use crate::config::{GameConfig, ScoringTable, SpeedBonusConfig};
use crate::questions::models::Question;
use crate::user::{User, UserTier};

/// Pure point computation over a user, a question and the scoring tables
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    table: ScoringTable,
    speed: SpeedBonusConfig,
    /// Sorted ascending by milestone
    streak_bonuses: Vec<(i32, i64)>,
}

impl ScoringEngine {
    pub fn new(config: &GameConfig) -> Self {
        let mut streak_bonuses = config.streak_bonuses.clone();
        streak_bonuses.sort_by_key(|(milestone, _)| *milestone);

        Self {
            table: config.scoring.clone(),
            speed: config.speed_bonus.clone(),
            streak_bonuses,
        }
    }

    pub fn calculate_points(
        &self,
        user: &User,
        question: &Question,
        is_correct: bool,
        response_time_seconds: f64,
        attempt_number: i32,
        mode: RoundMode,
    ) -> (i64, PointsBreakdown) {
        self.calculate_points_at(
            user,
            question,
            is_correct,
            response_time_seconds,
            attempt_number,
            mode,
            Utc::now(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn calculate_points_at(
        &self,
        user: &User,
        question: &Question,
        is_correct: bool,
        response_time_seconds: f64,
        attempt_number: i32,
        mode: RoundMode,
        now: DateTime<Utc>,
    ) -> (i64, PointsBreakdown) {
        if !is_correct {
            return (0, PointsBreakdown::zero());
        }

        let tier = user.tier_at(now);
        let scoring = self.table.lookup(tier, mode);

        let mut base = scoring.correct;
        if mode.is_prize_round() && tier == UserTier::Subscriber && attempt_number == 2 {
            base = (base as f64 * scoring.second_attempt_multiplier).floor() as i64;
        }

        let speed_bonus = if mode.is_prize_round() {
            self.speed_bonus(
                response_time_seconds,
                question.time_limit_seconds,
                scoring.speed_bonus_max,
            )
        } else {
            0
        };

        let streak_bonus = self.streak_bonus(user.streak);
        let breakdown = PointsBreakdown::new(base, speed_bonus, streak_bonus);

        info!(
            user_id = %user.id,
            question_id = %question.id,
            tier = %tier,
            mode = %mode,
            base = breakdown.base,
            speed_bonus = breakdown.speed_bonus,
            streak_bonus = breakdown.streak_bonus,
            total = breakdown.total,
            "Calculated points"
        );

        (breakdown.total, breakdown)
    }

    /// Full bonus under the fast ratio, linear decay to zero at the slow ratio
    pub fn speed_bonus(&self, response_time_seconds: f64, time_limit_seconds: u32, max_bonus: i64) -> i64 {
        if response_time_seconds <= 0.0 || time_limit_seconds == 0 || max_bonus <= 0 {
            return 0;
        }

        let ratio = response_time_seconds / f64::from(time_limit_seconds);
        let SpeedBonusConfig {
            fast_ratio,
            slow_ratio,
        } = self.speed;

        if ratio < fast_ratio {
            return max_bonus;
        }
        if ratio >= slow_ratio || slow_ratio <= fast_ratio {
            return 0;
        }

        let remaining = (slow_ratio - ratio) / (slow_ratio - fast_ratio);
        ((max_bonus as f64 * remaining).floor() as i64).clamp(0, max_bonus)
    }

    /// Highest milestone reached; milestones never stack
    pub fn streak_bonus(&self, streak: i32) -> i64 {
        self.streak_bonuses
            .iter()
            .rev()
            .find(|(milestone, _)| streak >= *milestone)
            .map(|(_, bonus)| *bonus)
            .unwrap_or_default()
    }
}

/// Advances or resets the daily streak against today's UTC date.
///
/// Returns `true` only when a prior play date existed and more than one day
/// has passed since it. A malformed stored date counts as no history.
pub fn update_user_streak(user: &mut User) -> bool {
    update_user_streak_on(user, Utc::now().date_naive())
}

pub fn update_user_streak_on(user: &mut User, today: NaiveDate) -> bool {
    let stored = user.last_played_date.as_deref();
    let last_played = match stored.map(parse_played_date) {
        Some(Some(date)) => date,
        Some(None) => {
            warn!(
                user_id = %user.id,
                stored = ?stored,
                "Unparseable last played date, treating as first play"
            );
            reset_streak(user, today);
            return false;
        }
        None => {
            reset_streak(user, today);
            return false;
        }
    };

    let days = (today - last_played).num_days();
    match days {
        0 => false,
        1 => {
            user.streak += 1;
            user.last_played_date = Some(today.to_string());
            debug!(user_id = %user.id, streak = user.streak, "Streak extended");
            false
        }
        _ => {
            reset_streak(user, today);
            info!(user_id = %user.id, gap_days = days, "Streak broken");
            true
        }
    }
}

fn reset_streak(user: &mut User, today: NaiveDate) {
    user.streak = 1;
    user.last_played_date = Some(today.to_string());
}

/// Accepts plain dates as well as full timestamps
pub fn parse_played_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc).date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|timestamp| timestamp.date())
}

/// Routes points to the matching currency; weekly points always accrue
pub fn apply_points_to_user(user: &mut User, points: i64, point_type: PointType) {
    match point_type {
        PointType::Pp => user.pp += points,
        PointType::Ap => user.ap += points,
    }
    user.weekly_points += points;
}
