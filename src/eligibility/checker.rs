use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::types::{AttemptVerdict, Eligibility, RejectionReason};
use crate::config::GameConfig;
use crate::questions::models::Attempt;
use crate::scoring::RoundMode;
use crate::storage::GameStore;
use crate::user::{User, UserTier};

/// Wait reported when the oldest in-window attempt cannot be determined
const DEFAULT_WAIT_MINUTES: i64 = 60;

/// Gatekeeper for play, prize entry, per-question attempts and anti-cheat.
///
/// Storage reads happen in the async wrappers; every decision is made by a
/// pure evaluator so the rules can be exercised without a backend. Storage
/// failures degrade to permissive defaults and are logged.
pub struct EligibilityChecker {
    store: Arc<dyn GameStore>,
    config: Arc<GameConfig>,
}

impl EligibilityChecker {
    pub fn new(store: Arc<dyn GameStore>, config: Arc<GameConfig>) -> Self {
        Self { store, config }
    }

    /// Ban, hourly quota and review gate, in that order
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn check_play_eligibility(&self, user: &User) -> Eligibility {
        if user.is_banned {
            return self.evaluate_play(user, 0, None, Utc::now());
        }

        let hourly = self
            .store
            .get_user_hourly_attempts(user.id)
            .await
            .unwrap_or_else(|e| {
                warn!(user_id = %user.id, error = %e, "Failed to count hourly attempts");
                0
            });

        let limit = self.config.rate_limits.hourly_for(user.tier());
        let oldest = if hourly >= limit {
            self.store
                .get_oldest_attempt_within_hour(user.id)
                .await
                .unwrap_or_else(|e| {
                    warn!(user_id = %user.id, error = %e, "Failed to fetch oldest hourly attempt");
                    None
                })
        } else {
            None
        };

        self.evaluate_play(user, hourly, oldest, Utc::now())
    }

    pub fn evaluate_play(
        &self,
        user: &User,
        hourly_attempts: u32,
        oldest_in_window: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Eligibility {
        if user.is_banned {
            return Eligibility::rejected(
                RejectionReason::Banned,
                "Your account has been banned. Contact an admin if you think this is a mistake.",
            );
        }

        let tier = user.tier_at(now);
        let limit = self.config.rate_limits.hourly_for(tier);
        if hourly_attempts >= limit {
            let wait_minutes = wait_minutes(oldest_in_window, now);
            let upgrade = match tier {
                UserTier::Free => format!(
                    " Premium members get {} questions per hour, use /subscribe to upgrade.",
                    self.config.rate_limits.subscriber_hourly
                ),
                UserTier::Subscriber => String::new(),
            };
            debug!(user_id = %user.id, hourly_attempts, limit, wait_minutes, "Hourly limit reached");
            return Eligibility::rejected(
                RejectionReason::RateLimited {
                    limit,
                    wait_minutes,
                },
                format!(
                    "Rate limit reached: you answered {} questions in the past hour and your limit is {}.{} Try again in {} minutes.",
                    hourly_attempts, limit, upgrade, wait_minutes
                ),
            );
        }

        if user.suspicious_flags >= self.config.anti_cheat.review_flag_threshold {
            return Eligibility::rejected(
                RejectionReason::UnderReview,
                "Your account has been flagged for unusual activity and is under review by a moderator. If this is an error, please contact an admin.",
            );
        }

        Eligibility::Allowed
    }

    /// Entry bar for counting towards a prize round
    pub fn check_prize_round_eligibility(&self, user: &User) -> Eligibility {
        if user.is_banned {
            return Eligibility::rejected(
                RejectionReason::Banned,
                "Your account has been banned. Contact an admin.",
            );
        }

        if user.suspicious_flags >= self.config.anti_cheat.review_flag_threshold {
            return Eligibility::rejected(
                RejectionReason::UnderReview,
                "Your account is under review. Please contact an admin.",
            );
        }

        let bar = &self.config.prize_round;
        if bar.min_ap > 0 && user.lifetime_ap() < bar.min_ap {
            return Eligibility::rejected(
                RejectionReason::EntryRequirement,
                format!(
                    "You are not eligible for this prize round yet. Minimum AP required: {}. Keep playing to qualify.",
                    bar.min_ap
                ),
            );
        }

        if bar.min_questions > 0 && user.total_questions < bar.min_questions {
            return Eligibility::rejected(
                RejectionReason::EntryRequirement,
                format!(
                    "You are not eligible for this prize round yet. Minimum answered questions required: {}.",
                    bar.min_questions
                ),
            );
        }

        Eligibility::Allowed
    }

    /// Next legal attempt number for this (user, question), or why there is none
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn check_question_attempts(
        &self,
        user: &User,
        question_id: &str,
        mode: RoundMode,
    ) -> AttemptVerdict {
        // Most draws are unseen questions; only load history when there is some
        match self.store.get_user_attempts_count(user.id, question_id).await {
            Ok(0) => return AttemptVerdict::allowed(1),
            Ok(_) => {}
            Err(e) => {
                debug!(user_id = %user.id, question_id = %question_id, error = %e, "Attempt count unavailable");
            }
        }

        let attempts = self
            .store
            .get_user_question_attempts(user.id, question_id)
            .await
            .unwrap_or_else(|e| {
                warn!(user_id = %user.id, question_id = %question_id, error = %e, "Failed to load question attempts");
                Vec::new()
            });

        evaluate_attempts(user.tier(), mode, &attempts)
    }

    /// Rejects answers that are implausibly fast or outside the session window
    pub fn validate_answer_timing(&self, response_time_seconds: f64) -> Eligibility {
        let rules = &self.config.anti_cheat;

        if !response_time_seconds.is_finite() || response_time_seconds < 0.0 {
            warn!(response_time_seconds, "Invalid response time");
            return Eligibility::rejected(
                RejectionReason::InvalidTiming,
                "Invalid response time detected. Please request a new question.",
            );
        }

        if response_time_seconds < rules.min_answer_seconds {
            warn!(response_time_seconds, "Suspiciously fast answer");
            return Eligibility::rejected(
                RejectionReason::AnswerTooFast,
                "Answer submitted too quickly. This attempt won't count.",
            );
        }

        if response_time_seconds > rules.max_answer_seconds {
            warn!(response_time_seconds, "Response time exceeds session window");
            return Eligibility::rejected(
                RejectionReason::InvalidTiming,
                "Invalid response time detected. Please request a new question.",
            );
        }

        Eligibility::Allowed
    }

    /// Applies the anti-cheat heuristics and returns how many flags were added
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn check_and_flag_suspicious_behavior(&self, user: &mut User) -> i32 {
        let rules = &self.config.anti_cheat;
        let limit = rules.accuracy_window.max(rules.max_correct_streak);

        let recent = match self
            .store
            .get_recent_attempt_correctness(user.id, limit)
            .await
        {
            Ok(recent) => recent,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Failed to load recent attempts for flagging");
                return 0;
            }
        };

        let added = self.suspicion_increments(&recent);
        if added > 0 {
            user.suspicious_flags += added;
            warn!(
                user_id = %user.id,
                added,
                total_flags = user.suspicious_flags,
                "Suspicious behaviour flagged"
            );
        }
        added
    }

    /// Flags earned by a newest-first correctness history, at most one per rule
    pub fn suspicion_increments(&self, recent_newest_first: &[bool]) -> i32 {
        let rules = &self.config.anti_cheat;
        let mut added = 0;

        if recent_newest_first.len() >= rules.accuracy_window {
            let correct = recent_newest_first[..rules.accuracy_window]
                .iter()
                .filter(|c| **c)
                .count();
            if correct >= rules.accuracy_flag_threshold {
                added += 1;
            }
        }

        let run = recent_newest_first.iter().take_while(|c| **c).count();
        if run >= rules.max_correct_streak {
            added += 1;
        }

        added
    }
}

/// Attempt gate over a user's prior attempts on one question, oldest first
pub fn evaluate_attempts(tier: UserTier, mode: RoundMode, attempts: &[Attempt]) -> AttemptVerdict {
    let existing = attempts.len() as i32;
    let Some(first) = attempts.first() else {
        return AttemptVerdict::allowed(1);
    };

    match (mode, tier) {
        (RoundMode::Continuous, _) => AttemptVerdict::refused(
            existing,
            RejectionReason::AlreadyAnswered,
            "You've already answered this question.",
        ),
        (RoundMode::PrizeRound, UserTier::Free) => AttemptVerdict::refused(
            existing,
            RejectionReason::AttemptsExhausted,
            "You've used all attempts for this prize question. Premium members get a second try on wrong answers.",
        ),
        (RoundMode::PrizeRound, UserTier::Subscriber) if existing >= 2 => AttemptVerdict::refused(
            existing,
            RejectionReason::AttemptsExhausted,
            "You've used both attempts for this prize question.",
        ),
        (RoundMode::PrizeRound, UserTier::Subscriber) if first.is_correct => AttemptVerdict::refused(
            existing,
            RejectionReason::AlreadyAnswered,
            "A second attempt is only available if your first attempt was wrong.",
        ),
        (RoundMode::PrizeRound, UserTier::Subscriber) => AttemptVerdict::allowed(2),
    }
}

/// Whole minutes until the oldest in-window attempt leaves the rolling hour
pub fn wait_minutes(oldest_in_window: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match oldest_in_window {
        Some(oldest) => (oldest + Duration::hours(1) - now).num_minutes().max(1),
        None => DEFAULT_WAIT_MINUTES,
    }
}
