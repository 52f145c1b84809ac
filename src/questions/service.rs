use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    models::{ActiveQuestionSession, Attempt, Question},
    registry::SessionRegistry,
    types::{AnswerOutcome, AnswerResult, QuestionOutcome, QuestionPayload, UserTotals},
};
use crate::eligibility::{Eligibility, EligibilityChecker};
use crate::scoring::{apply_points_to_user, update_user_streak, RoundMode, ScoringEngine};
use crate::storage::GameStore;
use crate::user::{User, UserTier};

const EXPIRED_MESSAGE: &str = "Question not found or expired. Please request a new question.";
const ALL_CAUGHT_UP: &str =
    "You've answered all available questions! New questions are added daily, check back soon.";
const BANK_EMPTY: &str =
    "No questions available right now. The question bank is empty, please try again later.";

/// Delivers questions and turns submitted answers into scored attempts
pub struct QuestionSessionManager {
    store: Arc<dyn GameStore>,
    eligibility: Arc<EligibilityChecker>,
    scoring: ScoringEngine,
    registry: Arc<SessionRegistry>,
}

impl QuestionSessionManager {
    pub fn new(
        store: Arc<dyn GameStore>,
        eligibility: Arc<EligibilityChecker>,
        scoring: ScoringEngine,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            store,
            eligibility,
            scoring,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Draws an unanswered question and opens a session for it
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn get_question_for_user(&self, user: &User, mode: RoundMode) -> QuestionOutcome {
        if let Eligibility::Rejected(rejection) = self.eligibility.check_play_eligibility(user).await
        {
            debug!(user_id = %user.id, reason = ?rejection.reason, "Play rejected");
            return QuestionOutcome::Rejected(rejection);
        }

        let mut exclude = self
            .store
            .get_answered_question_ids(user.id)
            .await
            .unwrap_or_else(|e| {
                warn!(user_id = %user.id, error = %e, "Failed to load answered questions");
                HashSet::new()
            });

        // Each refused draw is excluded, so the loop ends once the bank runs dry
        loop {
            let question = match self.store.get_random_question(&exclude).await {
                Ok(Some(question)) => question,
                Ok(None) => return self.unavailable(),
                Err(e) => {
                    warn!(user_id = %user.id, error = %e, "Failed to draw a question");
                    return self.unavailable();
                }
            };

            let verdict = self
                .eligibility
                .check_question_attempts(user, &question.id, mode)
                .await;
            if !verdict.is_allowed() {
                debug!(question_id = %question.id, "Drawn question not attemptable, redrawing");
                exclude.insert(question.id);
                continue;
            }

            return self.issue(user, question, verdict.attempt_number, mode).await;
        }
    }

    /// Re-issues a question the user already attempted, if the attempt gate allows
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn retry_question(
        &self,
        user: &User,
        question_id: &str,
        mode: RoundMode,
    ) -> QuestionOutcome {
        if let Eligibility::Rejected(rejection) = self.eligibility.check_play_eligibility(user).await
        {
            return QuestionOutcome::Rejected(rejection);
        }

        let question = match self.store.get_question(question_id).await {
            Ok(Some(question)) => question,
            Ok(None) => {
                return QuestionOutcome::Unavailable {
                    message: "That question no longer exists. Please request a new one.".to_string(),
                }
            }
            Err(e) => {
                warn!(question_id = %question_id, error = %e, "Failed to load question for retry");
                return self.unavailable();
            }
        };

        let verdict = self
            .eligibility
            .check_question_attempts(user, question_id, mode)
            .await;
        match verdict.rejection {
            Some(rejection) => QuestionOutcome::Rejected(rejection),
            None => self.issue(user, question, verdict.attempt_number, mode).await,
        }
    }

    async fn issue(
        &self,
        user: &User,
        question: Question,
        attempt_number: i32,
        mode: RoundMode,
    ) -> QuestionOutcome {
        let session = ActiveQuestionSession::new(question, attempt_number, mode);
        let payload = QuestionPayload::from_session(&session);
        self.registry.insert(user.id, session).await;

        info!(
            user_id = %user.id,
            question_id = %payload.question_id,
            attempt_number,
            mode = %mode,
            "Delivered question"
        );
        QuestionOutcome::Delivered(payload)
    }

    fn unavailable(&self) -> QuestionOutcome {
        let message = if self.store.has_write_access() {
            ALL_CAUGHT_UP
        } else {
            BANK_EMPTY
        };
        QuestionOutcome::Unavailable {
            message: message.to_string(),
        }
    }

    /// Scores a submitted answer against its live session
    ///
    /// The session is consumed up front, so a second submission for the same
    /// question reports it as expired. Scoring uses the mode the question was
    /// issued under. `user` is updated in place even when persistence fails.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn process_answer(
        &self,
        user: &mut User,
        question_id: &str,
        selected_option: &str,
    ) -> AnswerOutcome {
        let Some(session) = self.registry.take(user.id, question_id).await else {
            debug!(user_id = %user.id, question_id = %question_id, "No live session for answer");
            return AnswerOutcome::Expired {
                message: EXPIRED_MESSAGE.to_string(),
            };
        };

        let now = Utc::now();
        let response_time = session.elapsed_seconds(now);
        if let Eligibility::Rejected(rejection) =
            self.eligibility.validate_answer_timing(response_time)
        {
            info!(user_id = %user.id, question_id = %question_id, response_time, "Answer discarded on timing");
            return AnswerOutcome::Discarded(rejection);
        }

        let question = &session.question;
        let is_correct = question.is_correct(selected_option);
        let attempt_number = session.attempt_number;
        let mode = session.mode;

        let (points, breakdown) = self.scoring.calculate_points_at(
            user,
            question,
            is_correct,
            response_time,
            attempt_number,
            mode,
            now,
        );
        let streak_broken = update_user_streak(user);
        let point_type = mode.point_type();
        apply_points_to_user(user, points, point_type);

        user.total_questions += 1;
        if is_correct {
            user.correct_answers += 1;
        }

        self.eligibility.check_and_flag_suspicious_behavior(user).await;

        let attempt = Attempt::new(
            user.id,
            question.id.clone(),
            selected_option.trim().to_uppercase(),
            is_correct,
            response_time,
            points,
            point_type,
            attempt_number,
        );
        let persisted = self.persist(user, &attempt).await;

        let rank = self.store.get_user_rank(user.id).await.unwrap_or_else(|e| {
            warn!(user_id = %user.id, error = %e, "Failed to look up rank");
            None
        });

        info!(
            user_id = %user.id,
            question_id = %question_id,
            is_correct,
            points,
            point_type = %point_type,
            "Processed answer"
        );

        AnswerOutcome::Scored(Box::new(AnswerResult {
            question_id: question.id.clone(),
            is_correct,
            selected_option: attempt.selected_option.clone(),
            correct_option: question.correct_option,
            correct_answer: question.correct_answer_text().to_string(),
            response_time_seconds: response_time,
            attempt_number,
            point_type,
            breakdown,
            totals: UserTotals::from(&*user),
            rank,
            streak_broken,
            second_attempt_available: !is_correct
                && mode.is_prize_round()
                && attempt_number == 1
                && user.tier_at(now) == UserTier::Subscriber,
            persisted,
        }))
    }

    /// Best-effort writes; failures are logged and reported, never raised
    async fn persist(&self, user: &User, attempt: &Attempt) -> bool {
        if !self.store.has_write_access() {
            warn!(user_id = %user.id, "Store is read-only, skipping persistence");
            return false;
        }

        let mut persisted = true;
        if let Err(e) = self.store.create_attempt(attempt).await {
            warn!(user_id = %user.id, error = %e, "Could not persist attempt");
            persisted = false;
        }
        if let Err(e) = self.store.update_user(user).await {
            warn!(user_id = %user.id, error = %e, "Could not persist user updates");
            persisted = false;
        }
        persisted
    }

    /// Sweeps sessions older than `max_age_seconds`
    #[instrument(skip(self))]
    pub async fn cleanup_expired_questions(&self, max_age_seconds: i64) -> usize {
        let removed = self
            .registry
            .remove_older_than(Duration::seconds(max_age_seconds), Utc::now())
            .await;
        if removed > 0 {
            info!(removed, "Cleaned up expired questions");
        }
        removed
    }
}
