use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::seq::IndexedRandom;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::leaderboard::{IsoWeek, LeaderboardEntry};
use crate::questions::models::{Attempt, Question};
use crate::shared::AppError;
use crate::user::{NotificationRecipient, User};

/// Everything the game core needs from persistence, whatever the backend
#[async_trait]
pub trait GameStore: Send + Sync {
    /// False when the backend is degraded to reads only
    fn has_write_access(&self) -> bool;
    async fn health_check(&self) -> bool;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, AppError>;
    async fn create_user(&self, user: &User) -> Result<(), AppError>;
    async fn update_user(&self, user: &User) -> Result<(), AppError>;
    async fn get_user_by_referral_code(&self, code: &str) -> Result<Option<User>, AppError>;
    async fn get_all_users(&self) -> Result<Vec<User>, AppError>;

    /// Random unexhausted question whose id is not in `exclude`
    async fn get_random_question(
        &self,
        exclude: &HashSet<String>,
    ) -> Result<Option<Question>, AppError>;
    async fn get_question(&self, question_id: &str) -> Result<Option<Question>, AppError>;

    async fn create_attempt(&self, attempt: &Attempt) -> Result<(), AppError>;
    async fn get_answered_question_ids(&self, user_id: i64) -> Result<HashSet<String>, AppError>;
    async fn get_user_attempts_count(
        &self,
        user_id: i64,
        question_id: &str,
    ) -> Result<usize, AppError>;
    /// Attempts on one question, oldest first
    async fn get_user_question_attempts(
        &self,
        user_id: i64,
        question_id: &str,
    ) -> Result<Vec<Attempt>, AppError>;
    async fn get_user_hourly_attempts(&self, user_id: i64) -> Result<u32, AppError>;
    async fn get_oldest_attempt_within_hour(
        &self,
        user_id: i64,
    ) -> Result<Option<DateTime<Utc>>, AppError>;
    /// Correctness of the most recent attempts, newest first
    async fn get_recent_attempt_correctness(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<bool>, AppError>;

    /// Users ordered by weekly points, ranked by position
    async fn get_weekly_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, AppError>;
    async fn get_user_rank(&self, user_id: i64) -> Result<Option<u32>, AppError>;
    async fn save_weekly_leaderboard(&self, entries: &[LeaderboardEntry]) -> Result<(), AppError>;
    async fn get_saved_leaderboard(&self, week: IsoWeek) -> Result<Vec<LeaderboardEntry>, AppError>;
    /// Archives AP into the lifetime total and zeroes the weekly counters
    async fn reset_weekly_points(&self) -> Result<u64, AppError>;

    async fn get_users_for_notifications(&self) -> Result<Vec<NotificationRecipient>, AppError>;
}

/// In-memory implementation of GameStore for development and testing
///
/// Data is lost on restart. A read-only instance rejects every write, which
/// mirrors a backend running without write credentials. An unreachable
/// instance fails health checks and full user scans.
pub struct InMemoryGameStore {
    users: RwLock<HashMap<i64, User>>,
    questions: RwLock<Vec<Question>>,
    attempts: RwLock<Vec<Attempt>>,
    leaderboard_history: RwLock<Vec<LeaderboardEntry>>,
    writable: bool,
    reachable: AtomicBool,
}

impl Default for InMemoryGameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGameStore {
    /// Creates a new empty, writable store
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            questions: RwLock::new(Vec::new()),
            attempts: RwLock::new(Vec::new()),
            leaderboard_history: RwLock::new(Vec::new()),
            writable: true,
            reachable: AtomicBool::new(true),
        }
    }

    pub fn with_questions(mut self, questions: Vec<Question>) -> Self {
        self.questions.get_mut().extend(questions);
        self
    }

    pub fn with_users(mut self, users: Vec<User>) -> Self {
        let map = self.users.get_mut();
        for user in users {
            map.insert(user.id, user);
        }
        self
    }

    pub fn with_attempts(mut self, attempts: Vec<Attempt>) -> Self {
        self.attempts.get_mut().extend(attempts);
        self
    }

    /// Switches the store into degraded read-only mode
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Simulates losing or regaining the backend connection
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }

    fn ensure_writable(&self, operation: &str) -> Result<(), AppError> {
        if self.writable {
            Ok(())
        } else {
            warn!(operation = %operation, "Write rejected by read-only store");
            Err(AppError::DatabaseError(format!(
                "{} unavailable: store is read-only",
                operation
            )))
        }
    }

    fn ranked(users: &HashMap<i64, User>, limit: usize) -> Vec<LeaderboardEntry> {
        let week = IsoWeek::current();
        let mut sorted: Vec<&User> = users.values().collect();
        // Id as secondary key keeps ranks stable across calls
        sorted.sort_by(|a, b| b.weekly_points.cmp(&a.weekly_points).then(a.id.cmp(&b.id)));

        sorted
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(position, user)| {
                LeaderboardEntry::new(
                    week,
                    user.id,
                    user.display_name.clone(),
                    user.weekly_points,
                    position as u32 + 1,
                )
            })
            .collect()
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    fn has_write_access(&self) -> bool {
        self.writable
    }

    async fn health_check(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        let user = users.get(&user_id).cloned();
        debug!(user_id = %user_id, found = user.is_some(), "Fetched user from memory");
        Ok(user)
    }

    #[instrument(skip(self, user))]
    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        self.ensure_writable("create_user")?;

        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            warn!(user_id = %user.id, "User already exists in memory");
            return Err(AppError::DatabaseError("User already exists".to_string()));
        }
        users.insert(user.id, user.clone());

        debug!(user_id = %user.id, "User created in memory");
        Ok(())
    }

    #[instrument(skip(self, user))]
    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        self.ensure_writable("update_user")?;

        let mut users = self.users.write().await;
        match users.get_mut(&user.id) {
            Some(stored) => {
                *stored = user.clone();
                debug!(user_id = %user.id, "User updated in memory");
                Ok(())
            }
            None => {
                warn!(user_id = %user.id, "User not found for update in memory");
                Err(AppError::NotFound("User not found".to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_user_by_referral_code(&self, code: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.referral_code == code).cloned())
    }

    async fn get_all_users(&self) -> Result<Vec<User>, AppError> {
        if !self.reachable.load(Ordering::SeqCst) {
            warn!("User scan failed: store unreachable");
            return Err(AppError::DatabaseError("store unreachable".to_string()));
        }
        let users = self.users.read().await;
        Ok(users.values().cloned().collect())
    }

    #[instrument(skip(self, exclude), fields(excluded = exclude.len()))]
    async fn get_random_question(
        &self,
        exclude: &HashSet<String>,
    ) -> Result<Option<Question>, AppError> {
        let questions = self.questions.read().await;
        let candidates: Vec<&Question> = questions
            .iter()
            .filter(|q| !q.used && !exclude.contains(&q.id))
            .collect();

        if candidates.is_empty() {
            debug!("No candidate questions left");
            return Ok(None);
        }

        Ok(candidates.choose(&mut rand::rng()).map(|q| (*q).clone()))
    }

    async fn get_question(&self, question_id: &str) -> Result<Option<Question>, AppError> {
        let questions = self.questions.read().await;
        Ok(questions.iter().find(|q| q.id == question_id).cloned())
    }

    #[instrument(skip(self, attempt), fields(attempt_id = %attempt.id))]
    async fn create_attempt(&self, attempt: &Attempt) -> Result<(), AppError> {
        self.ensure_writable("create_attempt")?;
        self.attempts.write().await.push(attempt.clone());
        debug!(user_id = %attempt.user_id, question_id = %attempt.question_id, "Attempt recorded in memory");
        Ok(())
    }

    async fn get_answered_question_ids(&self, user_id: i64) -> Result<HashSet<String>, AppError> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.question_id.clone())
            .collect())
    }

    async fn get_user_attempts_count(
        &self,
        user_id: i64,
        question_id: &str,
    ) -> Result<usize, AppError> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.question_id == question_id)
            .count())
    }

    async fn get_user_question_attempts(
        &self,
        user_id: i64,
        question_id: &str,
    ) -> Result<Vec<Attempt>, AppError> {
        let attempts = self.attempts.read().await;
        let mut matching: Vec<Attempt> = attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.question_id == question_id)
            .cloned()
            .collect();
        matching.sort_by_key(|a| (a.created_at, a.attempt_number));
        Ok(matching)
    }

    async fn get_user_hourly_attempts(&self, user_id: i64) -> Result<u32, AppError> {
        let cutoff = Utc::now() - Duration::hours(1);
        let attempts = self.attempts.read().await;
        Ok(attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.created_at > cutoff)
            .count() as u32)
    }

    async fn get_oldest_attempt_within_hour(
        &self,
        user_id: i64,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        let cutoff = Utc::now() - Duration::hours(1);
        let attempts = self.attempts.read().await;
        Ok(attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.created_at > cutoff)
            .map(|a| a.created_at)
            .min())
    }

    async fn get_recent_attempt_correctness(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<bool>, AppError> {
        let attempts = self.attempts.read().await;
        let mut own: Vec<&Attempt> = attempts.iter().filter(|a| a.user_id == user_id).collect();
        own.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(own.into_iter().take(limit).map(|a| a.is_correct).collect())
    }

    async fn get_weekly_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, AppError> {
        let users = self.users.read().await;
        Ok(Self::ranked(&users, limit))
    }

    async fn get_user_rank(&self, user_id: i64) -> Result<Option<u32>, AppError> {
        let users = self.users.read().await;
        Ok(Self::ranked(&users, users.len())
            .into_iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.rank))
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn save_weekly_leaderboard(&self, entries: &[LeaderboardEntry]) -> Result<(), AppError> {
        self.ensure_writable("save_weekly_leaderboard")?;
        self.leaderboard_history
            .write()
            .await
            .extend(entries.iter().cloned());
        info!(count = entries.len(), "Saved weekly leaderboard in memory");
        Ok(())
    }

    async fn get_saved_leaderboard(&self, week: IsoWeek) -> Result<Vec<LeaderboardEntry>, AppError> {
        let history = self.leaderboard_history.read().await;
        Ok(history
            .iter()
            .filter(|e| e.week_number == week.week && e.year == week.year)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn reset_weekly_points(&self) -> Result<u64, AppError> {
        self.ensure_writable("reset_weekly_points")?;

        let mut users = self.users.write().await;
        for user in users.values_mut() {
            user.total_ap += user.ap;
            user.ap = 0;
            user.weekly_points = 0;
        }

        info!(users_reset = users.len(), "Weekly points reset in memory");
        Ok(users.len() as u64)
    }

    async fn get_users_for_notifications(&self) -> Result<Vec<NotificationRecipient>, AppError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| !u.is_banned)
            .map(NotificationRecipient::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::models::{fixtures::question, AnswerOption};
    use crate::scoring::PointType;

    fn user(id: i64, weekly: i64) -> User {
        let mut user = User::new(id, format!("user-{}", id), format!("CODE{:04}", id));
        user.weekly_points = weekly;
        user.ap = weekly;
        user
    }

    fn attempt(user_id: i64, question_id: &str, correct: bool) -> Attempt {
        Attempt::new(
            user_id,
            question_id.to_string(),
            "A".to_string(),
            correct,
            4.0,
            0,
            PointType::Ap,
            1,
        )
    }

    #[tokio::test]
    async fn random_question_skips_answered_and_used() {
        let mut used = question("q3", AnswerOption::A);
        used.used = true;
        let store = InMemoryGameStore::new().with_questions(vec![
            question("q1", AnswerOption::A),
            question("q2", AnswerOption::B),
            used,
        ]);

        let exclude: HashSet<String> = ["q1".to_string()].into_iter().collect();
        for _ in 0..10 {
            let drawn = store.get_random_question(&exclude).await.unwrap().unwrap();
            assert_eq!(drawn.id, "q2");
        }

        let all: HashSet<String> = ["q1".to_string(), "q2".to_string()].into_iter().collect();
        assert!(store.get_random_question(&all).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leaderboard_ranks_by_weekly_points() {
        let store = InMemoryGameStore::new().with_users(vec![user(1, 10), user(2, 30), user(3, 20)]);

        let board = store.get_weekly_leaderboard(2).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!((board[0].user_id, board[0].rank), (2, 1));
        assert_eq!((board[1].user_id, board[1].rank), (3, 2));

        assert_eq!(store.get_user_rank(1).await.unwrap(), Some(3));
        assert_eq!(store.get_user_rank(99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn reset_archives_ap_and_zeroes_weekly() {
        let store = InMemoryGameStore::new().with_users(vec![user(1, 40)]);

        assert_eq!(store.reset_weekly_points().await.unwrap(), 1);

        let reset = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(reset.weekly_points, 0);
        assert_eq!(reset.ap, 0);
        assert_eq!(reset.total_ap, 40);
    }

    #[tokio::test]
    async fn read_only_store_rejects_writes() {
        let store = InMemoryGameStore::new().with_users(vec![user(1, 0)]).read_only();

        assert!(!store.has_write_access());
        assert!(store.update_user(&user(1, 5)).await.is_err());
        assert!(store.create_attempt(&attempt(1, "q1", true)).await.is_err());
        assert_eq!(store.get_user(1).await.unwrap().unwrap().weekly_points, 0);
    }

    #[tokio::test]
    async fn unreachable_store_fails_scans_until_restored() {
        let store = InMemoryGameStore::new().with_users(vec![user(1, 0)]);

        store.set_reachable(false);
        assert!(!store.health_check().await);
        assert!(store.get_all_users().await.is_err());

        store.set_reachable(true);
        assert!(store.health_check().await);
        assert_eq!(store.get_all_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recent_correctness_is_newest_first() {
        let mut old = attempt(1, "q1", false);
        old.created_at = Utc::now() - Duration::minutes(5);
        let store = InMemoryGameStore::new().with_attempts(vec![
            old,
            attempt(1, "q2", true),
            attempt(2, "q3", false),
        ]);

        let recent = store.get_recent_attempt_correctness(1, 20).await.unwrap();
        assert_eq!(recent, vec![true, false]);
    }

    #[tokio::test]
    async fn hourly_window_excludes_old_attempts() {
        let mut stale = attempt(1, "q1", true);
        stale.created_at = Utc::now() - Duration::minutes(61);
        let mut recent = attempt(1, "q2", true);
        recent.created_at = Utc::now() - Duration::minutes(40);
        let recent_at = recent.created_at;

        let store = InMemoryGameStore::new().with_attempts(vec![stale, recent, attempt(1, "q3", true)]);

        assert_eq!(store.get_user_hourly_attempts(1).await.unwrap(), 2);
        assert_eq!(
            store.get_oldest_attempt_within_hour(1).await.unwrap(),
            Some(recent_at)
        );
    }
}
