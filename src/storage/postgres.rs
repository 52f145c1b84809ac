use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use super::repository::GameStore;
use crate::leaderboard::{IsoWeek, LeaderboardEntry, RewardStatus, RewardTier};
use crate::questions::models::{AnswerOption, Attempt, Question};
use crate::scoring::PointType;
use crate::shared::AppError;
use crate::user::{NotificationRecipient, User};

const USER_COLUMNS: &str = "id, display_name, ap, total_ap, pp, weekly_points, streak, \
     last_played_date, subscription_status, subscription_expires, total_questions, \
     correct_answers, is_banned, suspicious_flags, referral_code, referred_by, created_at";

const QUESTION_COLUMNS: &str = "id, category, question_text, option_a, option_b, option_c, \
     option_d, correct_option, difficulty, time_limit_seconds, sponsor, used";

/// PostgreSQL implementation of the game store
///
/// Expects the `users`, `questions`, `attempts` and `weekly_leaderboard` tables.
pub struct PostgresGameStore {
    pool: PgPool,
}

impl PostgresGameStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str) -> impl Fn(sqlx::Error) -> AppError + '_ {
    move |e| {
        warn!(error = %e, context = %context, "Database operation failed");
        AppError::DatabaseError(e.to_string())
    }
}

fn user_from_row(row: &PgRow) -> User {
    let status: String = row.get("subscription_status");
    User {
        id: row.get("id"),
        display_name: row.get("display_name"),
        ap: row.get("ap"),
        total_ap: row.get("total_ap"),
        pp: row.get("pp"),
        weekly_points: row.get("weekly_points"),
        streak: row.get("streak"),
        last_played_date: row.get("last_played_date"),
        subscription_status: status.parse().unwrap_or_default(),
        subscription_expires: row.get("subscription_expires"),
        total_questions: row.get("total_questions"),
        correct_answers: row.get("correct_answers"),
        is_banned: row.get("is_banned"),
        suspicious_flags: row.get("suspicious_flags"),
        referral_code: row.get("referral_code"),
        referred_by: row.get("referred_by"),
        created_at: row.get("created_at"),
    }
}

fn question_from_row(row: &PgRow) -> Result<Question, AppError> {
    let correct: String = row.get("correct_option");
    let correct_option = correct.trim().parse::<AnswerOption>().map_err(|_| {
        AppError::DatabaseError(format!("Invalid correct option '{}' in question bank", correct))
    })?;
    let time_limit: i32 = row.get("time_limit_seconds");

    Ok(Question {
        id: row.get("id"),
        category: row.get("category"),
        text: row.get("question_text"),
        options: [
            row.get("option_a"),
            row.get("option_b"),
            row.get("option_c"),
            row.get("option_d"),
        ],
        correct_option,
        difficulty: row.get("difficulty"),
        time_limit_seconds: time_limit.max(1) as u32,
        sponsor: row.get("sponsor"),
        used: row.get("used"),
    })
}

fn attempt_from_row(row: &PgRow) -> Attempt {
    let point_type: String = row.get("point_type");
    Attempt {
        id: row.get("id"),
        user_id: row.get("user_id"),
        question_id: row.get("question_id"),
        selected_option: row.get("selected_option"),
        is_correct: row.get("is_correct"),
        response_time_seconds: row.get("response_time_seconds"),
        points_awarded: row.get("points_awarded"),
        point_type: point_type.parse().unwrap_or(PointType::Ap),
        attempt_number: row.get("attempt_number"),
        created_at: row.get("created_at"),
    }
}

fn leaderboard_from_row(row: &PgRow) -> LeaderboardEntry {
    let week: i32 = row.get("week_number");
    let rank: i32 = row.get("rank");
    let reward_type: Option<String> = row.get("reward_type");
    let reward_value: Option<i32> = row.get("reward_value");
    let status: String = row.get("reward_status");

    LeaderboardEntry {
        week_number: week as u32,
        year: row.get("year"),
        user_id: row.get("user_id"),
        display_name: row.get("display_name"),
        points: row.get("points"),
        rank: rank as u32,
        reward: reward_type
            .zip(reward_value)
            .and_then(|(kind, value)| RewardTier::from_parts(&kind, value as u32)),
        reward_status: status.parse::<RewardStatus>().unwrap_or_default(),
        approved_by: row.get("approved_by"),
        approved_at: row.get("approved_at"),
    }
}

#[async_trait]
impl GameStore for PostgresGameStore {
    fn has_write_access(&self) -> bool {
        true
    }

    async fn health_check(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get_user"))?;

        debug!(user_id = %user_id, found = row.is_some(), "Fetched user from database");
        Ok(row.as_ref().map(user_from_row))
    }

    #[instrument(skip(self, user))]
    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(&format!(
            "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.display_name)
        .bind(user.ap)
        .bind(user.total_ap)
        .bind(user.pp)
        .bind(user.weekly_points)
        .bind(user.streak)
        .bind(&user.last_played_date)
        .bind(user.subscription_status.to_string())
        .bind(user.subscription_expires)
        .bind(user.total_questions)
        .bind(user.correct_answers)
        .bind(user.is_banned)
        .bind(user.suspicious_flags)
        .bind(&user.referral_code)
        .bind(&user.referred_by)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create_user"))?;

        debug!(user_id = %user.id, "User created in database");
        Ok(())
    }

    #[instrument(skip(self, user))]
    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET display_name = $2, ap = $3, total_ap = $4, pp = $5, weekly_points = $6, \
             streak = $7, last_played_date = $8, subscription_status = $9, subscription_expires = $10, \
             total_questions = $11, correct_answers = $12, is_banned = $13, suspicious_flags = $14 \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.display_name)
        .bind(user.ap)
        .bind(user.total_ap)
        .bind(user.pp)
        .bind(user.weekly_points)
        .bind(user.streak)
        .bind(&user.last_played_date)
        .bind(user.subscription_status.to_string())
        .bind(user.subscription_expires)
        .bind(user.total_questions)
        .bind(user.correct_answers)
        .bind(user.is_banned)
        .bind(user.suspicious_flags)
        .execute(&self.pool)
        .await
        .map_err(db_error("update_user"))?;

        if result.rows_affected() == 0 {
            warn!(user_id = %user.id, "User not found for update");
            return Err(AppError::NotFound("User not found".to_string()));
        }

        debug!(user_id = %user.id, "User updated in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_user_by_referral_code(&self, code: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE referral_code = $1",
            USER_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get_user_by_referral_code"))?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn get_all_users(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(&format!("SELECT {} FROM users", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("get_all_users"))?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    #[instrument(skip(self, exclude), fields(excluded = exclude.len()))]
    async fn get_random_question(
        &self,
        exclude: &HashSet<String>,
    ) -> Result<Option<Question>, AppError> {
        let excluded: Vec<String> = exclude.iter().cloned().collect();
        let row = sqlx::query(&format!(
            "SELECT {} FROM questions WHERE used = FALSE AND NOT (id = ANY($1)) ORDER BY random() LIMIT 1",
            QUESTION_COLUMNS
        ))
        .bind(&excluded)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get_random_question"))?;

        row.as_ref().map(question_from_row).transpose()
    }

    async fn get_question(&self, question_id: &str) -> Result<Option<Question>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get_question"))?;

        row.as_ref().map(question_from_row).transpose()
    }

    #[instrument(skip(self, attempt), fields(attempt_id = %attempt.id))]
    async fn create_attempt(&self, attempt: &Attempt) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO attempts (id, user_id, question_id, selected_option, is_correct, \
             response_time_seconds, points_awarded, point_type, attempt_number, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&attempt.id)
        .bind(attempt.user_id)
        .bind(&attempt.question_id)
        .bind(&attempt.selected_option)
        .bind(attempt.is_correct)
        .bind(attempt.response_time_seconds)
        .bind(attempt.points_awarded)
        .bind(attempt.point_type.to_string())
        .bind(attempt.attempt_number)
        .bind(attempt.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create_attempt"))?;

        debug!(user_id = %attempt.user_id, question_id = %attempt.question_id, "Attempt recorded in database");
        Ok(())
    }

    async fn get_answered_question_ids(&self, user_id: i64) -> Result<HashSet<String>, AppError> {
        let rows = sqlx::query("SELECT DISTINCT question_id FROM attempts WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("get_answered_question_ids"))?;

        Ok(rows.iter().map(|row| row.get("question_id")).collect())
    }

    async fn get_user_attempts_count(
        &self,
        user_id: i64,
        question_id: &str,
    ) -> Result<usize, AppError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM attempts WHERE user_id = $1 AND question_id = $2",
        )
        .bind(user_id)
        .bind(question_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("get_user_attempts_count"))?;

        let count: i64 = row.get("count");
        Ok(count.max(0) as usize)
    }

    async fn get_user_question_attempts(
        &self,
        user_id: i64,
        question_id: &str,
    ) -> Result<Vec<Attempt>, AppError> {
        let rows = sqlx::query(
            "SELECT id, user_id, question_id, selected_option, is_correct, response_time_seconds, \
             points_awarded, point_type, attempt_number, created_at FROM attempts \
             WHERE user_id = $1 AND question_id = $2 ORDER BY created_at ASC, attempt_number ASC",
        )
        .bind(user_id)
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("get_user_question_attempts"))?;

        Ok(rows.iter().map(attempt_from_row).collect())
    }

    async fn get_user_hourly_attempts(&self, user_id: i64) -> Result<u32, AppError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM attempts WHERE user_id = $1 AND created_at > $2",
        )
        .bind(user_id)
        .bind(Utc::now() - Duration::hours(1))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("get_user_hourly_attempts"))?;

        let count: i64 = row.get("count");
        Ok(count.max(0) as u32)
    }

    async fn get_oldest_attempt_within_hour(
        &self,
        user_id: i64,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        let row = sqlx::query(
            "SELECT MIN(created_at) AS oldest FROM attempts WHERE user_id = $1 AND created_at > $2",
        )
        .bind(user_id)
        .bind(Utc::now() - Duration::hours(1))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("get_oldest_attempt_within_hour"))?;

        Ok(row.get("oldest"))
    }

    async fn get_recent_attempt_correctness(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<bool>, AppError> {
        let rows = sqlx::query(
            "SELECT is_correct FROM attempts WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("get_recent_attempt_correctness"))?;

        Ok(rows.iter().map(|row| row.get("is_correct")).collect())
    }

    async fn get_weekly_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, AppError> {
        let rows = sqlx::query(
            "SELECT id, display_name, weekly_points FROM users ORDER BY weekly_points DESC, id ASC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("get_weekly_leaderboard"))?;

        let week = IsoWeek::current();
        Ok(rows
            .iter()
            .enumerate()
            .map(|(position, row)| {
                LeaderboardEntry::new(
                    week,
                    row.get("id"),
                    row.get("display_name"),
                    row.get("weekly_points"),
                    position as u32 + 1,
                )
            })
            .collect())
    }

    async fn get_user_rank(&self, user_id: i64) -> Result<Option<u32>, AppError> {
        let row = sqlx::query(
            "SELECT rank FROM (SELECT id, ROW_NUMBER() OVER (ORDER BY weekly_points DESC, id ASC) AS rank \
             FROM users) ranked WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get_user_rank"))?;

        Ok(row.map(|row| {
            let rank: i64 = row.get("rank");
            rank as u32
        }))
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn save_weekly_leaderboard(&self, entries: &[LeaderboardEntry]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin leaderboard save"))?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO weekly_leaderboard (week_number, year, user_id, display_name, points, rank, \
                 reward_type, reward_value, reward_status, approved_by, approved_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(entry.week_number as i32)
            .bind(entry.year)
            .bind(entry.user_id)
            .bind(&entry.display_name)
            .bind(entry.points)
            .bind(entry.rank as i32)
            .bind(entry.reward.map(|r| r.kind()))
            .bind(entry.reward.map(|r| r.value() as i32))
            .bind(entry.reward_status.to_string())
            .bind(entry.approved_by)
            .bind(entry.approved_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error("save_weekly_leaderboard"))?;
        }

        tx.commit().await.map_err(db_error("commit leaderboard save"))?;
        info!(count = entries.len(), "Saved weekly leaderboard to database");
        Ok(())
    }

    async fn get_saved_leaderboard(&self, week: IsoWeek) -> Result<Vec<LeaderboardEntry>, AppError> {
        let rows = sqlx::query(
            "SELECT week_number, year, user_id, display_name, points, rank, reward_type, reward_value, \
             reward_status, approved_by, approved_at FROM weekly_leaderboard \
             WHERE week_number = $1 AND year = $2 ORDER BY rank ASC",
        )
        .bind(week.week as i32)
        .bind(week.year)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("get_saved_leaderboard"))?;

        Ok(rows.iter().map(leaderboard_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn reset_weekly_points(&self) -> Result<u64, AppError> {
        let result =
            sqlx::query("UPDATE users SET total_ap = total_ap + ap, ap = 0, weekly_points = 0")
                .execute(&self.pool)
                .await
                .map_err(db_error("reset_weekly_points"))?;

        info!(users_reset = result.rows_affected(), "Weekly points reset in database");
        Ok(result.rows_affected())
    }

    async fn get_users_for_notifications(&self) -> Result<Vec<NotificationRecipient>, AppError> {
        let rows = sqlx::query(
            "SELECT id, display_name, streak, last_played_date FROM users WHERE is_banned = FALSE",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("get_users_for_notifications"))?;

        Ok(rows
            .iter()
            .map(|row| NotificationRecipient {
                user_id: row.get("id"),
                display_name: row.get("display_name"),
                streak: row.get("streak"),
                last_played_date: row.get("last_played_date"),
            })
            .collect())
    }
}
