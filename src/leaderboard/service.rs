use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::models::{LeaderboardEntry, RewardStatus, RewardTier, WeeklyRewardTable};
use crate::config::LeaderboardConfig;
use crate::shared::AppError;
use crate::storage::GameStore;

/// Where a user stands this week and what that rank would pay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPosition {
    pub rank: Option<u32>,
    pub weekly_points: i64,
    pub potential_reward: Option<RewardTier>,
}

/// Result of a weekly rollover
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyRewardsOutcome {
    pub success: bool,
    pub summary: String,
    /// Final standings with rewards attached; empty on failure
    pub entries: Vec<LeaderboardEntry>,
}

impl WeeklyRewardsOutcome {
    fn failed(summary: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
            entries: Vec::new(),
        }
    }
}

/// Weekly ranking and rollover
pub struct LeaderboardAggregator {
    store: Arc<dyn GameStore>,
    config: LeaderboardConfig,
}

impl LeaderboardAggregator {
    pub fn new(store: Arc<dyn GameStore>, config: LeaderboardConfig) -> Self {
        Self { store, config }
    }

    #[instrument(skip(self))]
    pub async fn get_current_leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        self.store
            .get_weekly_leaderboard(limit)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to fetch weekly leaderboard");
                Vec::new()
            })
    }

    pub async fn get_display_leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.get_current_leaderboard(self.config.display_count).await
    }

    /// Every ranked entry eligible for the weekly snapshot
    pub async fn get_full_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, AppError> {
        self.store.get_weekly_leaderboard(self.config.top_count).await
    }

    /// Short top slice shown in round announcements
    pub async fn preview(&self) -> Vec<LeaderboardEntry> {
        self.get_current_leaderboard(self.config.preview_count).await
    }

    pub async fn get_user_rank(&self, user_id: i64) -> Option<u32> {
        self.store.get_user_rank(user_id).await.unwrap_or_else(|e| {
            warn!(user_id = %user_id, error = %e, "Failed to fetch user rank");
            None
        })
    }

    pub async fn user_position(&self, user_id: i64, weekly_points: i64) -> UserPosition {
        let rank = self.get_user_rank(user_id).await;
        UserPosition {
            rank,
            weekly_points,
            potential_reward: rank.and_then(|r| self.config.rewards.reward_for(r)),
        }
    }

    /// Snapshots the standings with rewards, then zeroes the weekly counters
    ///
    /// A failed save leaves the weekly points untouched.
    #[instrument(skip(self))]
    pub async fn process_weekly_rewards(&self) -> WeeklyRewardsOutcome {
        let mut entries = match self.get_full_leaderboard().await {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Failed to load leaderboard for weekly rewards");
                return WeeklyRewardsOutcome::failed(format!(
                    "Error processing weekly rewards: {}",
                    e
                ));
            }
        };

        if entries.is_empty() {
            info!("No players this week, skipping weekly rewards");
            return WeeklyRewardsOutcome::failed("No players this week");
        }

        let reward_count = assign_rewards(&mut entries, &self.config.rewards);

        if let Err(e) = self.store.save_weekly_leaderboard(&entries).await {
            error!(error = %e, "Failed to save weekly leaderboard");
            return WeeklyRewardsOutcome::failed(format!("Error saving weekly leaderboard: {}", e));
        }

        if let Err(e) = self.store.reset_weekly_points().await {
            error!(error = %e, "Failed to reset weekly points");
            return WeeklyRewardsOutcome::failed(format!("Error resetting weekly points: {}", e));
        }

        let summary = format!(
            "Weekly reset completed. Total players: {}. Rewards assigned: {}. Leaderboard saved and points reset.",
            entries.len(),
            reward_count
        );
        info!(players = entries.len(), rewards = reward_count, "Weekly rewards processed");

        WeeklyRewardsOutcome {
            success: true,
            summary,
            entries,
        }
    }
}

/// Attaches pending rewards by rank and returns how many were assigned
pub fn assign_rewards(entries: &mut [LeaderboardEntry], table: &WeeklyRewardTable) -> usize {
    let mut assigned = 0;
    for entry in entries.iter_mut() {
        entry.reward = table.reward_for(entry.rank);
        if entry.reward.is_some() {
            entry.reward_status = RewardStatus::Pending;
            assigned += 1;
        }
    }
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::IsoWeek;
    use crate::storage::InMemoryGameStore;
    use crate::user::User;

    fn player(id: i64, weekly: i64) -> User {
        let mut user = User::new(id, format!("p{}", id), format!("CODE{:04}", id));
        user.weekly_points = weekly;
        user.ap = weekly;
        user
    }

    fn aggregator(store: Arc<InMemoryGameStore>) -> LeaderboardAggregator {
        LeaderboardAggregator::new(store, LeaderboardConfig::default())
    }

    #[tokio::test]
    async fn weekly_rewards_snapshot_and_reset() {
        let users: Vec<User> = (1..=12).map(|id| player(id, id * 10)).collect();
        let store = Arc::new(InMemoryGameStore::new().with_users(users));

        let outcome = aggregator(store.clone()).process_weekly_rewards().await;

        assert!(outcome.success);
        assert_eq!(outcome.entries.len(), 12);
        assert_eq!(outcome.entries[0].user_id, 12);
        assert_eq!(
            outcome.entries[0].reward,
            Some(RewardTier::Cash { amount_usd: 100 })
        );
        assert_eq!(outcome.entries[11].reward, None);
        assert!(outcome.summary.contains("Rewards assigned: 10"));

        let saved = store.get_saved_leaderboard(IsoWeek::current()).await.unwrap();
        assert_eq!(saved.len(), 12);

        let top = store.get_user(12).await.unwrap().unwrap();
        assert_eq!(top.weekly_points, 0);
        assert_eq!(top.total_ap, 120);
    }

    #[tokio::test]
    async fn weekly_snapshot_is_capped_at_top_count() {
        let users: Vec<User> = (1..=5).map(|id| player(id, id * 10)).collect();
        let store = Arc::new(InMemoryGameStore::new().with_users(users));
        let aggregator = LeaderboardAggregator::new(
            store.clone(),
            LeaderboardConfig {
                top_count: 3,
                display_count: 2,
                ..LeaderboardConfig::default()
            },
        );

        assert_eq!(aggregator.get_display_leaderboard().await.len(), 2);
        assert_eq!(aggregator.get_full_leaderboard().await.unwrap().len(), 3);

        let outcome = aggregator.process_weekly_rewards().await;
        assert!(outcome.success);
        assert_eq!(
            outcome.entries.iter().map(|e| e.user_id).collect::<Vec<_>>(),
            vec![5, 4, 3]
        );

        // Users below the cut are still reset
        let outside = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(outside.weekly_points, 0);
    }

    #[tokio::test]
    async fn empty_week_reports_failure() {
        let outcome = aggregator(Arc::new(InMemoryGameStore::new()))
            .process_weekly_rewards()
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.summary, "No players this week");
    }

    #[tokio::test]
    async fn failed_save_keeps_weekly_points() {
        let store = Arc::new(
            InMemoryGameStore::new()
                .with_users(vec![player(1, 50)])
                .read_only(),
        );

        let outcome = aggregator(store.clone()).process_weekly_rewards().await;

        assert!(!outcome.success);
        assert_eq!(store.get_user(1).await.unwrap().unwrap().weekly_points, 50);
    }

    #[tokio::test]
    async fn position_reports_potential_reward() {
        let store = Arc::new(InMemoryGameStore::new().with_users(vec![player(1, 5), player(2, 9)]));
        let position = aggregator(store).user_position(1, 5).await;

        assert_eq!(position.rank, Some(2));
        assert_eq!(
            position.potential_reward,
            Some(RewardTier::Cash { amount_usd: 50 })
        );
    }

    #[test]
    fn assign_rewards_marks_pending() {
        let week = IsoWeek::current();
        let mut entries = vec![
            LeaderboardEntry::new(week, 1, "a".to_string(), 30, 1),
            LeaderboardEntry::new(week, 2, "b".to_string(), 20, 11),
        ];
        assert_eq!(assign_rewards(&mut entries, &WeeklyRewardTable::default()), 1);
        assert_eq!(entries[0].reward_status, RewardStatus::Pending);
        assert!(entries[1].reward.is_none());
    }
}
