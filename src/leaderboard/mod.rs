// Public API
pub use handlers::get_leaderboard;
pub use models::{IsoWeek, LeaderboardEntry, RewardStatus, RewardTier, WeeklyRewardTable};
pub use service::{assign_rewards, LeaderboardAggregator, UserPosition, WeeklyRewardsOutcome};

// Internal modules
mod handlers;
mod models;
mod service;
