// Library crate for the quiz round engine
// This file exposes the public API for integration tests

pub mod config;
pub mod eligibility;
pub mod leaderboard;
pub mod notifications;
pub mod prize_round;
pub mod questions;
pub mod scoring;
pub mod shared;
pub mod storage;
pub mod user;

// Re-export commonly used types for easier access in tests
pub use config::GameConfig;
pub use notifications::{Announcement, Broadcaster, Notifier, NotifyError};
pub use prize_round::{PrizeRoundManager, RoundKind, Scheduler};
pub use questions::{AnswerOutcome, QuestionOutcome, QuestionSessionManager};
pub use shared::{AppError, AppState};
pub use storage::{GameStore, InMemoryGameStore, PostgresGameStore};
pub use user::User;
