// Public API
pub use engine::{
    apply_points_to_user, parse_played_date, update_user_streak, update_user_streak_on,
    ScoringEngine,
};
pub use models::{PointType, PointsBreakdown, RoundMode};

// Internal modules
mod engine;
pub mod models;
