// Public API
pub use handlers::get_prize_round_status;
pub use models::{reward_label, PrizeRoundError, RoundKind, RoundStatus, RoundWinner};
pub use scheduler::{
    active_window, next_events, next_events_after, settle_due_round, spawn_round_end,
    ScheduledEvent, Scheduler,
};
pub use state::{rank_round_winners, PrizeRoundManager};

// Internal modules
mod handlers;
mod models;
mod scheduler;
mod state;
