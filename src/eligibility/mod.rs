// Public API
pub use checker::{evaluate_attempts, wait_minutes, EligibilityChecker};
pub use types::{AttemptVerdict, Eligibility, Rejection, RejectionReason};

// Internal modules
mod checker;
mod types;
