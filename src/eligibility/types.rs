use serde::{Deserialize, Serialize};

/// Why an action was refused; the message carries the user-facing remedy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    Banned,
    RateLimited { limit: u32, wait_minutes: i64 },
    UnderReview,
    EntryRequirement,
    AlreadyAnswered,
    AttemptsExhausted,
    AnswerTooFast,
    InvalidTiming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: RejectionReason,
    pub message: String,
}

impl Rejection {
    pub fn new(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// Outcome of a gate check; rejections are values, not errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    Rejected(Rejection),
}

impl Eligibility {
    pub fn rejected(reason: RejectionReason, message: impl Into<String>) -> Self {
        Eligibility::Rejected(Rejection::new(reason, message))
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Eligibility::Allowed)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Eligibility::Allowed => None,
            Eligibility::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Per-question attempt gate result.
///
/// When allowed, `attempt_number` is the number the next attempt will carry;
/// when refused it is the count of attempts already on record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptVerdict {
    pub attempt_number: i32,
    pub rejection: Option<Rejection>,
}

impl AttemptVerdict {
    pub fn allowed(attempt_number: i32) -> Self {
        Self {
            attempt_number,
            rejection: None,
        }
    }

    pub fn refused(existing: i32, reason: RejectionReason, message: impl Into<String>) -> Self {
        Self {
            attempt_number: existing,
            rejection: Some(Rejection::new(reason, message)),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.rejection.is_none()
    }
}
