// Public API
pub use cleanup_task::start_cleanup_task;
pub use handlers::{request_question, submit_answer};
pub use registry::SessionRegistry;
pub use service::QuestionSessionManager;
pub use types::{
    AnswerOutcome, AnswerRequest, AnswerResult, LabeledOption, QuestionOutcome, QuestionPayload,
    QuestionRequest, UserTotals,
};

// Internal modules
mod cleanup_task;
mod handlers;
pub mod models;
mod registry;
mod service;
mod types;
