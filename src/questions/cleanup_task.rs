use std::sync::Arc;
use tokio::time::interval;
use tracing::{debug, info, instrument};

use super::service::QuestionSessionManager;
use crate::config::SessionConfig;

/// Starts the background task that periodically expires unanswered questions
#[instrument(skip(manager))]
pub async fn start_cleanup_task(manager: Arc<QuestionSessionManager>, config: SessionConfig) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        max_age_secs = config.max_age.as_secs(),
        "Starting active question cleanup task"
    );

    let mut cleanup_interval = interval(config.cleanup_interval);

    loop {
        cleanup_interval.tick().await;
        run_cleanup(&manager, &config).await;
    }
}

async fn run_cleanup(manager: &QuestionSessionManager, config: &SessionConfig) -> usize {
    let removed = manager
        .cleanup_expired_questions(config.max_age.as_secs() as i64)
        .await;
    debug!(removed, "Active question cleanup completed");
    removed
}
