use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::messages::Announcement;

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("Could not deliver to user {user_id}: {reason}")]
    Undeliverable { user_id: i64, reason: String },

    #[error("Could not encode announcement: {0}")]
    Encoding(String),
}

/// Delivery seam towards the chat transport
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: i64, announcement: &Announcement) -> Result<(), NotifyError>;
}

/// Logs every announcement as JSON; used when no transport is attached
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, user_id: i64, announcement: &Announcement) -> Result<(), NotifyError> {
        let body =
            serde_json::to_string(announcement).map_err(|e| NotifyError::Encoding(e.to_string()))?;
        info!(user_id = %user_id, kind = announcement.kind(), body = %body, "Announcement sent");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
}

/// Fans announcements out to many users; single failures never abort the batch
#[derive(Clone)]
pub struct Broadcaster {
    notifier: Arc<dyn Notifier>,
}

impl Broadcaster {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub async fn send(&self, user_id: i64, announcement: &Announcement) -> bool {
        match self.notifier.send(user_id, announcement).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to send announcement");
                false
            }
        }
    }

    /// Sends the same announcement to every recipient
    pub async fn broadcast(&self, recipients: &[i64], announcement: &Announcement) -> BroadcastReport {
        let results = join_all(
            recipients
                .iter()
                .map(|user_id| self.send(*user_id, announcement)),
        )
        .await;

        let report = tally(&results);
        info!(
            kind = announcement.kind(),
            sent = report.sent,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }

    /// Sends a distinct announcement to each user
    pub async fn send_each(&self, messages: Vec<(i64, Announcement)>) -> BroadcastReport {
        let results = join_all(
            messages
                .iter()
                .map(|(user_id, announcement)| self.send(*user_id, announcement)),
        )
        .await;
        tally(&results)
    }

    pub async fn notify_admins(&self, admin_ids: &[i64], announcement: &Announcement) -> BroadcastReport {
        if admin_ids.is_empty() {
            debug!(kind = announcement.kind(), "No admins configured, skipping");
            return BroadcastReport::default();
        }
        self.broadcast(admin_ids, announcement).await
    }
}

fn tally(results: &[bool]) -> BroadcastReport {
    let sent = results.iter().filter(|ok| **ok).count();
    BroadcastReport {
        sent,
        failed: results.len() - sent,
    }
}
