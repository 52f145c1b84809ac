use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use quizround::{Announcement, Notifier, NotifyError};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Records every announcement per user; listed users fail delivery
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<HashMap<i64, Vec<Announcement>>>>,
    unreachable: Arc<RwLock<HashSet<i64>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn block(&self, user_id: i64) {
        self.unreachable.write().await.insert(user_id);
    }

    pub async fn messages_for(&self, user_id: i64) -> Vec<Announcement> {
        self.sent
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn kinds_for(&self, user_id: i64) -> Vec<&'static str> {
        self.messages_for(user_id)
            .await
            .iter()
            .map(Announcement::kind)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, user_id: i64, announcement: &Announcement) -> Result<(), NotifyError> {
        if self.unreachable.read().await.contains(&user_id) {
            return Err(NotifyError::Undeliverable {
                user_id,
                reason: "chat closed".to_string(),
            });
        }
        self.sent
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push(announcement.clone());
        Ok(())
    }
}
