use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::models::ActiveQuestionSession;

type SessionKey = (i64, String);

/// Process-wide map of delivered questions awaiting an answer
///
/// Each entry is consumed at most once: `take` removes it, so a replayed
/// submission finds nothing.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionKey, ActiveQuestionSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session, replacing any earlier one for the same key
    pub async fn insert(&self, user_id: i64, session: ActiveQuestionSession) {
        let key = (user_id, session.question.id.clone());
        debug!(user_id = %user_id, question_id = %key.1, "Registering active question");
        self.sessions.write().await.insert(key, session);
    }

    /// Removes and returns the session for this key
    pub async fn take(&self, user_id: i64, question_id: &str) -> Option<ActiveQuestionSession> {
        self.sessions
            .write()
            .await
            .remove(&(user_id, question_id.to_string()))
    }

    pub async fn contains(&self, user_id: i64, question_id: &str) -> bool {
        self.sessions
            .read()
            .await
            .contains_key(&(user_id, question_id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drops sessions issued more than `max_age` before `now`
    pub async fn remove_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|(user_id, question_id), session| {
            let keep = now - session.issued_at <= max_age;
            if !keep {
                info!(user_id = %user_id, question_id = %question_id, "Expired active question");
            }
            keep
        });
        before - sessions.len()
    }
}
