use chrono::{Duration, Utc};
use std::sync::Arc;

use quizround::questions::models::Question;
use quizround::questions::QuestionPayload;
use quizround::scoring::RoundMode;
use quizround::{
    AnswerOutcome, AppState, GameConfig, GameStore, InMemoryGameStore, QuestionOutcome, User,
};

use super::mocks::RecordingNotifier;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub state: AppState,
    pub store: Arc<InMemoryGameStore>,
    pub notifier: RecordingNotifier,
}

pub struct TestSetupBuilder {
    config: GameConfig,
    users: Vec<User>,
    questions: Vec<Question>,
    read_only: bool,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: GameConfig::default(),
            users: vec![],
            questions: vec![],
            read_only: false,
        }
    }

    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.users.extend(users);
        self
    }

    pub fn with_questions(mut self, questions: Vec<Question>) -> Self {
        self.questions.extend(questions);
        self
    }

    pub fn with_config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_admins(mut self, admin_ids: Vec<i64>) -> Self {
        self.config.admin_user_ids = admin_ids;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn build(self) -> TestSetup {
        let mut store = InMemoryGameStore::new()
            .with_users(self.users)
            .with_questions(self.questions);
        if self.read_only {
            store = store.read_only();
        }
        let store = Arc::new(store);
        let notifier = RecordingNotifier::new();
        let state = AppState::new(
            Arc::new(self.config),
            store.clone(),
            Arc::new(notifier.clone()),
        );

        TestSetup {
            state,
            store,
            notifier,
        }
    }
}

impl TestSetup {
    pub async fn user(&self, user_id: i64) -> User {
        self.store
            .get_user(user_id)
            .await
            .unwrap()
            .expect("user should exist")
    }

    pub async fn mode(&self) -> RoundMode {
        self.state.prize_round.current_mode().await
    }

    pub async fn request_question(&self, user_id: i64) -> QuestionOutcome {
        let user = self.user(user_id).await;
        let mode = self.mode().await;
        self.state.questions.get_question_for_user(&user, mode).await
    }

    pub async fn retry_question(&self, user_id: i64, question_id: &str) -> QuestionOutcome {
        let user = self.user(user_id).await;
        let mode = self.mode().await;
        self.state
            .questions
            .retry_question(&user, question_id, mode)
            .await
    }

    /// Requests a question and expects it to be delivered
    pub async fn deliver(&self, user_id: i64) -> QuestionPayload {
        match self.request_question(user_id).await {
            QuestionOutcome::Delivered(payload) => payload,
            other => panic!("expected a question, got {:?}", other),
        }
    }

    /// Pretends the player spent `secs` reading the question
    pub async fn wait_on(&self, user_id: i64, question_id: &str, secs: i64) {
        let registry = self.state.questions.registry();
        let mut session = registry
            .take(user_id, question_id)
            .await
            .expect("session should be open");
        session.issued_at = Utc::now() - Duration::seconds(secs);
        registry.insert(user_id, session).await;
    }

    pub async fn answer(&self, user_id: i64, question_id: &str, option: &str) -> AnswerOutcome {
        let mut user = self.user(user_id).await;
        self.state
            .questions
            .process_answer(&mut user, question_id, option)
            .await
    }

    /// Delivers a question, waits `secs`, then answers it
    pub async fn play(&self, user_id: i64, option: &str, secs: i64) -> AnswerOutcome {
        let payload = self.deliver(user_id).await;
        self.wait_on(user_id, &payload.question_id, secs).await;
        self.answer(user_id, &payload.question_id, option).await
    }
}
