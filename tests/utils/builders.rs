use chrono::{Duration, Utc};

use quizround::questions::models::{AnswerOption, Question};
use quizround::user::SubscriptionStatus;
use quizround::User;

// ============================================================================
// Domain Builders
// ============================================================================

pub struct QuestionBuilder {
    question: Question,
}

impl QuestionBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            question: Question {
                id: id.to_string(),
                category: "geography".to_string(),
                text: format!("Which city is the capital? ({})", id),
                options: [
                    "Accra".to_string(),
                    "Kumasi".to_string(),
                    "Tamale".to_string(),
                    "Takoradi".to_string(),
                ],
                correct_option: AnswerOption::A,
                difficulty: "easy".to_string(),
                time_limit_seconds: 30,
                sponsor: None,
                used: false,
            },
        }
    }

    pub fn correct(mut self, option: AnswerOption) -> Self {
        self.question.correct_option = option;
        self
    }

    pub fn sponsored_by(mut self, sponsor: &str) -> Self {
        self.question.sponsor = Some(sponsor.to_string());
        self
    }

    pub fn build(self) -> Question {
        self.question
    }
}

/// Question with answer A
pub fn question(id: &str) -> Question {
    QuestionBuilder::new(id).build()
}

pub struct UserBuilder {
    user: User,
}

impl UserBuilder {
    pub fn new(id: i64) -> Self {
        Self {
            user: User::new(id, format!("player{}", id), format!("REF{:05}", id)),
        }
    }

    pub fn subscriber(mut self) -> Self {
        self.user.subscription_status = SubscriptionStatus::Subscriber;
        self.user.subscription_expires = Some(Utc::now() + Duration::days(30));
        self
    }

    /// Streak already counted for today
    pub fn played_today_with_streak(mut self, streak: i32) -> Self {
        self.user.streak = streak;
        self.user.last_played_date = Some(Utc::now().date_naive().to_string());
        self
    }

    pub fn with_points(mut self, ap: i64, pp: i64, weekly_points: i64) -> Self {
        self.user.ap = ap;
        self.user.pp = pp;
        self.user.weekly_points = weekly_points;
        self
    }

    pub fn banned(mut self) -> Self {
        self.user.is_banned = true;
        self
    }

    pub fn build(self) -> User {
        self.user
    }
}
