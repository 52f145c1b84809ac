use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Stored subscription flag; only meaningful together with the expiry timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Free,
    Subscriber,
}

/// Effective user class used by scoring and rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserTier {
    Free,
    Subscriber,
}

/// A player's persistent state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub display_name: String,
    /// Current-week accumulated points
    pub ap: i64,
    /// Lifetime AP archive, filled at weekly rollover
    pub total_ap: i64,
    pub pp: i64,
    pub weekly_points: i64,
    pub streak: i32,
    /// ISO date of the last scored attempt, kept as stored text
    pub last_played_date: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub subscription_expires: Option<DateTime<Utc>>,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub is_banned: bool,
    pub suspicious_flags: i32,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: i64, display_name: String, referral_code: String) -> Self {
        Self {
            id,
            display_name,
            ap: 0,
            total_ap: 0,
            pp: 0,
            weekly_points: 0,
            streak: 0,
            last_played_date: None,
            subscription_status: SubscriptionStatus::Free,
            subscription_expires: None,
            total_questions: 0,
            correct_answers: 0,
            is_banned: false,
            suspicious_flags: 0,
            referral_code,
            referred_by: None,
            created_at: Utc::now(),
        }
    }

    /// Subscriber only while the flag is set and the expiry lies in the future
    pub fn is_subscriber_at(&self, now: DateTime<Utc>) -> bool {
        self.subscription_status == SubscriptionStatus::Subscriber
            && self.subscription_expires.is_some_and(|expires| expires > now)
    }

    pub fn tier_at(&self, now: DateTime<Utc>) -> UserTier {
        if self.is_subscriber_at(now) {
            UserTier::Subscriber
        } else {
            UserTier::Free
        }
    }

    pub fn tier(&self) -> UserTier {
        self.tier_at(Utc::now())
    }

    pub fn lifetime_ap(&self) -> i64 {
        self.total_ap + self.ap
    }

    /// Percentage of correct answers rounded to one decimal
    pub fn accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        let pct = f64::from(self.correct_answers) / f64::from(self.total_questions) * 100.0;
        (pct * 10.0).round() / 10.0
    }

    pub fn display_name_or_anonymous(&self) -> &str {
        if self.display_name.is_empty() {
            "Anonymous"
        } else {
            &self.display_name
        }
    }
}

/// Minimal projection used for broadcasts and reminders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecipient {
    pub user_id: i64,
    pub display_name: String,
    pub streak: i32,
    pub last_played_date: Option<String>,
}

impl From<&User> for NotificationRecipient {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            display_name: user.display_name.clone(),
            streak: user.streak,
            last_played_date: user.last_played_date.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscriber(expires: Option<DateTime<Utc>>) -> User {
        let mut user = User::new(1, "sub".to_string(), "CODE0001".to_string());
        user.subscription_status = SubscriptionStatus::Subscriber;
        user.subscription_expires = expires;
        user
    }

    #[test]
    fn active_subscription_is_subscriber_tier() {
        let now = Utc::now();
        let user = subscriber(Some(now + Duration::days(3)));
        assert_eq!(user.tier_at(now), UserTier::Subscriber);
    }

    #[test]
    fn expired_subscription_falls_back_to_free() {
        let now = Utc::now();
        let user = subscriber(Some(now - Duration::seconds(1)));
        assert_eq!(user.tier_at(now), UserTier::Free);
    }

    #[test]
    fn subscriber_flag_without_expiry_is_free() {
        let user = subscriber(None);
        assert_eq!(user.tier(), UserTier::Free);
    }

    #[test]
    fn accuracy_rounds_to_one_decimal() {
        let mut user = User::new(1, "a".to_string(), "X".to_string());
        assert_eq!(user.accuracy(), 0.0);
        user.total_questions = 3;
        user.correct_answers = 2;
        assert_eq!(user.accuracy(), 66.7);
    }

    #[test]
    fn status_parses_from_stored_text() {
        assert_eq!(
            "subscriber".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::Subscriber
        );
        assert_eq!(SubscriptionStatus::Free.to_string(), "free");
    }
}
