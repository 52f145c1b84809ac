use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use super::messages::{Announcement, DailyReminderPayload};
use super::notifier::{BroadcastReport, Broadcaster};
use crate::scoring::parse_played_date;
use crate::storage::GameStore;
use crate::user::NotificationRecipient;

/// Users who already played today are skipped; unreadable dates get a reminder
pub fn needs_reminder(recipient: &NotificationRecipient, today: NaiveDate) -> bool {
    match recipient.last_played_date.as_deref().and_then(parse_played_date) {
        Some(last_played) => last_played < today,
        None => true,
    }
}

/// Nudges every user who has not played yet today to keep their streak
#[instrument(skip(store, broadcaster))]
pub async fn send_daily_reminders(
    store: &dyn GameStore,
    broadcaster: &Broadcaster,
    today: NaiveDate,
) -> BroadcastReport {
    let recipients = match store.get_users_for_notifications().await {
        Ok(recipients) => recipients,
        Err(e) => {
            warn!(error = %e, "Failed to load reminder recipients");
            return BroadcastReport::default();
        }
    };

    let messages: Vec<(i64, Announcement)> = recipients
        .iter()
        .filter(|recipient| needs_reminder(recipient, today))
        .map(|recipient| {
            (
                recipient.user_id,
                Announcement::DailyReminder(DailyReminderPayload {
                    display_name: recipient.display_name.clone(),
                    streak: recipient.streak,
                }),
            )
        })
        .collect();

    let report = broadcaster.send_each(messages).await;
    info!(sent = report.sent, failed = report.failed, "Daily reminders sent");
    report
}
