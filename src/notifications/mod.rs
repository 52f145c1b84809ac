// Public API
pub use messages::{
    Announcement, DailyReminderPayload, RoundEndPayload, RoundStartPayload, RoundWarningPayload,
    WeeklyResetPayload,
};
pub use notifier::{BroadcastReport, Broadcaster, Notifier, NotifyError, TracingNotifier};
pub use reminders::{needs_reminder, send_daily_reminders};

// Internal modules
mod messages;
mod notifier;
mod reminders;
