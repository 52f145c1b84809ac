use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::models::{PrizeRoundError, RoundKind, RoundWinner};
use super::state::PrizeRoundManager;
use crate::config::{GameConfig, ScheduleConfig};
use crate::notifications::{send_daily_reminders, Broadcaster};
use crate::storage::GameStore;

/// A wall-clock trigger the scheduler fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledEvent {
    RoundWarning(RoundKind),
    RoundStart(RoundKind),
    WeeklyReset,
    DailyReminder,
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    date.and_hms_opt(hour, minute, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn round_start(date: NaiveDate, kind: RoundKind, schedule: &ScheduleConfig) -> Option<DateTime<Utc>> {
    let hour = match kind {
        RoundKind::Morning => schedule.morning_hour,
        RoundKind::Evening => schedule.evening_hour,
    };
    at(date, hour, 0)
}

fn events_on(date: NaiveDate, schedule: &ScheduleConfig) -> Vec<(DateTime<Utc>, ScheduledEvent)> {
    let lead = Duration::from_std(schedule.warning_lead).unwrap_or_else(|_| Duration::minutes(5));
    let mut events = Vec::new();

    for kind in [RoundKind::Morning, RoundKind::Evening] {
        if let Some(start) = round_start(date, kind, schedule) {
            events.push((start - lead, ScheduledEvent::RoundWarning(kind)));
            events.push((start, ScheduledEvent::RoundStart(kind)));
        }
    }

    if date.weekday() == schedule.weekly_reset_day {
        if let Some(reset) = at(date, schedule.weekly_reset_hour, schedule.weekly_reset_minute) {
            events.push((reset, ScheduledEvent::WeeklyReset));
        }
    }

    if let Some(reminder) = at(date, schedule.daily_reminder_hour, 0) {
        events.push((reminder, ScheduledEvent::DailyReminder));
    }

    events
}

/// Earliest instant strictly after `now` and every event due at it
///
/// Looks two days ahead so warnings that fall on the previous calendar day
/// are still found.
pub fn next_events(
    now: DateTime<Utc>,
    schedule: &ScheduleConfig,
) -> Option<(DateTime<Utc>, Vec<ScheduledEvent>)> {
    let today = now.date_naive();
    let candidates: Vec<(DateTime<Utc>, ScheduledEvent)> = (0..=2)
        .filter_map(|offset| today.checked_add_signed(Duration::days(offset)))
        .flat_map(|date| events_on(date, schedule))
        .filter(|(when, _)| *when > now)
        .collect();

    let next = candidates.iter().map(|(when, _)| *when).min()?;
    let events = candidates
        .into_iter()
        .filter(|(when, _)| *when == next)
        .map(|(_, event)| event)
        .collect();
    Some((next, events))
}

/// Next events after whichever is later: the clock or the last fired instant
///
/// The wall clock can read slightly behind a sleep deadline, so `now` alone
/// could return the event that just fired.
pub fn next_events_after(
    now: DateTime<Utc>,
    last_fired: Option<DateTime<Utc>>,
    schedule: &ScheduleConfig,
) -> Option<(DateTime<Utc>, Vec<ScheduledEvent>)> {
    let from = last_fired.map_or(now, |fired| now.max(fired));
    next_events(from, schedule)
}

/// The round whose window contains `now`, with its natural end
pub fn active_window(
    now: DateTime<Utc>,
    schedule: &ScheduleConfig,
    duration: Duration,
) -> Option<(RoundKind, DateTime<Utc>)> {
    let today = now.date_naive();
    [today.pred_opt(), Some(today)]
        .into_iter()
        .flatten()
        .flat_map(|date| {
            [RoundKind::Morning, RoundKind::Evening]
                .into_iter()
                .filter_map(move |kind| round_start(date, kind, schedule).map(|start| (kind, start)))
        })
        .find(|(_, start)| *start <= now && now < *start + duration)
        .map(|(kind, start)| (kind, start + duration))
}

/// Wall-clock driven job runner for rounds, rollover and reminders
pub struct Scheduler {
    manager: Arc<PrizeRoundManager>,
    store: Arc<dyn GameStore>,
    broadcaster: Broadcaster,
    config: Arc<GameConfig>,
}

impl Scheduler {
    pub fn new(
        manager: Arc<PrizeRoundManager>,
        store: Arc<dyn GameStore>,
        broadcaster: Broadcaster,
        config: Arc<GameConfig>,
    ) -> Self {
        Self {
            manager,
            store,
            broadcaster,
            config,
        }
    }

    fn round_duration(&self) -> Duration {
        Duration::from_std(self.config.prize_round.duration).unwrap_or_else(|_| Duration::minutes(30))
    }

    /// Resumes a round if the process starts inside its window, then loops forever
    pub async fn run(self) {
        info!("Starting prize round scheduler");
        self.resume_active_window(Utc::now()).await;

        let mut last_fired = None;
        loop {
            let now = Utc::now();
            let Some((when, events)) = next_events_after(now, last_fired, &self.config.schedule)
            else {
                error!("Schedule produced no upcoming events, stopping scheduler");
                return;
            };

            debug!(next = %when, events = ?events, "Sleeping until next scheduled event");
            tokio::time::sleep((when - now).to_std().unwrap_or_default()).await;

            for event in events {
                self.fire(event).await;
            }
            last_fired = Some(when);
        }
    }

    /// Starts the round whose window contains `now`, ending at its natural end
    pub async fn resume_active_window(&self, now: DateTime<Utc>) -> bool {
        let Some((kind, ends_at)) = active_window(now, &self.config.schedule, self.round_duration())
        else {
            return false;
        };

        info!(kind = %kind, ends_at = %ends_at, "Resuming prize round inside its window");
        match self.manager.start_round_until(kind, ends_at).await {
            Ok(_) => {
                spawn_round_end(Arc::clone(&self.manager), ends_at);
                true
            }
            Err(e) => {
                warn!(error = %e, "Could not resume prize round");
                false
            }
        }
    }

    pub async fn fire(&self, event: ScheduledEvent) {
        info!(event = ?event, "Firing scheduled event");
        match event {
            ScheduledEvent::RoundWarning(kind) => {
                self.manager.send_warning(kind).await;
            }
            ScheduledEvent::RoundStart(kind) => {
                // A round whose settlement kept failing is retried before the next opens
                if let Err(e) = self.manager.end_round_if_due(Utc::now()).await {
                    warn!(error = %e, "Overdue round could not be settled");
                }
                let ends_at = Utc::now() + self.round_duration();
                match self.manager.start_round_until(kind, ends_at).await {
                    Ok(_) => spawn_round_end(Arc::clone(&self.manager), ends_at),
                    Err(e) => {
                        error!(kind = %kind, error = %e, "Prize round start failed");
                        self.manager
                            .alert_admins(format!("{} prize round failed to start: {}", kind, e))
                            .await;
                    }
                }
            }
            ScheduledEvent::WeeklyReset => {
                self.manager.weekly_reset().await;
            }
            ScheduledEvent::DailyReminder => {
                send_daily_reminders(
                    self.store.as_ref(),
                    &self.broadcaster,
                    Utc::now().date_naive(),
                )
                .await;
            }
        }
    }
}

const ROUND_END_ATTEMPTS: u32 = 3;
const ROUND_END_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(60);

/// One-shot task settling the round at its scheduled end
pub fn spawn_round_end(manager: Arc<PrizeRoundManager>, ends_at: DateTime<Utc>) {
    tokio::spawn(async move {
        let wait = (ends_at - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        settle_due_round(&manager, ROUND_END_ATTEMPTS, ROUND_END_RETRY_DELAY).await;
    });
}

/// Ends a due round, alerting admins on every failed attempt
///
/// Returns the winners once settled, or `None` when there was nothing to
/// settle or every attempt failed.
pub async fn settle_due_round(
    manager: &PrizeRoundManager,
    attempts: u32,
    retry_delay: std::time::Duration,
) -> Option<Vec<RoundWinner>> {
    for attempt in 1..=attempts {
        match manager.end_round_if_due(Utc::now()).await {
            Ok(Some(winners)) => {
                info!(winners = winners.len(), "Scheduled round end completed");
                return Some(winners);
            }
            Ok(None) => {
                debug!("Round already settled before scheduled end");
                return None;
            }
            Err(PrizeRoundError::NotActive) => {
                debug!("No round to end");
                return None;
            }
            Err(e) => {
                error!(attempt, error = %e, "Scheduled round end failed");
                manager
                    .alert_admins(format!(
                        "Prize round end failed (attempt {}/{}): {}",
                        attempt, attempts, e
                    ))
                    .await;
                if attempt < attempts {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }
    None
}
