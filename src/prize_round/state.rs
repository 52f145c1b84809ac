use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use super::models::{reward_label, PrizeRoundError, RoundKind, RoundStatus, RoundWinner};
use crate::config::GameConfig;
use crate::eligibility::EligibilityChecker;
use crate::leaderboard::{IsoWeek, LeaderboardAggregator, WeeklyRewardsOutcome};
use crate::notifications::{
    Announcement, BroadcastReport, Broadcaster, RoundEndPayload, RoundStartPayload,
    RoundWarningPayload, WeeklyResetPayload,
};
use crate::scoring::RoundMode;
use crate::storage::GameStore;
use crate::user::User;

struct ActiveRound {
    kind: RoundKind,
    started_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    /// PP per user at round start
    snapshot: HashMap<i64, i64>,
}

/// IDLE -> ACTIVE -> IDLE lifecycle of the twice-daily prize rounds.
///
/// Winners are ranked by PP gained since the start snapshot, never by
/// cumulative PP.
pub struct PrizeRoundManager {
    store: Arc<dyn GameStore>,
    leaderboard: Arc<LeaderboardAggregator>,
    eligibility: Arc<EligibilityChecker>,
    broadcaster: Broadcaster,
    config: Arc<GameConfig>,
    active: RwLock<Option<ActiveRound>>,
}

impl PrizeRoundManager {
    pub fn new(
        store: Arc<dyn GameStore>,
        leaderboard: Arc<LeaderboardAggregator>,
        eligibility: Arc<EligibilityChecker>,
        broadcaster: Broadcaster,
        config: Arc<GameConfig>,
    ) -> Self {
        Self {
            store,
            leaderboard,
            eligibility,
            broadcaster,
            config,
            active: RwLock::new(None),
        }
    }

    pub async fn is_active(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Mode that question flows should run in right now
    pub async fn current_mode(&self) -> RoundMode {
        RoundMode::from_prize_flag(self.is_active().await)
    }

    pub async fn status(&self) -> RoundStatus {
        match self.active.read().await.as_ref() {
            Some(round) => RoundStatus {
                active: true,
                kind: Some(round.kind),
                started_at: Some(round.started_at),
                ends_at: Some(round.ends_at),
                snapshot_size: round.snapshot.len(),
            },
            None => RoundStatus {
                active: false,
                kind: None,
                started_at: None,
                ends_at: None,
                snapshot_size: 0,
            },
        }
    }

    /// Starts a round lasting the configured duration
    pub async fn start_round(&self, kind: RoundKind) -> Result<RoundStartPayload, PrizeRoundError> {
        let duration = Duration::from_std(self.config.prize_round.duration)
            .unwrap_or_else(|_| Duration::minutes(30));
        self.start_round_until(kind, Utc::now() + duration).await
    }

    /// Snapshots every user's PP, marks the round active and announces it
    #[instrument(skip(self))]
    pub async fn start_round_until(
        &self,
        kind: RoundKind,
        ends_at: DateTime<Utc>,
    ) -> Result<RoundStartPayload, PrizeRoundError> {
        if let Some(round) = self.active.read().await.as_ref() {
            return Err(PrizeRoundError::AlreadyActive(round.kind));
        }

        let users = self.store.get_all_users().await?;
        let snapshot: HashMap<i64, i64> = users.iter().map(|u| (u.id, u.pp)).collect();
        let now = Utc::now();

        {
            let mut active = self.active.write().await;
            if let Some(round) = active.as_ref() {
                return Err(PrizeRoundError::AlreadyActive(round.kind));
            }
            *active = Some(ActiveRound {
                kind,
                started_at: now,
                ends_at,
                snapshot,
            });
        }
        info!(kind = %kind, ends_at = %ends_at, participants = users.len(), "Prize round started");

        let payload = RoundStartPayload {
            kind,
            duration_minutes: (ends_at - now).num_minutes().max(0),
            question_count: self.config.prize_round.question_count,
            ends_at,
            preview: self.leaderboard.preview().await,
        };
        self.broadcast_to_all(&Announcement::RoundStarted(payload.clone()))
            .await;
        Ok(payload)
    }

    /// Settles the active round: ranks PP gained since the snapshot
    ///
    /// If the users cannot be loaded the round stays active with its
    /// snapshot, so a later call can settle it.
    #[instrument(skip(self))]
    pub async fn end_round(&self) -> Result<Vec<RoundWinner>, PrizeRoundError> {
        if !self.is_active().await {
            return Err(PrizeRoundError::NotActive);
        }

        let users = self.store.get_all_users().await.map_err(|e| {
            error!(error = %e, "Failed to load users for round settlement");
            e
        })?;

        let round = self
            .active
            .write()
            .await
            .take()
            .ok_or(PrizeRoundError::NotActive)?;

        let eligible: Vec<User> = users
            .into_iter()
            .filter(|user| {
                self.eligibility
                    .check_prize_round_eligibility(user)
                    .is_allowed()
            })
            .collect();

        let winners = rank_round_winners(
            &round.snapshot,
            &eligible,
            self.config.prize_round.winner_count,
        );
        info!(kind = %round.kind, winners = winners.len(), "Prize round ended");

        self.broadcast_to_all(&Announcement::RoundEnded(RoundEndPayload {
            kind: round.kind,
            winners: winners.clone(),
            next_round: round.kind.next(),
        }))
        .await;

        Ok(winners)
    }

    /// Ends the active round only once its scheduled end has passed
    pub async fn end_round_if_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<RoundWinner>>, PrizeRoundError> {
        let due = matches!(self.active.read().await.as_ref(), Some(round) if round.ends_at <= now);
        if !due {
            debug!("No round due to end");
            return Ok(None);
        }
        self.end_round().await.map(Some)
    }

    /// Broadcast-only heads-up before a scheduled start
    pub async fn send_warning(&self, kind: RoundKind) -> BroadcastReport {
        let lead = self.config.schedule.warning_lead.as_secs() as i64 / 60;
        self.broadcast_to_all(&Announcement::RoundWarning(RoundWarningPayload {
            kind,
            starts_in_minutes: lead,
        }))
        .await
    }

    /// Weekly rollover; failures go to the admins and wait for next week's trigger
    #[instrument(skip(self))]
    pub async fn weekly_reset(&self) -> WeeklyRewardsOutcome {
        let week = IsoWeek::current();
        let outcome = self.leaderboard.process_weekly_rewards().await;

        if outcome.success {
            self.broadcast_to_all(&Announcement::WeeklyReset(WeeklyResetPayload {
                week,
                standings: outcome.entries.clone(),
            }))
            .await;
            self.broadcaster
                .notify_admins(
                    &self.config.admin_user_ids,
                    &Announcement::AdminSummary {
                        message: outcome.summary.clone(),
                    },
                )
                .await;
        } else {
            error!(summary = %outcome.summary, "Weekly reset failed");
            self.broadcaster
                .notify_admins(
                    &self.config.admin_user_ids,
                    &Announcement::AdminAlert {
                        message: format!("Weekly reset failed: {}", outcome.summary),
                    },
                )
                .await;
        }

        outcome
    }

    pub(crate) async fn alert_admins(&self, message: String) {
        self.broadcaster
            .notify_admins(
                &self.config.admin_user_ids,
                &Announcement::AdminAlert { message },
            )
            .await;
    }

    async fn broadcast_to_all(&self, announcement: &Announcement) -> BroadcastReport {
        let recipients: Vec<i64> = match self.store.get_users_for_notifications().await {
            Ok(recipients) => recipients.iter().map(|r| r.user_id).collect(),
            Err(e) => {
                warn!(error = %e, kind = announcement.kind(), "Failed to load broadcast recipients");
                return BroadcastReport::default();
            }
        };
        self.broadcaster.broadcast(&recipients, announcement).await
    }
}

/// Ranks users by PP gained against the snapshot, lifetime AP breaking ties
///
/// Users missing from the snapshot joined mid-round and count from zero.
pub fn rank_round_winners(
    snapshot: &HashMap<i64, i64>,
    users: &[User],
    top_n: usize,
) -> Vec<RoundWinner> {
    let mut gains: Vec<(&User, i64)> = users
        .iter()
        .map(|user| (user, user.pp - snapshot.get(&user.id).copied().unwrap_or(0)))
        .filter(|(_, gained)| *gained > 0)
        .collect();

    gains.sort_by(|(a, gained_a), (b, gained_b)| {
        gained_b
            .cmp(gained_a)
            .then(b.lifetime_ap().cmp(&a.lifetime_ap()))
            .then(a.id.cmp(&b.id))
    });

    gains
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(position, (user, gained_pp))| {
            let rank = position as u32 + 1;
            RoundWinner {
                rank,
                user_id: user.id,
                display_name: user.display_name_or_anonymous().to_string(),
                gained_pp,
                lifetime_ap: user.lifetime_ap(),
                reward_label: reward_label(rank).to_string(),
            }
        })
        .collect()
}
