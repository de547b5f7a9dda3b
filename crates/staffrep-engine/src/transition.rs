//! Rank transition engine.
//!
//! Moves a staff member one step up or down the configured hierarchy:
//! swaps the hierarchy role on the chat platform, then resets both
//! counters and records the change in a single store transaction. If
//! that transaction cannot be committed the role swap is undone.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use staffrep_core::error::StaffError;
use staffrep_core::models::hierarchy::RankDefinition;
use staffrep_core::models::member::Member;
use staffrep_core::models::reputation::ReputationLogEntry;
use staffrep_core::models::request::RankDirection;
use staffrep_core::models::user::{UserMutation, UserRecord, UserUpdate};
use staffrep_core::ports::{ErrorTracker, EventSource, MemberDirectory, Notifier, TrackedEvent};
use staffrep_core::repository::UserRepository;
use tracing::{info, warn};

use crate::config::StaffConfig;
use crate::error::RankError;
use crate::ledger::now_millis;

/// A committed rank change.
#[derive(Debug, Clone)]
pub struct RankChange {
    pub user_id: String,
    pub display_name: String,
    pub direction: RankDirection,
    pub from: RankDefinition,
    pub to: RankDefinition,
    /// Record after the counter reset.
    pub record: UserRecord,
}

impl RankChange {
    pub fn summary(&self) -> String {
        format!(
            "Successfully {} **{}** to **{}**.",
            self.direction.past_tense(),
            self.display_name,
            self.to.name
        )
    }
}

/// Users with a transition currently running.
type InFlight = Arc<Mutex<HashSet<String>>>;

/// Releases a user's in-flight slot when dropped.
struct InFlightGuard {
    in_flight: InFlight,
    user_id: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &InFlight, user_id: &str) -> Option<Self> {
        let inserted = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string());
        inserted.then(|| Self {
            in_flight: Arc::clone(in_flight),
            user_id: user_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}

pub struct RankTransitionEngine<R, D, N> {
    repo: R,
    directory: Arc<D>,
    notifier: Arc<N>,
    config: Arc<StaffConfig>,
    tracker: Arc<dyn ErrorTracker>,
    in_flight: InFlight,
}

impl<R, D, N> RankTransitionEngine<R, D, N>
where
    R: UserRepository,
    D: MemberDirectory,
    N: Notifier,
{
    pub fn new(
        repo: R,
        directory: Arc<D>,
        notifier: Arc<N>,
        config: Arc<StaffConfig>,
        tracker: Arc<dyn ErrorTracker>,
    ) -> Self {
        Self {
            repo,
            directory,
            notifier,
            config,
            tracker,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Move `user_id` one rank in `direction` on behalf of `actor`.
    ///
    /// Counters are only reset after the role swap is confirmed; a
    /// rejected transition (ceiling, floor, unranked) leaves the user
    /// untouched.
    pub async fn process_rank_change(
        &self,
        user_id: &str,
        direction: RankDirection,
        actor: &Member,
    ) -> Result<RankChange, RankError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, user_id).ok_or_else(|| {
            RankError::TransitionInProgress {
                user_id: user_id.to_string(),
            }
        })?;

        // 1. Resolve the member and their current rank.
        let member = self
            .directory
            .fetch_member(user_id)
            .await
            .map_err(|e| self.infrastructure(user_id, "failed to fetch member", &e))?
            .ok_or_else(|| RankError::MemberNotFound {
                user_id: user_id.to_string(),
            })?;

        let hierarchy = self.config.hierarchy();
        let index = hierarchy
            .current_index(member.role_ids.as_slice())
            .ok_or_else(|| RankError::NotRecognizedStaff {
                user_id: user_id.to_string(),
            })?;
        let from = hierarchy
            .get(index)
            .cloned()
            .ok_or_else(|| RankError::NotRecognizedStaff {
                user_id: user_id.to_string(),
            })?;

        // 2. Compute the target rank.
        let to = match hierarchy.step(index, direction).and_then(|i| hierarchy.get(i)) {
            Some(def) => def.clone(),
            None => {
                info!(user_id, rank = %from.name, ?direction, "rank change rejected at hierarchy edge");
                return Err(match direction {
                    RankDirection::Promote => RankError::AlreadyAtCeiling { rank: from.name },
                    RankDirection::Demote => RankError::AlreadyAtFloor { rank: from.name },
                });
            }
        };

        // 3. Swap roles.
        self.swap_roles(user_id, &from, &to).await?;

        // 4. Reset counters and record the change atomically.
        let entry = ReputationLogEntry {
            timestamp: now_millis(),
            moderator_id: actor.id.clone(),
            action: direction.log_action(),
            amount: 0,
            reason: format!("Authorized by {}", actor.display_name),
        };
        let record = match self.commit_reset(user_id, entry).await {
            Ok(record) => record,
            Err(e) => {
                // The role moved but the counters did not. Put the old
                // role back so a retry starts from the original rank.
                let restored = self.roll_back_roles(user_id, &from, &to).await;
                let correlation_id = self.tracker.track(
                    TrackedEvent::fatal(
                        EventSource::RankChange,
                        format!("role changed but counter reset failed: {e}"),
                    )
                    .for_user(user_id)
                    .with("from_role", from.id.clone())
                    .with("to_role", to.id.clone())
                    .with("commit_failed", true)
                    .with("restored", restored),
                );
                return Err(RankError::RoleChangePartialFailure {
                    user_id: user_id.to_string(),
                    correlation_id,
                    restored,
                });
            }
        };

        let change = RankChange {
            user_id: user_id.to_string(),
            display_name: member.display_name,
            direction,
            from,
            to,
            record,
        };
        info!(
            user_id,
            actor_id = %actor.id,
            from = %change.from.name,
            to = %change.to.name,
            "rank change committed"
        );

        // 5. Notify, best-effort.
        self.notify(&change).await;
        Ok(change)
    }

    /// Revoke the old role, then grant the new one with bounded retries.
    /// If every grant attempt fails the old role is granted back.
    async fn swap_roles(
        &self,
        user_id: &str,
        from: &RankDefinition,
        to: &RankDefinition,
    ) -> Result<(), RankError> {
        self.directory
            .revoke_role(user_id, &from.id)
            .await
            .map_err(|e| self.infrastructure(user_id, "failed to revoke role", &e))?;

        let policy = self.config.role_change;
        let attempts = policy.grant_retries.saturating_add(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.directory.grant_role(user_id, &to.id).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(user_id, role_id = %to.id, attempt, error = %e, "role grant failed");
                    last_error = Some(e);
                }
            }
            if attempt < attempts && policy.retry_backoff_ms > 0 {
                let delay = policy.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        let restored = match self.directory.grant_role(user_id, &from.id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id, role_id = %from.id, error = %e, "failed to restore previous role");
                false
            }
        };
        let correlation_id = self.tracker.track(
            TrackedEvent::fatal(
                EventSource::RankChange,
                format!(
                    "role grant failed after {attempts} attempts: {}",
                    last_error.map(|e| e.to_string()).unwrap_or_default()
                ),
            )
            .for_user(user_id)
            .with("from_role", from.id.clone())
            .with("to_role", to.id.clone())
            .with("restored", restored),
        );
        Err(RankError::RoleChangePartialFailure {
            user_id: user_id.to_string(),
            correlation_id,
            restored,
        })
    }

    /// Reset counters and append the history entry, retrying with the
    /// same policy as role grants.
    async fn commit_reset(
        &self,
        user_id: &str,
        entry: ReputationLogEntry,
    ) -> Result<UserRecord, StaffError> {
        let policy = self.config.role_change;
        let attempts = policy.grant_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            let mutations = vec![
                UserMutation::Update(UserUpdate::reset_counters()),
                UserMutation::AppendLog(entry.clone()),
            ];
            match self.repo.transaction(user_id, mutations).await {
                Ok(record) => return Ok(record),
                Err(e) if attempt < attempts => {
                    warn!(user_id, attempt, error = %e, "counter reset failed, retrying");
                    if policy.retry_backoff_ms > 0 {
                        let delay = policy.retry_backoff_ms.saturating_mul(u64::from(attempt));
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Undo a completed swap. Returns whether the member ended up with
    /// only their original hierarchy role.
    async fn roll_back_roles(&self, user_id: &str, from: &RankDefinition, to: &RankDefinition) -> bool {
        if let Err(e) = self.directory.revoke_role(user_id, &to.id).await {
            warn!(user_id, role_id = %to.id, error = %e, "failed to revoke new role during rollback");
            return false;
        }
        match self.directory.grant_role(user_id, &from.id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id, role_id = %from.id, error = %e, "failed to restore previous role");
                false
            }
        }
    }

    async fn notify(&self, change: &RankChange) {
        let dm = format!(
            "You have been **{}** to **{}**.",
            change.direction.past_tense(),
            change.to.name
        );
        if let Err(e) = self.notifier.send_direct(&change.user_id, &dm).await {
            warn!(user_id = %change.user_id, error = %e, "rank change DM not delivered");
        }
        let log_channel = &self.config.channels.log;
        if let Err(e) = self
            .notifier
            .send_channel(log_channel, &change.summary())
            .await
        {
            warn!(channel_id = %log_channel, error = %e, "rank change log message not delivered");
        }
    }

    fn infrastructure(&self, user_id: &str, message: &str, err: &StaffError) -> RankError {
        let correlation_id = self.tracker.track(
            TrackedEvent::error(EventSource::RankChange, format!("{message}: {err}"))
                .for_user(user_id),
        );
        RankError::Infrastructure { correlation_id }
    }
}
