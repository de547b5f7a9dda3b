//! Reputation ledger: append-only history and running counters.
//!
//! Every write goes through [`UserRepository::transaction`], so a counter
//! change and the history entry describing it land together or not at
//! all.

use chrono::Utc;
use staffrep_core::error::{StaffError, StaffResult};
use staffrep_core::models::reputation::{NewLogEntry, ReputationAction, ReputationLogEntry};
use staffrep_core::models::user::{CounterDelta, UserMutation, UserRecord, UserUpdate};
use staffrep_core::repository::UserRepository;
use tracing::{debug, info};

use crate::threshold::Standing;

/// Which counter a point award applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    Positive,
    Negative,
}

impl PointKind {
    pub fn log_action(&self) -> ReputationAction {
        match self {
            PointKind::Positive => ReputationAction::AddPos,
            PointKind::Negative => ReputationAction::AddNeg,
        }
    }

    fn delta(&self, amount: i64) -> CounterDelta {
        match self {
            PointKind::Positive => CounterDelta {
                positive: amount,
                negative: 0,
            },
            PointKind::Negative => CounterDelta {
                positive: 0,
                negative: amount,
            },
        }
    }
}

#[derive(Clone)]
pub struct ReputationLedger<R> {
    repo: R,
}

impl<R: UserRepository> ReputationLedger<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Append one entry to the user's history, creating the user on
    /// first sight. A missing timestamp becomes "now".
    pub async fn add_entry(&self, user_id: &str, entry: NewLogEntry) -> StaffResult<UserRecord> {
        let entry = entry.into_entry(now_millis());
        debug!(user_id, action = %entry.action, "appending history entry");
        self.repo
            .transaction(user_id, vec![UserMutation::AppendLog(entry)])
            .await
    }

    /// Apply signed deltas to both counters (saturating at zero) and
    /// return the committed snapshot.
    pub async fn adjust_counters(&self, user_id: &str, delta: CounterDelta) -> StaffResult<Standing> {
        let record = self
            .repo
            .transaction(user_id, vec![UserMutation::AdjustCounters(delta)])
            .await?;
        Ok(Standing::from(&record))
    }

    /// Adjust one counter and record an `ADD_POS`/`ADD_NEG` entry in the
    /// same transaction.
    pub async fn award(
        &self,
        user_id: &str,
        kind: PointKind,
        amount: i64,
        moderator_id: &str,
        reason: &str,
    ) -> StaffResult<UserRecord> {
        if amount == 0 {
            return Err(StaffError::validation("award amount must not be zero"));
        }
        let entry = ReputationLogEntry {
            timestamp: now_millis(),
            moderator_id: moderator_id.to_string(),
            action: kind.log_action(),
            amount,
            reason: reason.to_string(),
        };
        let record = self
            .repo
            .transaction(
                user_id,
                vec![
                    UserMutation::AdjustCounters(kind.delta(amount)),
                    UserMutation::AppendLog(entry),
                ],
            )
            .await?;
        info!(
            user_id,
            moderator_id,
            amount,
            positive_rep = record.positive_rep,
            negative_rep = record.negative_rep,
            "reputation awarded"
        );
        Ok(record)
    }

    /// Zero both counters and record a `RESET` entry.
    pub async fn reset(
        &self,
        user_id: &str,
        moderator_id: &str,
        reason: &str,
    ) -> StaffResult<UserRecord> {
        let entry = ReputationLogEntry {
            timestamp: now_millis(),
            moderator_id: moderator_id.to_string(),
            action: ReputationAction::Reset,
            amount: 0,
            reason: reason.to_string(),
        };
        let record = self
            .repo
            .transaction(
                user_id,
                vec![
                    UserMutation::Update(UserUpdate::reset_counters()),
                    UserMutation::AppendLog(entry),
                ],
            )
            .await?;
        info!(user_id, moderator_id, "reputation reset");
        Ok(record)
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_kinds_touch_one_counter() {
        assert_eq!(
            PointKind::Positive.delta(3),
            CounterDelta {
                positive: 3,
                negative: 0
            }
        );
        assert_eq!(PointKind::Negative.delta(-2).negative, -2);
        assert_eq!(PointKind::Negative.log_action(), ReputationAction::AddNeg);
    }
}
