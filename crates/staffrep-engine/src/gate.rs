//! Approval gate for pending rank requests.
//!
//! Each request moves `Pending -> Resolving -> Resolved` exactly once.
//! The claim to `Resolving` is taken under the lock before any await, so
//! a second click on the same prompt sees `AlreadyResolved` and can
//! never trigger a second role change.
//!
//! Only the most recently resolved requests are remembered; older ones
//! are evicted and then report `UnknownRequest`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use staffrep_core::models::member::Member;
use staffrep_core::models::request::{PendingRankRequest, RankDirection, RequestId};
use staffrep_core::ports::{MemberDirectory, Notifier};
use staffrep_core::repository::UserRepository;
use tracing::{info, warn};

use crate::error::RankError;
use crate::transition::{RankChange, RankTransitionEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Approve,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Pending,
    Resolving,
    Resolved(Resolution),
}

#[derive(Debug)]
struct GateEntry {
    request: PendingRankRequest,
    status: GateStatus,
}

/// What a successful resolve did.
#[derive(Debug)]
pub enum GateResolution {
    Approved(RankChange),
    Denied { target_user_id: String },
}

/// One line of a bulk resolve report.
#[derive(Debug)]
pub struct BulkItem {
    pub request_id: RequestId,
    pub target_user_id: Option<String>,
    pub outcome: Result<GateResolution, RankError>,
}

#[derive(Debug, Default)]
pub struct BulkReport {
    pub items: Vec<BulkItem>,
}

impl BulkReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    /// Plain-text report, one line per request.
    pub fn render(&self) -> String {
        let mut out = String::from("Processing Report:\n");
        for item in &self.items {
            let target = item.target_user_id.as_deref().unwrap_or("unknown");
            let line = match &item.outcome {
                Ok(GateResolution::Approved(change)) => change.summary(),
                Ok(GateResolution::Denied { .. }) => "Request denied.".to_string(),
                Err(e) => e.user_message(),
            };
            out.push_str(&format!("<@{target}>: {line}\n"));
        }
        out
    }
}

/// Resolved requests kept for duplicate-click detection.
pub const DEFAULT_RESOLVED_CAPACITY: usize = 512;

#[derive(Debug, Default)]
struct GateState {
    entries: HashMap<RequestId, GateEntry>,
    /// Oldest first.
    resolved: VecDeque<RequestId>,
}

#[derive(Debug)]
pub struct ApprovalGate {
    state: Mutex<GateState>,
    resolved_capacity: usize,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RESOLVED_CAPACITY)
    }
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(resolved_capacity: usize) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            resolved_capacity: resolved_capacity.max(1),
        }
    }

    /// Register a request. If an unresolved request for the same target
    /// and direction exists, its id is returned instead and the flag is
    /// `false`.
    pub fn open(&self, request: PendingRankRequest) -> (RequestId, bool) {
        let mut state = self.lock();
        let existing = state.entries.values().find(|e| {
            e.status == GateStatus::Pending
                && e.request.target_user_id == request.target_user_id
                && e.request.direction == request.direction
        });
        if let Some(entry) = existing {
            return (entry.request.id, false);
        }
        let id = request.id;
        info!(request_id = %id, user_id = %request.target_user_id, direction = ?request.direction, "rank request opened");
        state.entries.insert(
            id,
            GateEntry {
                request,
                status: GateStatus::Pending,
            },
        );
        (id, true)
    }

    pub fn status(&self, id: RequestId) -> Option<GateStatus> {
        self.lock().entries.get(&id).map(|e| e.status)
    }

    pub fn pending(&self) -> Vec<PendingRankRequest> {
        let mut pending: Vec<_> = self
            .lock()
            .entries
            .values()
            .filter(|e| e.status == GateStatus::Pending)
            .map(|e| e.request.clone())
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending
    }

    /// Pending request for a target and direction, if any.
    pub fn find_pending(&self, target_user_id: &str, direction: RankDirection) -> Option<RequestId> {
        self.lock()
            .entries
            .values()
            .find(|e| {
                e.status == GateStatus::Pending
                    && e.request.target_user_id == target_user_id
                    && e.request.direction == direction
            })
            .map(|e| e.request.id)
    }

    /// Resolve one request. Approve runs the transition engine; Deny only
    /// closes the gate. The request ends up `Resolved` whatever the engine
    /// returns, so a failed approval is not retried by clicking again.
    pub async fn resolve<R, D, N>(
        &self,
        id: RequestId,
        resolution: Resolution,
        engine: &RankTransitionEngine<R, D, N>,
        actor: &Member,
    ) -> Result<GateResolution, RankError>
    where
        R: UserRepository,
        D: MemberDirectory,
        N: Notifier,
    {
        let request = self.claim(id)?;
        let outcome = match resolution {
            Resolution::Approve => engine
                .process_rank_change(&request.target_user_id, request.direction, actor)
                .await
                .map(GateResolution::Approved),
            Resolution::Deny => Ok(GateResolution::Denied {
                target_user_id: request.target_user_id.clone(),
            }),
        };
        self.finish(id, resolution);
        match &outcome {
            Ok(_) => info!(request_id = %id, actor_id = %actor.id, ?resolution, "rank request resolved"),
            Err(e) => warn!(request_id = %id, actor_id = %actor.id, error = %e, "rank request resolved with failure"),
        }
        outcome
    }

    /// Resolve a batch one request at a time. A failure for one request
    /// is recorded and the batch carries on.
    pub async fn bulk_resolve<R, D, N>(
        &self,
        ids: &[RequestId],
        resolution: Resolution,
        engine: &RankTransitionEngine<R, D, N>,
        actor: &Member,
    ) -> BulkReport
    where
        R: UserRepository,
        D: MemberDirectory,
        N: Notifier,
    {
        let mut report = BulkReport::default();
        for &id in ids {
            let target_user_id = self
                .lock()
                .entries
                .get(&id)
                .map(|e| e.request.target_user_id.clone());
            let outcome = self.resolve(id, resolution, engine, actor).await;
            report.items.push(BulkItem {
                request_id: id,
                target_user_id,
                outcome,
            });
        }
        info!(
            total = report.items.len(),
            succeeded = report.succeeded(),
            "bulk resolve finished"
        );
        report
    }

    fn claim(&self, id: RequestId) -> Result<PendingRankRequest, RankError> {
        let mut state = self.lock();
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or(RankError::UnknownRequest { request_id: id })?;
        match entry.status {
            GateStatus::Pending => {
                entry.status = GateStatus::Resolving;
                Ok(entry.request.clone())
            }
            GateStatus::Resolving | GateStatus::Resolved(_) => {
                Err(RankError::AlreadyResolved { request_id: id })
            }
        }
    }

    fn finish(&self, id: RequestId, resolution: Resolution) {
        let mut state = self.lock();
        let Some(entry) = state.entries.get_mut(&id) else {
            return;
        };
        entry.status = GateStatus::Resolved(resolution);
        state.resolved.push_back(id);
        while state.resolved.len() > self.resolved_capacity {
            if let Some(evicted) = state.resolved.pop_front() {
                state.entries.remove(&evicted);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_dedupes_pending_requests_per_target_and_direction() {
        let gate = ApprovalGate::new();
        let (first, created) = gate.open(PendingRankRequest::new("1", RankDirection::Promote, "a"));
        assert!(created);
        let (again, created) = gate.open(PendingRankRequest::new("1", RankDirection::Promote, "b"));
        assert!(!created);
        assert_eq!(first, again);

        let (demo, created) = gate.open(PendingRankRequest::new("1", RankDirection::Demote, "c"));
        assert!(created);
        assert_ne!(first, demo);
        assert_eq!(gate.pending().len(), 2);
        assert_eq!(gate.find_pending("1", RankDirection::Demote), Some(demo));
    }

    #[test]
    fn claim_is_one_shot() {
        let gate = ApprovalGate::new();
        let (id, _) = gate.open(PendingRankRequest::new("1", RankDirection::Promote, "a"));
        assert!(gate.claim(id).is_ok());
        assert_eq!(gate.status(id), Some(GateStatus::Resolving));
        assert!(matches!(
            gate.claim(id),
            Err(RankError::AlreadyResolved { .. })
        ));
        gate.finish(id, Resolution::Deny);
        assert_eq!(gate.status(id), Some(GateStatus::Resolved(Resolution::Deny)));
        assert!(gate.pending().is_empty());
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let gate = ApprovalGate::new();
        assert!(matches!(
            gate.claim(RequestId::new()),
            Err(RankError::UnknownRequest { .. })
        ));
    }

    #[test]
    fn resolved_requests_are_evicted_past_capacity() {
        let gate = ApprovalGate::with_capacity(2);
        let ids: Vec<_> = ["1", "2", "3"]
            .into_iter()
            .map(|user| gate.open(PendingRankRequest::new(user, RankDirection::Promote, "a")).0)
            .collect();
        for &id in &ids {
            gate.claim(id).unwrap();
            gate.finish(id, Resolution::Approve);
        }

        assert_eq!(gate.status(ids[0]), None);
        assert!(matches!(
            gate.claim(ids[0]),
            Err(RankError::UnknownRequest { .. })
        ));
        assert!(matches!(
            gate.claim(ids[2]),
            Err(RankError::AlreadyResolved { .. })
        ));
        assert_eq!(
            gate.status(ids[1]),
            Some(GateStatus::Resolved(Resolution::Approve))
        );
    }

    #[test]
    fn pending_requests_are_never_evicted() {
        let gate = ApprovalGate::with_capacity(1);
        let (waiting, _) = gate.open(PendingRankRequest::new("9", RankDirection::Demote, "a"));
        for user in ["1", "2", "3"] {
            let (id, _) = gate.open(PendingRankRequest::new(user, RankDirection::Promote, "a"));
            gate.claim(id).unwrap();
            gate.finish(id, Resolution::Deny);
        }
        assert_eq!(gate.status(waiting), Some(GateStatus::Pending));
        assert_eq!(gate.pending().len(), 1);
    }
}
