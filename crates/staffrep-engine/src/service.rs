//! Staff service facade.
//!
//! The single entry point for the command and interaction layer. Store
//! operations return [`StaffResult`] unchanged; operations performed on
//! behalf of an actor return [`RankError`]/[`LoaError`], with store and
//! platform failures tracked and reduced to a correlation id.

use std::sync::Arc;

use chrono::Utc;
use staffrep_core::error::{StaffError, StaffResult};
use staffrep_core::models::action::ActionDescriptor;
use staffrep_core::models::member::Member;
use staffrep_core::models::reputation::{NewLogEntry, ReputationLogEntry};
use staffrep_core::models::request::{
    ApprovalPrompt, Decision, PendingRankRequest, RankDirection, RequestId,
};
use staffrep_core::models::user::{LeaderboardField, LoaStatus, UserRecord, UserUpdate};
use staffrep_core::ports::{ErrorTracker, EventSource, MemberDirectory, Notifier, TrackedEvent};
use staffrep_core::repository::UserRepository;
use tracing::{info, warn};

use crate::config::StaffConfig;
use crate::error::{LoaError, RankError};
use crate::export::{ExportArtifact, generate_export};
use crate::gate::{ApprovalGate, BulkReport, GateResolution, Resolution};
use crate::ledger::{PointKind, ReputationLedger};
use crate::loa::LoaWorkflow;
use crate::threshold::{EligibleListing, EligibleStaff, Standing, ThresholdEvaluator, render_eligible};
use crate::transition::{RankChange, RankTransitionEngine};

/// How many users of each leaderboard an eligibility scan looks at.
pub const ELIGIBILITY_SCAN_LIMIT: usize = 200;
/// Longest reply the chat platform accepts.
pub const MAX_REPLY_CHARS: usize = 2000;
/// Entries shown in a staff report.
const REPORT_HISTORY_LEN: usize = 3;
/// Users a bulk export looks at, by positive points.
pub const BULK_EXPORT_SCAN: usize = 100;
/// Largest bulk export produced in one go.
pub const BULK_EXPORT_MAX: usize = 20;

/// Result of awarding points.
#[derive(Debug)]
pub struct AwardOutcome {
    pub record: UserRecord,
    pub decision: Decision,
    /// Set when the award opened a new approval request.
    pub request: Option<(RequestId, ApprovalPrompt)>,
}

/// Current position and standing of a staff member.
#[derive(Debug, Clone)]
pub struct StaffReport {
    pub user_id: String,
    pub display_name: String,
    pub rank: String,
    pub standing: Standing,
    pub loa: LoaStatus,
    /// Newest first.
    pub recent_history: Vec<ReputationLogEntry>,
}

/// Text reply for a handled interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReply {
    pub success: bool,
    pub content: String,
}

impl ActionReply {
    fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: truncate(content.into()),
        }
    }

    fn failed(content: impl Into<String>) -> Self {
        Self {
            success: false,
            content: truncate(content.into()),
        }
    }
}

fn truncate(mut content: String) -> String {
    if let Some((idx, _)) = content.char_indices().nth(MAX_REPLY_CHARS) {
        content.truncate(idx);
    }
    content
}

pub struct StaffService<R, D, N> {
    repo: R,
    directory: Arc<D>,
    notifier: Arc<N>,
    config: Arc<StaffConfig>,
    tracker: Arc<dyn ErrorTracker>,
    ledger: ReputationLedger<R>,
    evaluator: ThresholdEvaluator,
    engine: RankTransitionEngine<R, D, N>,
    gate: ApprovalGate,
    loa: LoaWorkflow<R, N>,
}

impl<R, D, N> StaffService<R, D, N>
where
    R: UserRepository + Clone,
    D: MemberDirectory,
    N: Notifier,
{
    pub fn new(
        repo: R,
        directory: Arc<D>,
        notifier: Arc<N>,
        config: StaffConfig,
        tracker: Arc<dyn ErrorTracker>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            ledger: ReputationLedger::new(repo.clone()),
            evaluator: ThresholdEvaluator::new(config.thresholds),
            engine: RankTransitionEngine::new(
                repo.clone(),
                Arc::clone(&directory),
                Arc::clone(&notifier),
                Arc::clone(&config),
                Arc::clone(&tracker),
            ),
            gate: ApprovalGate::new(),
            loa: LoaWorkflow::new(repo.clone(), Arc::clone(&notifier), Arc::clone(&config)),
            repo,
            directory,
            notifier,
            config,
            tracker,
        }
    }

    pub fn config(&self) -> &StaffConfig {
        &self.config
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    pub fn is_authorized(&self, member: &Member) -> bool {
        self.config.is_authorized(member)
    }

    // -------------------------------------------------------------------
    // Store operations
    // -------------------------------------------------------------------

    pub async fn get_or_create_user(&self, user_id: &str) -> StaffResult<UserRecord> {
        self.repo.get_or_create_user(user_id).await
    }

    pub async fn get_user(&self, user_id: &str) -> StaffResult<UserRecord> {
        self.repo.get_user(user_id).await
    }

    pub async fn update_user(&self, user_id: &str, update: UserUpdate) -> StaffResult<UserRecord> {
        self.repo.update_user(user_id, update).await
    }

    /// Descending by `field`. Names other than the numeric counters give
    /// an empty list.
    pub async fn get_leaderboard(&self, field: &str, limit: usize) -> StaffResult<Vec<UserRecord>> {
        match LeaderboardField::parse(field) {
            Some(field) => self.repo.leaderboard(field, limit).await,
            None => {
                warn!(field, "leaderboard requested for non-numeric field");
                Ok(Vec::new())
            }
        }
    }

    pub async fn add_log(&self, user_id: &str, entry: NewLogEntry) -> StaffResult<UserRecord> {
        self.ledger.add_entry(user_id, entry).await
    }

    pub async fn check_threshold(&self, user_id: &str) -> StaffResult<Decision> {
        let record = self.repo.get_or_create_user(user_id).await?;
        Ok(self.evaluator.evaluate(Standing::from(&record)))
    }

    // -------------------------------------------------------------------
    // Reputation
    // -------------------------------------------------------------------

    /// Award points and, when a threshold is crossed by a ranked staff
    /// member, open an approval request in the management channel.
    pub async fn award(
        &self,
        user_id: &str,
        kind: PointKind,
        amount: i64,
        moderator: &Member,
        reason: &str,
    ) -> Result<AwardOutcome, RankError> {
        let record = self
            .ledger
            .award(user_id, kind, amount, &moderator.id, reason)
            .await
            .map_err(|e| self.track(EventSource::Command, user_id, "award failed", e))?;
        let decision = self.evaluator.evaluate(Standing::from(&record));
        let Some(direction) = decision.direction() else {
            return Ok(AwardOutcome {
                record,
                decision,
                request: None,
            });
        };

        let request = self.raise_request(&record, direction, reason).await?;
        Ok(AwardOutcome {
            record,
            decision,
            request,
        })
    }

    async fn raise_request(
        &self,
        record: &UserRecord,
        direction: RankDirection,
        reason: &str,
    ) -> Result<Option<(RequestId, ApprovalPrompt)>, RankError> {
        let user_id = record.user_id.as_str();
        let member = self
            .directory
            .fetch_member(user_id)
            .await
            .map_err(|e| self.track(EventSource::Command, user_id, "failed to fetch member", e))?;
        let is_staff = member
            .as_ref()
            .is_some_and(|m| self.config.hierarchy().holds_any(m.role_ids.as_slice()));
        if !is_staff {
            return Ok(None);
        }

        let request = PendingRankRequest::new(user_id, direction, reason);
        let prompt = self.evaluator.render_request(&request, Standing::from(record));
        let (id, created) = self.gate.open(request);
        if !created {
            return Ok(None);
        }
        let channel = &self.config.channels.management;
        if let Err(e) = self.notifier.post_prompt(channel, &prompt).await {
            warn!(user_id, channel_id = %channel, error = %e, "approval prompt not delivered");
        }
        Ok(Some((id, prompt)))
    }

    pub async fn reset(
        &self,
        user_id: &str,
        actor: &Member,
        reason: &str,
    ) -> Result<UserRecord, RankError> {
        self.authorize(actor)?;
        self.ledger
            .reset(user_id, &actor.id, reason)
            .await
            .map_err(|e| self.track(EventSource::Command, user_id, "reset failed", e))
    }

    pub async fn export_history(
        &self,
        user_id: &str,
        username: &str,
        actor: &Member,
    ) -> Result<ExportArtifact, RankError> {
        self.authorize(actor)?;
        let record = self
            .repo
            .get_or_create_user(user_id)
            .await
            .map_err(|e| self.track(EventSource::Command, user_id, "export failed", e))?;
        Ok(generate_export(&record, username, Utc::now()))
    }

    /// Export every tracked user, top of the positive leaderboard first.
    /// Users who can no longer be looked up are left out.
    pub async fn export_all(&self, actor: &Member) -> Result<Vec<ExportArtifact>, RankError> {
        self.authorize(actor)?;
        let records = self
            .repo
            .leaderboard(LeaderboardField::PositiveRep, BULK_EXPORT_SCAN)
            .await
            .map_err(|e| self.track(EventSource::Command, &actor.id, "bulk export failed", e))?;
        if records.len() > BULK_EXPORT_MAX {
            return Err(RankError::ExportTooLarge {
                count: records.len(),
                max: BULK_EXPORT_MAX,
            });
        }

        let generated_at = Utc::now();
        let mut artifacts = Vec::with_capacity(records.len());
        for record in &records {
            match self.directory.fetch_member(&record.user_id).await {
                Ok(Some(member)) => {
                    artifacts.push(generate_export(record, &member.display_name, generated_at));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(user_id = %record.user_id, error = %e, "member lookup failed, leaving out of export");
                }
            }
        }
        info!(actor_id = %actor.id, count = artifacts.len(), "bulk export generated");
        Ok(artifacts)
    }

    pub async fn staff_report(&self, user_id: &str) -> Result<StaffReport, RankError> {
        let member = self
            .directory
            .fetch_member(user_id)
            .await
            .map_err(|e| self.track(EventSource::Command, user_id, "failed to fetch member", e))?
            .ok_or_else(|| RankError::MemberNotFound {
                user_id: user_id.to_string(),
            })?;
        let hierarchy = self.config.hierarchy();
        let rank = hierarchy
            .highest_index(member.role_ids.as_slice())
            .and_then(|i| hierarchy.get(i))
            .ok_or_else(|| RankError::NotRecognizedStaff {
                user_id: user_id.to_string(),
            })?;
        let record = self
            .repo
            .get_or_create_user(user_id)
            .await
            .map_err(|e| self.track(EventSource::Command, user_id, "failed to load user", e))?;
        Ok(StaffReport {
            user_id: record.user_id.clone(),
            display_name: member.display_name,
            rank: rank.name.clone(),
            standing: Standing::from(&record),
            recent_history: record
                .history_newest_first()
                .take(REPORT_HISTORY_LEN)
                .cloned()
                .collect(),
            loa: record.loa_status,
        })
    }

    // -------------------------------------------------------------------
    // Rank changes
    // -------------------------------------------------------------------

    pub async fn process_rank_change(
        &self,
        user_id: &str,
        direction: RankDirection,
        actor: &Member,
    ) -> Result<RankChange, RankError> {
        self.authorize(actor)?;
        self.engine
            .process_rank_change(user_id, direction, actor)
            .await
    }

    pub async fn resolve_request(
        &self,
        id: RequestId,
        resolution: Resolution,
        actor: &Member,
    ) -> Result<GateResolution, RankError> {
        self.authorize(actor)?;
        self.gate.resolve(id, resolution, &self.engine, actor).await
    }

    pub async fn eligible_staff(&self) -> StaffResult<Vec<EligibleStaff>> {
        self.evaluator
            .eligible(
                &self.repo,
                self.directory.as_ref(),
                self.config.hierarchy(),
                ELIGIBILITY_SCAN_LIMIT,
            )
            .await
    }

    /// Eligible staff rendered for management, with a process-all action
    /// when anyone is waiting.
    pub async fn eligible_listing(&self) -> StaffResult<EligibleListing> {
        Ok(render_eligible(&self.eligible_staff().await?))
    }

    /// Approve a request for every eligible staff member, one at a time.
    pub async fn mass_process(&self, actor: &Member) -> Result<BulkReport, RankError> {
        self.authorize(actor)?;
        let eligible = self
            .eligible_staff()
            .await
            .map_err(|e| self.track(EventSource::Interaction, &actor.id, "eligibility scan failed", e))?;
        let ids: Vec<RequestId> = eligible
            .into_iter()
            .map(|staff| {
                let request = PendingRankRequest::new(
                    staff.user_id,
                    staff.direction,
                    format!("Mass processing by {}", actor.display_name),
                );
                self.gate.open(request).0
            })
            .collect();
        info!(actor_id = %actor.id, count = ids.len(), "mass processing eligible staff");
        Ok(self
            .gate
            .bulk_resolve(&ids, Resolution::Approve, &self.engine, actor)
            .await)
    }

    // -------------------------------------------------------------------
    // Leave of absence
    // -------------------------------------------------------------------

    pub async fn request_loa(
        &self,
        member: &Member,
        reason: &str,
    ) -> Result<ApprovalPrompt, LoaError> {
        self.loa.request_loa(member, reason).await
    }

    pub async fn approve_loa(
        &self,
        user_id: &str,
        reason: Option<&str>,
        actor: &Member,
    ) -> Result<UserRecord, LoaError> {
        self.authorize_loa(actor)?;
        self.loa.approve(user_id, reason, actor).await
    }

    pub async fn deny_loa(&self, user_id: &str, actor: &Member) -> Result<(), LoaError> {
        self.authorize_loa(actor)?;
        self.loa.deny(user_id, actor).await
    }

    pub async fn return_from_loa(&self, user_id: &str) -> Result<UserRecord, LoaError> {
        self.loa.return_from_loa(user_id).await
    }

    // -------------------------------------------------------------------
    // Interactions
    // -------------------------------------------------------------------

    /// Authorize and dispatch a parsed interaction.
    pub async fn handle_action(&self, action: &ActionDescriptor, actor: &Member) -> ActionReply {
        if !self.is_authorized(actor) {
            info!(actor_id = %actor.id, action = %action, "unauthorized interaction");
            return ActionReply::failed(
                RankError::Unauthorized {
                    actor_id: actor.id.clone(),
                }
                .user_message(),
            );
        }

        match action {
            ActionDescriptor::ApproveRank { request_id, .. } => {
                match self.resolve_request(*request_id, Resolution::Approve, actor).await {
                    Ok(GateResolution::Approved(change)) => ActionReply::ok(change.summary()),
                    Ok(GateResolution::Denied { .. }) => {
                        ActionReply::ok("Request denied. Points remain unchanged.")
                    }
                    Err(e) => ActionReply::failed(e.user_message()),
                }
            }
            ActionDescriptor::DenyRank { request_id, .. } => {
                match self.resolve_request(*request_id, Resolution::Deny, actor).await {
                    Ok(_) => ActionReply::ok("Request denied. Points remain unchanged."),
                    Err(e) => ActionReply::failed(e.user_message()),
                }
            }
            ActionDescriptor::ApproveLoa { target_id } => {
                match self.approve_loa(target_id, None, actor).await {
                    Ok(_) => ActionReply::ok(format!("You approved the LOA for <@{target_id}>.")),
                    Err(e) => ActionReply::failed(self.loa_message(target_id, e)),
                }
            }
            ActionDescriptor::DenyLoa { target_id } => match self.deny_loa(target_id, actor).await {
                Ok(()) => ActionReply::ok("You denied the request."),
                Err(e) => ActionReply::failed(self.loa_message(target_id, e)),
            },
            ActionDescriptor::MassProcess => match self.mass_process(actor).await {
                Ok(report) => ActionReply::ok(report.render()),
                Err(e) => ActionReply::failed(e.user_message()),
            },
        }
    }

    fn loa_message(&self, user_id: &str, err: LoaError) -> String {
        match err {
            LoaError::Store(e) => self
                .track(EventSource::Interaction, user_id, "LOA update failed", e)
                .user_message(),
            other => other.user_message(),
        }
    }

    fn authorize(&self, actor: &Member) -> Result<(), RankError> {
        if self.is_authorized(actor) {
            Ok(())
        } else {
            Err(RankError::Unauthorized {
                actor_id: actor.id.clone(),
            })
        }
    }

    fn authorize_loa(&self, actor: &Member) -> Result<(), LoaError> {
        if self.is_authorized(actor) {
            Ok(())
        } else {
            Err(LoaError::Unauthorized {
                actor_id: actor.id.clone(),
            })
        }
    }

    /// Record an infrastructure failure and reduce it to a correlation id.
    /// Rejected input is passed back as is.
    fn track(&self, source: EventSource, user_id: &str, message: &str, err: StaffError) -> RankError {
        if let StaffError::Validation { message } = err {
            return RankError::InvalidInput { message };
        }
        let event = TrackedEvent::error(source, format!("{message}: {err}")).for_user(user_id);
        let correlation_id = self.tracker.track(event);
        RankError::Infrastructure { correlation_id }
    }
}
