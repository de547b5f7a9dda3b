//! Leave-of-absence workflow.
//!
//! LOA is independent of rank and counters: `Inactive -> Active` on
//! approval and back on return.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use staffrep_core::models::action::ActionDescriptor;
use staffrep_core::models::member::Member;
use staffrep_core::models::request::ApprovalPrompt;
use staffrep_core::models::user::{LoaStatus, UserRecord, UserUpdate};
use staffrep_core::ports::Notifier;
use staffrep_core::repository::UserRepository;
use tracing::{info, warn};

use crate::config::StaffConfig;
use crate::error::LoaError;
use crate::ledger::now_millis;

pub const DEFAULT_LOA_REASON: &str = "Approved by Management";
pub const LOA_REQUEST_COLOR: u32 = 0xffa500;

pub struct LoaWorkflow<R, N> {
    repo: R,
    notifier: Arc<N>,
    config: Arc<StaffConfig>,
    /// Reasons of requests awaiting a decision, by user id.
    requested: Mutex<HashMap<String, String>>,
}

impl<R: UserRepository, N: Notifier> LoaWorkflow<R, N> {
    pub fn new(repo: R, notifier: Arc<N>, config: Arc<StaffConfig>) -> Self {
        Self {
            repo,
            notifier,
            config,
            requested: Mutex::new(HashMap::new()),
        }
    }

    /// Post a leave request to the management channel.
    pub async fn request_loa(
        &self,
        member: &Member,
        reason: &str,
    ) -> Result<ApprovalPrompt, LoaError> {
        let record = self.repo.get_or_create_user(&member.id).await?;
        if record.loa_status.is_active {
            return Err(LoaError::AlreadyOnLeave {
                user_id: member.id.clone(),
            });
        }
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(member.id.clone(), reason.to_string());

        let prompt = ApprovalPrompt {
            title: "Leave of Absence Request".into(),
            body: format!(
                "**Staff Member:** <@{id}> ({name})\n**Reason:** {reason}",
                id = member.id,
                name = member.display_name
            ),
            color: LOA_REQUEST_COLOR,
            approve: ActionDescriptor::ApproveLoa {
                target_id: member.id.clone(),
            },
            deny: ActionDescriptor::DenyLoa {
                target_id: member.id.clone(),
            },
        };
        let channel = &self.config.channels.management;
        if let Err(e) = self.notifier.post_prompt(channel, &prompt).await {
            warn!(user_id = %member.id, channel_id = %channel, error = %e, "LOA prompt not delivered");
        }
        info!(user_id = %member.id, "LOA requested");
        Ok(prompt)
    }

    /// Put the user on leave. Without an explicit reason the one given
    /// with the request is used.
    pub async fn approve(
        &self,
        user_id: &str,
        reason: Option<&str>,
        actor: &Member,
    ) -> Result<UserRecord, LoaError> {
        let record = self.repo.get_or_create_user(user_id).await?;
        if record.loa_status.is_active {
            return Err(LoaError::AlreadyOnLeave {
                user_id: user_id.to_string(),
            });
        }
        let requested = self.take_requested(user_id);
        let reason = reason
            .map(str::to_string)
            .or(requested)
            .unwrap_or_else(|| DEFAULT_LOA_REASON.to_string());

        let record = self
            .repo
            .update_user(
                user_id,
                UserUpdate {
                    loa_status: Some(LoaStatus::active(now_millis(), reason.as_str())),
                    ..Default::default()
                },
            )
            .await?;
        info!(user_id, actor_id = %actor.id, "LOA approved");

        let dm = format!(
            "Your Leave of Absence request has been approved by <@{}>. Reason logged: {reason}",
            actor.id
        );
        self.send_direct(user_id, &dm).await;
        Ok(record)
    }

    pub async fn deny(&self, user_id: &str, actor: &Member) -> Result<(), LoaError> {
        self.take_requested(user_id);
        info!(user_id, actor_id = %actor.id, "LOA denied");
        self.send_direct(user_id, "Your LOA request was **denied** by management.")
            .await;
        Ok(())
    }

    pub async fn return_from_loa(&self, user_id: &str) -> Result<UserRecord, LoaError> {
        let record = self.repo.get_or_create_user(user_id).await?;
        if !record.loa_status.is_active {
            return Err(LoaError::NotOnLeave {
                user_id: user_id.to_string(),
            });
        }
        let record = self
            .repo
            .update_user(
                user_id,
                UserUpdate {
                    loa_status: Some(LoaStatus::default()),
                    ..Default::default()
                },
            )
            .await?;
        info!(user_id, "returned from LOA");
        Ok(record)
    }

    fn take_requested(&self, user_id: &str) -> Option<String> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id)
    }

    async fn send_direct(&self, user_id: &str, message: &str) {
        if let Err(e) = self.notifier.send_direct(user_id, message).await {
            warn!(user_id, error = %e, "LOA DM not delivered");
        }
    }
}
