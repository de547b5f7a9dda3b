//! Ports to collaborators outside this workspace: the chat platform and
//! the operator-facing error tracker.

use serde::{Deserialize, Serialize};

use crate::error::StaffResult;
use crate::models::member::Member;
use crate::models::request::ApprovalPrompt;

/// Member and role operations on the chat platform.
pub trait MemberDirectory: Send + Sync {
    /// `Ok(None)` when the user is no longer in the community.
    fn fetch_member(
        &self,
        user_id: &str,
    ) -> impl Future<Output = StaffResult<Option<Member>>> + Send;

    /// Idempotent by role id.
    fn grant_role(
        &self,
        user_id: &str,
        role_id: &str,
    ) -> impl Future<Output = StaffResult<()>> + Send;

    /// Idempotent by role id.
    fn revoke_role(
        &self,
        user_id: &str,
        role_id: &str,
    ) -> impl Future<Output = StaffResult<()>> + Send;
}

/// Outbound messages. Every call is best-effort: callers log failures
/// and carry on.
pub trait Notifier: Send + Sync {
    fn send_direct(
        &self,
        user_id: &str,
        message: &str,
    ) -> impl Future<Output = StaffResult<()>> + Send;

    fn send_channel(
        &self,
        channel_id: &str,
        message: &str,
    ) -> impl Future<Output = StaffResult<()>> + Send;

    fn post_prompt(
        &self,
        channel_id: &str,
        prompt: &ApprovalPrompt,
    ) -> impl Future<Output = StaffResult<()>> + Send;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Startup,
    Command,
    Interaction,
    RankChange,
    Store,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    /// State may be inconsistent and needs operator follow-up.
    Fatal,
}

/// A structured diagnostic event handed to the [`ErrorTracker`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedEvent {
    pub source: EventSource,
    pub severity: Severity,
    pub message: String,
    pub user_id: Option<String>,
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl TrackedEvent {
    pub fn error(source: EventSource, message: impl Into<String>) -> Self {
        Self {
            source,
            severity: Severity::Error,
            message: message.into(),
            user_id: None,
            context: serde_json::Map::new(),
        }
    }

    pub fn fatal(source: EventSource, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Fatal,
            ..Self::error(source, message)
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// Records infrastructure failures and hands back a correlation id the
/// invoking actor can quote to an operator.
pub trait ErrorTracker: Send + Sync {
    fn track(&self, event: TrackedEvent) -> String;
}
