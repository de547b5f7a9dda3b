//! Threshold decisions and pending rank requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StaffError;
use crate::models::action::ActionDescriptor;
use crate::models::reputation::ReputationAction;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RankDirection {
    Promote,
    Demote,
}

impl RankDirection {
    /// Short code used inside component ids.
    pub fn code(&self) -> &'static str {
        match self {
            RankDirection::Promote => "promo",
            RankDirection::Demote => "demo",
        }
    }

    pub fn parse_code(code: &str) -> Result<Self, StaffError> {
        match code.to_ascii_lowercase().as_str() {
            "promo" => Ok(RankDirection::Promote),
            "demo" => Ok(RankDirection::Demote),
            other => Err(StaffError::validation(format!(
                "unknown rank direction: {other}"
            ))),
        }
    }

    pub fn log_action(&self) -> ReputationAction {
        match self {
            RankDirection::Promote => ReputationAction::Promote,
            RankDirection::Demote => ReputationAction::Demote,
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            RankDirection::Promote => "Promoted",
            RankDirection::Demote => "Demoted",
        }
    }
}

/// Outcome of evaluating a user's counters against the thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Decision {
    None,
    RequestPromotion,
    RequestDemotion,
}

impl Decision {
    pub fn direction(&self) -> Option<RankDirection> {
        match self {
            Decision::None => None,
            Decision::RequestPromotion => Some(RankDirection::Promote),
            Decision::RequestDemotion => Some(RankDirection::Demote),
        }
    }
}

/// Identifier of a pending request held by the approval gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl std::str::FromStr for RequestId {
    type Err = StaffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(RequestId)
            .map_err(|e| StaffError::validation(format!("invalid request id: {e}")))
    }
}

/// Ephemeral promotion/demotion request awaiting a human decision.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRankRequest {
    pub id: RequestId,
    pub target_user_id: String,
    pub direction: RankDirection,
    /// Reason text of the action that crossed the threshold.
    pub trigger_reason: String,
    pub created_at: DateTime<Utc>,
}

impl PendingRankRequest {
    pub fn new(
        target_user_id: impl Into<String>,
        direction: RankDirection,
        trigger_reason: impl Into<String>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            target_user_id: target_user_id.into(),
            direction,
            trigger_reason: trigger_reason.into(),
            created_at: Utc::now(),
        }
    }
}

/// Rendered approval artifact posted to the management channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalPrompt {
    pub title: String,
    pub body: String,
    /// RGB colour of the prompt.
    pub color: u32,
    pub approve: ActionDescriptor,
    pub deny: ActionDescriptor,
}
