//! Reputation history entries.

use serde::{Deserialize, Serialize};

use crate::error::StaffError;

/// Moderator id recorded on entries written by automation rather than a
/// person.
pub const SYSTEM_ACTOR_ID: &str = "system";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReputationAction {
    AddPos,
    AddNeg,
    Promote,
    Demote,
    Reset,
}

impl ReputationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReputationAction::AddPos => "ADD_POS",
            ReputationAction::AddNeg => "ADD_NEG",
            ReputationAction::Promote => "PROMOTE",
            ReputationAction::Demote => "DEMOTE",
            ReputationAction::Reset => "RESET",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StaffError> {
        match s {
            "ADD_POS" => Ok(ReputationAction::AddPos),
            "ADD_NEG" => Ok(ReputationAction::AddNeg),
            "PROMOTE" => Ok(ReputationAction::Promote),
            "DEMOTE" => Ok(ReputationAction::Demote),
            "RESET" => Ok(ReputationAction::Reset),
            other => Err(StaffError::Serialization(format!(
                "unknown reputation action: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ReputationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable line of a user's reputation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReputationLogEntry {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub moderator_id: String,
    pub action: ReputationAction,
    pub amount: i64,
    pub reason: String,
}

/// Input for appending a history entry. A missing timestamp is filled
/// with the current time by the ledger.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub timestamp: Option<i64>,
    pub moderator_id: String,
    pub action: ReputationAction,
    pub amount: i64,
    pub reason: String,
}

impl NewLogEntry {
    pub fn into_entry(self, now_millis: i64) -> ReputationLogEntry {
        ReputationLogEntry {
            timestamp: self.timestamp.unwrap_or(now_millis),
            moderator_id: self.moderator_id,
            action: self.action,
            amount: self.amount,
            reason: self.reason,
        }
    }
}
