//! Workflow outcome types.
//!
//! Most variants are expected business outcomes rather than faults;
//! each maps to a message that is safe to show the invoking user.

use staffrep_core::error::StaffError;
use staffrep_core::models::request::RequestId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankError {
    #[error("user {user_id} does not hold a recognized staff role")]
    NotRecognizedStaff { user_id: String },

    #[error("already at the highest rank ({rank})")]
    AlreadyAtCeiling { rank: String },

    #[error("already at the lowest rank ({rank})")]
    AlreadyAtFloor { rank: String },

    #[error("member {user_id} not found")]
    MemberNotFound { user_id: String },

    #[error("request {request_id} was already resolved")]
    AlreadyResolved { request_id: RequestId },

    #[error("request {request_id} is unknown or expired")]
    UnknownRequest { request_id: RequestId },

    #[error("actor {actor_id} is not authorized to manage staff")]
    Unauthorized { actor_id: String },

    #[error("a rank change for {user_id} is already in progress")]
    TransitionInProgress { user_id: String },

    #[error("role change for {user_id} is incomplete (error ID {correlation_id})")]
    RoleChangePartialFailure {
        user_id: String,
        correlation_id: String,
        /// Whether the previous role could be granted back.
        restored: bool,
    },

    #[error("infrastructure failure (error ID {correlation_id})")]
    Infrastructure { correlation_id: String },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("bulk export of {count} users exceeds the limit of {max}")]
    ExportTooLarge { count: usize, max: usize },
}

impl RankError {
    /// Text for the invoking actor. Never exposes internals.
    pub fn user_message(&self) -> String {
        match self {
            RankError::NotRecognizedStaff { .. } => {
                "User does not hold a recognized staff role.".into()
            }
            RankError::AlreadyAtCeiling { .. } => "User is already at the highest rank.".into(),
            RankError::AlreadyAtFloor { .. } => "User is already at the lowest rank.".into(),
            RankError::MemberNotFound { .. } => "Member not found or has left the server.".into(),
            RankError::AlreadyResolved { .. } => "This request has already been handled.".into(),
            RankError::UnknownRequest { .. } => {
                "This request is no longer active. Run the eligibility check again.".into()
            }
            RankError::Unauthorized { .. } => {
                "You are not authorized to manage staff requests.".into()
            }
            RankError::TransitionInProgress { .. } => {
                "A rank change for this user is already being processed.".into()
            }
            RankError::RoleChangePartialFailure { correlation_id, .. } => format!(
                "The role change could not be completed. An operator has been alerted (Error ID: {correlation_id})."
            ),
            RankError::Infrastructure { correlation_id } => {
                format!("Something went wrong (Error ID: {correlation_id}). Please try again later.")
            }
            RankError::InvalidInput { message } => message.clone(),
            RankError::ExportTooLarge { .. } => {
                "Too many staff to bulk export here. Please request individual users.".into()
            }
        }
    }

    /// Expected outcomes that need no operator follow-up.
    pub fn is_business_outcome(&self) -> bool {
        !matches!(
            self,
            RankError::RoleChangePartialFailure { .. } | RankError::Infrastructure { .. }
        )
    }
}

impl From<RankError> for StaffError {
    fn from(err: RankError) -> Self {
        match err {
            RankError::MemberNotFound { ref user_id } => StaffError::NotFound {
                entity: "member".into(),
                id: user_id.clone(),
            },
            RankError::UnknownRequest { request_id } => StaffError::NotFound {
                entity: "rank_request".into(),
                id: request_id.to_string(),
            },
            RankError::RoleChangePartialFailure { .. } | RankError::Infrastructure { .. } => {
                StaffError::Internal(err.to_string())
            }
            other => StaffError::validation(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoaError {
    #[error("user {user_id} is already on leave")]
    AlreadyOnLeave { user_id: String },

    #[error("user {user_id} is not on leave")]
    NotOnLeave { user_id: String },

    #[error("actor {actor_id} is not authorized to manage staff")]
    Unauthorized { actor_id: String },

    #[error(transparent)]
    Store(#[from] StaffError),
}

impl LoaError {
    pub fn user_message(&self) -> String {
        match self {
            LoaError::AlreadyOnLeave { .. } => "This staff member is already on leave.".into(),
            LoaError::NotOnLeave { .. } => "This staff member is not on leave.".into(),
            LoaError::Unauthorized { .. } => {
                "You are not authorized to manage staff requests.".into()
            }
            LoaError::Store(_) => "The leave status could not be updated. Please try again.".into(),
        }
    }
}
