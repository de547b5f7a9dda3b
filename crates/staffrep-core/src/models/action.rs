//! Structured interaction actions.
//!
//! Buttons on approval prompts carry a component id. The id is parsed
//! into an [`ActionDescriptor`] once, at the boundary, and everything
//! downstream works with the typed value.

use std::fmt;
use std::str::FromStr;

use crate::error::StaffError;
use crate::models::request::{RankDirection, RequestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionDescriptor {
    ApproveRank {
        request_id: RequestId,
        target_id: String,
        direction: RankDirection,
    },
    DenyRank {
        request_id: RequestId,
        target_id: String,
    },
    ApproveLoa {
        target_id: String,
    },
    DenyLoa {
        target_id: String,
    },
    MassProcess,
}

impl fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionDescriptor::ApproveRank {
                request_id,
                target_id,
                direction,
            } => write!(
                f,
                "rank_approve:{request_id}:{target_id}:{}",
                direction.code()
            ),
            ActionDescriptor::DenyRank {
                request_id,
                target_id,
            } => write!(f, "rank_deny:{request_id}:{target_id}"),
            ActionDescriptor::ApproveLoa { target_id } => write!(f, "loa_approve:{target_id}"),
            ActionDescriptor::DenyLoa { target_id } => write!(f, "loa_deny:{target_id}"),
            ActionDescriptor::MassProcess => f.write_str("mass_process"),
        }
    }
}

impl FromStr for ActionDescriptor {
    type Err = StaffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let malformed = || StaffError::validation(format!("malformed action id: {s}"));

        match parts.as_slice() {
            ["rank_approve", request, target, direction] if !target.is_empty() => {
                Ok(ActionDescriptor::ApproveRank {
                    request_id: request.parse()?,
                    target_id: (*target).to_string(),
                    direction: RankDirection::parse_code(direction)?,
                })
            }
            ["rank_deny", request, target] if !target.is_empty() => Ok(ActionDescriptor::DenyRank {
                request_id: request.parse()?,
                target_id: (*target).to_string(),
            }),
            ["loa_approve", target] if !target.is_empty() => Ok(ActionDescriptor::ApproveLoa {
                target_id: (*target).to_string(),
            }),
            ["loa_deny", target] if !target.is_empty() => Ok(ActionDescriptor::DenyLoa {
                target_id: (*target).to_string(),
            }),
            ["mass_process"] => Ok(ActionDescriptor::MassProcess),
            _ => Err(malformed()),
        }
    }
}
