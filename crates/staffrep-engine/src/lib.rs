//! Staffrep Engine — reputation ledger, threshold evaluation, rank
//! transitions and the human approval gate.
//!
//! Workflows are generic over the store ([`UserRepository`]) and the
//! chat platform ports ([`MemberDirectory`], [`Notifier`]) so that the
//! engine has no dependency on a database crate or a chat SDK.
//!
//! [`UserRepository`]: staffrep_core::repository::UserRepository
//! [`MemberDirectory`]: staffrep_core::ports::MemberDirectory
//! [`Notifier`]: staffrep_core::ports::Notifier

pub mod config;
pub mod error;
pub mod export;
pub mod gate;
pub mod ledger;
pub mod loa;
pub mod service;
pub mod threshold;
pub mod tracker;
pub mod transition;

pub use config::StaffConfig;
pub use error::{LoaError, RankError};
pub use gate::{ApprovalGate, Resolution};
pub use ledger::ReputationLedger;
pub use service::StaffService;
pub use threshold::ThresholdEvaluator;
pub use transition::RankTransitionEngine;
