//! Staffrep Core — domain models, error taxonomy, the user record store
//! contract and the ports to the chat platform.
//!
//! Nothing in this crate talks to a database or to the chat platform
//! directly; backends live in `staffrep-db` and the workflows in
//! `staffrep-engine`.

pub mod error;
pub mod models;
pub mod ports;
pub mod repository;
