//! Domain models for staff reputation tracking.

pub mod action;
pub mod hierarchy;
pub mod member;
pub mod reputation;
pub mod request;
pub mod user;
