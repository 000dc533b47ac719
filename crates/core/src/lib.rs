//! Orchestra domain primitives shared by every crate in the workspace.
//!
//! This crate has zero internal dependencies. It holds the id and timestamp
//! aliases, the domain error type and environment configuration helpers,
//! the instance-owned [`registry::Registry`] used for pluggable
//! implementations, the schedule status state machine, and the message
//! envelope exchanged over the bus.

pub mod config;
pub mod error;
pub mod message;
pub mod registry;
pub mod status;
pub mod types;
