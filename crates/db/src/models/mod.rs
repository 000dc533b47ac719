//! Row structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts
//! - Where the row is mutable, an update DTO with all-`Option` fields

pub mod cluster;
pub mod job;
pub mod schedule;
