//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod cluster_repo;
pub mod job_repo;
pub mod schedule_repo;

pub use cluster_repo::ClusterRepo;
pub use job_repo::JobRepo;
pub use schedule_repo::ScheduleRepo;
