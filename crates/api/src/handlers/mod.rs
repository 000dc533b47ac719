pub mod clusters;
pub mod jobs;
pub mod schedules;
