/// All entity primary keys are UUIDs, serialized as strings on the wire.
pub type Id = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
