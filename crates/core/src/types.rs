/// Row identifier; every table keys on a PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// UTC timestamp, matching the TIMESTAMPTZ columns.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
