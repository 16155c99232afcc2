//! Shared primitive type aliases.

/// Owner (user) identifiers are PostgreSQL BIGINT keys issued upstream.
pub type DbId = i64;

/// Shoots and source images are addressed by UUID, generated at creation.
pub type ShootId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
