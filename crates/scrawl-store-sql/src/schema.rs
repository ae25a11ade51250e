//! SQL schema for the report store.
//!
//! Kept to one portable statement so it runs unchanged on PostgreSQL and
//! SQLite through the `Any` driver.

/// Idempotent DDL for the `reports` table.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS reports (
    id    TEXT PRIMARY KEY,
    time  TEXT NOT NULL,   -- RFC 3339 UTC, nanosecond precision
    data  TEXT NOT NULL    -- compact JSON
)";
