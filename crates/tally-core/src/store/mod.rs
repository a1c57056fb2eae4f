//! SQLite storage for reviews and the marketplace records they reference.
//!
//! The `reviews` table is the review store proper. `sellers`, `orders`,
//! `order_items` and `service_bookings` hold the collaborator records the
//! engine reads, so a single database file is enough to run the engine.
//! The seller aggregate columns (`rating`, `review_count`) are written only by
//! [`crate::aggregate::AggregateUpdater`].

#![allow(clippy::missing_errors_doc)]

mod records;
mod reviews;

pub use reviews::ReviewStore;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;

/// Default time a connection waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised by the review store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The one-review-per-transaction unique constraint tripped.
    #[error("Review already exists for reviewer {reviewer_id} and {transaction}")]
    Duplicate {
        reviewer_id: String,
        transaction: String,
    },

    #[error("Review not found: {review_id}")]
    NotFound { review_id: String },

    /// Mutation attempted by someone other than the review's author.
    #[error("Review {review_id} was not written by {reviewer_id}")]
    Forbidden {
        review_id: String,
        reviewer_id: String,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Connection settings for [`ReviewDb`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// How long to wait on a locked database before giving up.
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}

/// Database holding reviews, sellers and the transactions that grant eligibility.
///
/// One `ReviewDb` owns one connection. Concurrent callers open their own
/// `ReviewDb` on the same file; write units are serialised by SQLite's write
/// lock (see [`ReviewDb::write_transaction`]).
pub struct ReviewDb {
    conn: Connection,
}

impl ReviewDb {
    /// Open or create a review database at the given path with default settings.
    ///
    /// Creates parent directories if they don't exist.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(&StoreConfig::new(path))
    }

    /// Open or create a review database using the given configuration.
    pub fn open_with(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent directories: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(&config.path)
            .with_context(|| format!("Failed to open database: {}", config.path.display()))?;
        conn.busy_timeout(config.busy_timeout)
            .context("Failed to set busy timeout")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;

        tracing::debug!(path = %config.path.display(), "opened review database");
        Ok(Self { conn })
    }

    /// Create an in-memory review database (for tests and throwaway runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        Ok(Self { conn })
    }

    /// Initialize the database schema.
    ///
    /// Creates all tables and indexes if they don't exist.
    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA_SQL)
            .context("Failed to initialize schema")?;
        Ok(())
    }

    /// Review store bound to this database's connection.
    #[must_use]
    pub const fn reviews(&self) -> ReviewStore<'_> {
        ReviewStore::new(&self.conn)
    }

    /// Begin a write transaction.
    ///
    /// Uses `BEGIN IMMEDIATE` so the write lock is taken up front: a second
    /// writer waits (up to the busy timeout) instead of failing on a lock
    /// upgrade, and every read inside the transaction sees its own writes.
    pub fn write_transaction(&self) -> StoreResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Timestamps are stored as fixed-width RFC 3339 text so they sort lexically.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS sellers (
    seller_id    TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    rating       REAL NOT NULL DEFAULT 0,
    review_count INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS orders (
    order_id   TEXT PRIMARY KEY,
    owner_id   TEXT NOT NULL,
    status     TEXT NOT NULL
               CHECK (status IN ('pending', 'confirmed', 'completed', 'cancelled')),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_items (
    order_id   TEXT NOT NULL REFERENCES orders(order_id) ON DELETE CASCADE,
    listing_id TEXT NOT NULL,
    seller_id  TEXT NOT NULL,
    PRIMARY KEY (order_id, listing_id)
);

CREATE TABLE IF NOT EXISTS service_bookings (
    booking_id   TEXT PRIMARY KEY,
    owner_id     TEXT NOT NULL,
    seller_id    TEXT NOT NULL,
    status       TEXT NOT NULL
                 CHECK (status IN ('pending', 'confirmed', 'completed', 'cancelled')),
    scheduled_at TEXT NOT NULL
);

-- seller_id carries no foreign key: what happens to reviews of a removed
-- seller is not defined here.
CREATE TABLE IF NOT EXISTS reviews (
    review_id          TEXT PRIMARY KEY,
    reviewer_id        TEXT NOT NULL,
    seller_id          TEXT NOT NULL,
    target_type        TEXT NOT NULL CHECK (target_type IN ('seller', 'service')),
    order_id           TEXT,
    service_booking_id TEXT,
    rating             INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    title              TEXT,
    comment            TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    CHECK (
        (target_type = 'seller' AND order_id IS NOT NULL AND service_booking_id IS NULL)
        OR (target_type = 'service' AND service_booking_id IS NOT NULL AND order_id IS NULL)
    )
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_reviewer_order
    ON reviews(reviewer_id, order_id) WHERE order_id IS NOT NULL;

CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_reviewer_booking
    ON reviews(reviewer_id, service_booking_id) WHERE service_booking_id IS NOT NULL;

CREATE INDEX IF NOT EXISTS idx_reviews_seller ON reviews(seller_id, target_type);
CREATE INDEX IF NOT EXISTS idx_reviews_reviewer ON reviews(reviewer_id);
";

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table_exists(db: &ReviewDb, name: &str) -> bool {
        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_open_and_init_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("tally.db");

        let db = ReviewDb::open(&db_path).unwrap();
        db.init_schema().unwrap();
        assert!(db_path.exists());

        for table in ["sellers", "orders", "order_items", "service_bookings", "reviews"] {
            assert!(table_exists(&db, table), "missing table {table}");
        }
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let db = ReviewDb::open_in_memory().unwrap();
        db.init_schema().unwrap();
        db.init_schema().unwrap();
    }

    #[test]
    fn test_target_check_rejects_both_references() {
        let db = ReviewDb::open_in_memory().unwrap();
        db.init_schema().unwrap();

        let result = db.conn().execute(
            "INSERT INTO reviews (review_id, reviewer_id, seller_id, target_type, order_id,
                service_booking_id, rating, created_at, updated_at)
             VALUES ('rv-1', 'b', 'S', 'seller', 'O1', 'B1', 4, 'x', 'x')",
            [],
        );
        assert!(result.is_err());

        let result = db.conn().execute(
            "INSERT INTO reviews (review_id, reviewer_id, seller_id, target_type, order_id,
                rating, created_at, updated_at)
             VALUES ('rv-2', 'b', 'S', 'service', 'O1', 4, 'x', 'x')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_timestamp_roundtrip_is_sortable() {
        let earlier = DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = earlier + chrono::Duration::milliseconds(1);

        let a = format_ts(&earlier);
        let b = format_ts(&later);
        assert!(a < b);
        assert_eq!(parse_ts(0, &a).unwrap(), earlier);
    }
}
