//! Seller aggregate maintenance.
//!
//! The seller's `rating` and `review_count` are derived data. They are always
//! recomputed from the full set of stored reviews, never adjusted by delta,
//! and always inside the same write transaction as the review change that
//! triggered them. A failed recompute therefore rolls the review change back.

#![allow(clippy::missing_errors_doc)]

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

use crate::model::Rating;
use crate::store::{ReviewStore, StoreError};

/// Stored aggregates are compared with this tolerance when verifying.
const RATING_EPSILON: f64 = 1e-9;

/// Mean rating and number of reviews for one seller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SellerAggregate {
    /// Mean rating rounded half-up to one decimal; 0.0 with no reviews.
    pub rating: f64,
    pub review_count: u32,
}

impl SellerAggregate {
    pub const EMPTY: Self = Self {
        rating: 0.0,
        review_count: 0,
    };

    /// Aggregate over a complete set of ratings.
    #[must_use]
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        if ratings.is_empty() {
            return Self::EMPTY;
        }
        let count = u64::try_from(ratings.len()).unwrap_or(u64::MAX);
        let sum: u64 = ratings.iter().map(|r| u64::from(r.get())).sum();

        Self {
            rating: round_half_up_tenths(sum, count),
            review_count: u32::try_from(ratings.len()).unwrap_or(u32::MAX),
        }
    }
}

/// `sum / count` rounded half-up to one decimal place.
///
/// Works in integer tenths so that 3.25 becomes 3.3 and 3.35 becomes 3.4
/// regardless of how the quotient would round in binary floating point.
fn round_half_up_tenths(sum: u64, count: u64) -> f64 {
    let tenths = (20 * sum + count) / (2 * count);
    // Ratings are 1..=5, so tenths never exceeds 50.
    f64::from(u32::try_from(tenths).unwrap_or(u32::MAX)) / 10.0
}

#[derive(Debug, Error)]
pub enum RecomputeError {
    /// No seller row to write the aggregate onto.
    #[error("Seller not found: {seller_id}")]
    SellerMissing { seller_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Stored versus recomputed aggregate for one seller.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateCheck {
    pub seller_id: String,
    pub stored: SellerAggregate,
    pub computed: SellerAggregate,
    pub consistent: bool,
}

/// Recomputes seller aggregates on a connection or open transaction.
///
/// Callers pass the transaction that holds the review write so the recompute
/// sees it and commits or rolls back with it.
#[derive(Clone, Copy)]
pub struct AggregateUpdater<'c> {
    conn: &'c Connection,
}

impl<'c> AggregateUpdater<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Recompute and persist the aggregate for `seller_id` from every review
    /// of both kinds.
    pub fn recompute(&self, seller_id: &str) -> Result<SellerAggregate, RecomputeError> {
        let ratings = ReviewStore::new(self.conn).ratings_for_seller(seller_id)?;
        let aggregate = SellerAggregate::from_ratings(&ratings);

        let updated = self.conn.execute(
            "UPDATE sellers SET rating = ?, review_count = ? WHERE seller_id = ?",
            params![aggregate.rating, aggregate.review_count, seller_id],
        )?;
        if updated == 0 {
            return Err(RecomputeError::SellerMissing {
                seller_id: seller_id.to_string(),
            });
        }

        tracing::debug!(
            seller_id,
            rating = aggregate.rating,
            review_count = aggregate.review_count,
            "recomputed seller aggregate"
        );
        Ok(aggregate)
    }

    /// Compare the stored aggregate with a fresh computation without writing.
    pub fn verify(&self, seller_id: &str) -> Result<AggregateCheck, RecomputeError> {
        let stored = self
            .conn
            .query_row(
                "SELECT rating, review_count FROM sellers WHERE seller_id = ?",
                [seller_id],
                |row| {
                    Ok(SellerAggregate {
                        rating: row.get(0)?,
                        review_count: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| RecomputeError::SellerMissing {
                seller_id: seller_id.to_string(),
            })?;

        let ratings = ReviewStore::new(self.conn).ratings_for_seller(seller_id)?;
        let computed = SellerAggregate::from_ratings(&ratings);
        let consistent = stored.review_count == computed.review_count
            && (stored.rating - computed.rating).abs() < RATING_EPSILON;

        if !consistent {
            tracing::warn!(
                seller_id,
                stored_rating = stored.rating,
                stored_count = stored.review_count,
                computed_rating = computed.rating,
                computed_count = computed.review_count,
                "seller aggregate drift"
            );
        }

        Ok(AggregateCheck {
            seller_id: seller_id.to_string(),
            stored,
            computed,
            consistent,
        })
    }
}
