//! Review rows: create, find, update and delete.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::model::{Rating, Review, ReviewChanges, ReviewTarget, TargetKind};

use super::{conversion_error, format_ts, parse_ts, StoreError, StoreResult};

const REVIEW_COLUMNS: &str = "review_id, reviewer_id, seller_id, target_type, order_id,
    service_booking_id, rating, title, comment, created_at, updated_at";

/// Review store bound to a connection or an open transaction.
///
/// The store has no cache awareness. Uniqueness of
/// `(reviewer_id, order_id)` / `(reviewer_id, service_booking_id)` is enforced
/// here by the database, not by callers.
#[derive(Clone, Copy)]
pub struct ReviewStore<'c> {
    conn: &'c Connection,
}

impl<'c> ReviewStore<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert a new review.
    ///
    /// Returns [`StoreError::Duplicate`] when the reviewer already reviewed the
    /// same order or booking, even if the caller's pre-check missed it.
    pub fn create(&self, review: &Review) -> StoreResult<()> {
        let result = self.conn.execute(
            "INSERT INTO reviews (
                review_id, reviewer_id, seller_id, target_type, order_id,
                service_booking_id, rating, title, comment, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                review.id,
                review.reviewer_id,
                review.seller_id,
                review.target.kind().as_str(),
                review.target.order_id(),
                review.target.booking_id(),
                i64::from(review.rating),
                review.title,
                review.comment,
                format_ts(&review.created_at),
                format_ts(&review.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate {
                reviewer_id: review.reviewer_id.clone(),
                transaction: review.target.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_by_id(&self, review_id: &str) -> StoreResult<Option<Review>> {
        let review = self
            .conn
            .query_row(
                &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE review_id = ?"),
                [review_id],
                map_review,
            )
            .optional()?;
        Ok(review)
    }

    /// Reviews of one kind for a seller, newest first.
    pub fn find_by_target(&self, seller_id: &str, kind: TargetKind) -> StoreResult<Vec<Review>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
             WHERE seller_id = ? AND target_type = ?
             ORDER BY created_at DESC, review_id"
        ))?;
        let reviews = stmt
            .query_map(params![seller_id, kind.as_str()], map_review)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    /// Reviews written by a reviewer, newest first.
    pub fn find_by_reviewer(&self, reviewer_id: &str) -> StoreResult<Vec<Review>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
             WHERE reviewer_id = ?
             ORDER BY created_at DESC, review_id"
        ))?;
        let reviews = stmt
            .query_map([reviewer_id], map_review)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    /// The review a reviewer wrote for a given order or booking, if any.
    pub fn find_by_transaction(
        &self,
        reviewer_id: &str,
        target: &ReviewTarget,
    ) -> StoreResult<Option<Review>> {
        let column = match target.kind() {
            TargetKind::Seller => "order_id",
            TargetKind::Service => "service_booking_id",
        };
        let review = self
            .conn
            .query_row(
                &format!(
                    "SELECT {REVIEW_COLUMNS} FROM reviews WHERE reviewer_id = ? AND {column} = ?"
                ),
                params![reviewer_id, target.transaction_ref()],
                map_review,
            )
            .optional()?;
        Ok(review)
    }

    /// Every rating that rolls up onto a seller, across both review kinds.
    pub fn ratings_for_seller(&self, seller_id: &str) -> StoreResult<Vec<Rating>> {
        let mut stmt = self
            .conn
            .prepare("SELECT rating FROM reviews WHERE seller_id = ?")?;
        let ratings = stmt
            .query_map([seller_id], |row| {
                let value: i64 = row.get(0)?;
                Rating::new(value).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Integer,
                        Box::new(e),
                    )
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ratings)
    }

    /// Apply rating/title/comment changes to a review written by `reviewer_id`.
    ///
    /// Fails with [`StoreError::Forbidden`] if someone else wrote it.
    pub fn update(
        &self,
        review_id: &str,
        reviewer_id: &str,
        changes: &ReviewChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<Review> {
        let mut review = self.require_authored(review_id, reviewer_id)?;
        changes.apply(&mut review, now);

        self.conn.execute(
            "UPDATE reviews SET rating = ?, title = ?, comment = ?, updated_at = ?
             WHERE review_id = ? AND reviewer_id = ?",
            params![
                i64::from(review.rating),
                review.title,
                review.comment,
                format_ts(&review.updated_at),
                review.id,
                review.reviewer_id,
            ],
        )?;

        Ok(review)
    }

    /// Delete a review written by `reviewer_id`, returning the removed row.
    pub fn delete(&self, review_id: &str, reviewer_id: &str) -> StoreResult<Review> {
        let review = self.require_authored(review_id, reviewer_id)?;
        self.conn.execute(
            "DELETE FROM reviews WHERE review_id = ? AND reviewer_id = ?",
            params![review.id, review.reviewer_id],
        )?;
        Ok(review)
    }

    fn require_authored(&self, review_id: &str, reviewer_id: &str) -> StoreResult<Review> {
        let review = self
            .find_by_id(review_id)?
            .ok_or_else(|| StoreError::NotFound {
                review_id: review_id.to_string(),
            })?;

        if review.reviewer_id != reviewer_id {
            return Err(StoreError::Forbidden {
                review_id: review_id.to_string(),
                reviewer_id: reviewer_id.to_string(),
            });
        }

        Ok(review)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Map a database row to a Review.
fn map_review(row: &Row) -> rusqlite::Result<Review> {
    let target_type: String = row.get(3)?;
    let order_id: Option<String> = row.get(4)?;
    let booking_id: Option<String> = row.get(5)?;

    let target = match (target_type.as_str(), order_id, booking_id) {
        ("seller", Some(order_id), None) => ReviewTarget::Seller { order_id },
        ("service", None, Some(booking_id)) => ReviewTarget::Service { booking_id },
        (other, order_id, booking_id) => {
            return Err(conversion_error(
                3,
                format!(
                    "inconsistent review target: type={other} order={order_id:?} booking={booking_id:?}"
                ),
            ))
        }
    };

    let rating: i64 = row.get(6)?;
    let rating = Rating::new(rating).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Integer, Box::new(e))
    })?;

    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Review {
        id: row.get(0)?,
        reviewer_id: row.get(1)?,
        seller_id: row.get(2)?,
        target,
        rating,
        title: row.get(7)?,
        comment: row.get(8)?,
        created_at: parse_ts(9, &created_at)?,
        updated_at: parse_ts(10, &updated_at)?,
    })
}
