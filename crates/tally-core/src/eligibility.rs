//! Eligibility rules: who may review what.
//!
//! A reviewer may review a seller only through an order they own that is
//! confirmed or completed and contains a listing sold by that seller. A
//! service review needs a booking they own with that seller, confirmed or
//! completed, whose scheduled time has passed. One review per transaction.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::collaborators::{BookingLookup, OrderLookup};
use crate::model::ReviewTarget;
use crate::store::ReviewStore;

/// Why a reviewer may not review a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    #[error("No {transaction} exists")]
    TransactionNotFound { transaction: String },

    #[error("{transaction} does not belong to {reviewer_id}")]
    NotOwner {
        transaction: String,
        reviewer_id: String,
    },

    /// Wrong state, wrong seller, or not yet taken place.
    #[error("{transaction} is not reviewable: {detail}")]
    NotReviewable { transaction: String, detail: String },

    #[error("{reviewer_id} already reviewed {transaction} ({review_id})")]
    AlreadyReviewed {
        transaction: String,
        reviewer_id: String,
        review_id: String,
    },
}

/// Outcome of an eligibility check.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Rejected(Rejection),
}

impl Verdict {
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }

    /// # Errors
    ///
    /// Returns the rejection when not eligible.
    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            Self::Eligible => Ok(()),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

/// Checks review eligibility against orders, bookings and existing reviews.
///
/// Read-only: safe to call for UI pre-checks.
pub struct EligibilityValidator<'a> {
    orders: &'a dyn OrderLookup,
    bookings: &'a dyn BookingLookup,
    reviews: ReviewStore<'a>,
}

impl<'a> EligibilityValidator<'a> {
    pub const fn new(
        orders: &'a dyn OrderLookup,
        bookings: &'a dyn BookingLookup,
        reviews: ReviewStore<'a>,
    ) -> Self {
        Self {
            orders,
            bookings,
            reviews,
        }
    }

    /// Decide whether `reviewer_id` may review `seller_id` through `target`.
    ///
    /// `now` is the reference time for booking schedules.
    ///
    /// # Errors
    ///
    /// Returns an error only when a lookup itself fails; ineligibility is a
    /// [`Verdict::Rejected`].
    pub fn validate(
        &self,
        reviewer_id: &str,
        seller_id: &str,
        target: &ReviewTarget,
        now: DateTime<Utc>,
    ) -> Result<Verdict> {
        let transaction = target.to_string();
        let rejected = |rejection: Rejection| -> Result<Verdict> {
            tracing::warn!(reviewer_id, seller_id, %rejection, "review not eligible");
            Ok(Verdict::Rejected(rejection))
        };

        match target {
            ReviewTarget::Seller { order_id } => {
                let Some(order) = self.orders.find_order(order_id)? else {
                    return rejected(Rejection::TransactionNotFound { transaction });
                };
                if order.owner_id != reviewer_id {
                    return rejected(Rejection::NotOwner {
                        transaction,
                        reviewer_id: reviewer_id.to_string(),
                    });
                }
                if !order.status.is_reviewable() {
                    return rejected(Rejection::NotReviewable {
                        transaction,
                        detail: format!("status is {}", order.status),
                    });
                }
                if !order.sold_by(seller_id) {
                    return rejected(Rejection::NotReviewable {
                        transaction,
                        detail: format!("no line item is sold by {seller_id}"),
                    });
                }
            }
            ReviewTarget::Service { booking_id } => {
                let Some(booking) = self.bookings.find_booking(booking_id)? else {
                    return rejected(Rejection::TransactionNotFound { transaction });
                };
                if booking.owner_id != reviewer_id {
                    return rejected(Rejection::NotOwner {
                        transaction,
                        reviewer_id: reviewer_id.to_string(),
                    });
                }
                if booking.seller_id != seller_id {
                    return rejected(Rejection::NotReviewable {
                        transaction,
                        detail: format!("booked with {}, not {seller_id}", booking.seller_id),
                    });
                }
                if !booking.status.is_reviewable() {
                    return rejected(Rejection::NotReviewable {
                        transaction,
                        detail: format!("status is {}", booking.status),
                    });
                }
                if booking.scheduled_at > now {
                    return rejected(Rejection::NotReviewable {
                        transaction,
                        detail: format!(
                            "scheduled for {}",
                            booking.scheduled_at.format("%Y-%m-%d %H:%M UTC")
                        ),
                    });
                }
            }
        }

        if let Some(existing) = self.reviews.find_by_transaction(reviewer_id, target)? {
            return rejected(Rejection::AlreadyReviewed {
                transaction,
                reviewer_id: reviewer_id.to_string(),
                review_id: existing.id,
            });
        }

        Ok(Verdict::Eligible)
    }
}
