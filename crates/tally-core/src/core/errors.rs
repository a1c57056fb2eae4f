//! Typed error types for the tally-core service layer.

use serde::Serialize;
use thiserror::Error;

use crate::aggregate::RecomputeError;
use crate::eligibility::Rejection;
use crate::model::ValidationError;
use crate::store::StoreError;

/// Result type alias for core service operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the tally-core service layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input: missing ids, rating out of range, empty patch.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The reviewer may not review this transaction.
    #[error("Not eligible to review: {0}")]
    Ineligible(Rejection),

    /// One review per reviewer and transaction.
    #[error("{reviewer_id} has already reviewed {transaction}")]
    AlreadyReviewed {
        reviewer_id: String,
        transaction: String,
    },

    /// Only the author may change or delete a review.
    #[error("Review {review_id} was not written by {reviewer_id}")]
    Forbidden {
        review_id: String,
        reviewer_id: String,
    },

    /// A review was not found.
    #[error("Review not found: {review_id}")]
    ReviewNotFound { review_id: String },

    /// A seller was not found.
    #[error("Seller not found: {seller_id}")]
    SellerNotFound { seller_id: String },

    /// The seller aggregate could not be brought in line with the reviews.
    /// The triggering review change was rolled back.
    #[error("Failed to recompute aggregate for seller {seller_id}")]
    Recompute {
        seller_id: String,
        #[source]
        source: RecomputeError,
    },

    /// An internal storage or database error.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Failure reason reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    ValidationFailed,
    DuplicateReview,
    NotFound,
    Forbidden,
    InternalError,
}

impl FailureCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "validation_failed",
            Self::DuplicateReview => "duplicate_review",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::InternalError => "internal_error",
        }
    }
}

impl CoreError {
    #[must_use]
    pub const fn code(&self) -> FailureCode {
        match self {
            Self::Validation(_) | Self::Ineligible(_) => FailureCode::ValidationFailed,
            Self::AlreadyReviewed { .. } => FailureCode::DuplicateReview,
            Self::Forbidden { .. } => FailureCode::Forbidden,
            Self::ReviewNotFound { .. } | Self::SellerNotFound { .. } => FailureCode::NotFound,
            Self::Recompute { .. } | Self::Internal(_) => FailureCode::InternalError,
        }
    }
}

impl From<Rejection> for CoreError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::AlreadyReviewed {
                transaction,
                reviewer_id,
                ..
            } => Self::AlreadyReviewed {
                reviewer_id,
                transaction,
            },
            other => Self::Ineligible(other),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate {
                reviewer_id,
                transaction,
            } => Self::AlreadyReviewed {
                reviewer_id,
                transaction,
            },
            StoreError::NotFound { review_id } => Self::ReviewNotFound { review_id },
            StoreError::Forbidden {
                review_id,
                reviewer_id,
            } => Self::Forbidden {
                review_id,
                reviewer_id,
            },
            StoreError::Sqlite(e) => Self::Internal(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err: CoreError = ValidationError::new("rating is required").into();
        assert_eq!(err.code(), FailureCode::ValidationFailed);

        let err: CoreError = Rejection::NotOwner {
            transaction: "order O1".to_string(),
            reviewer_id: "C".to_string(),
        }
        .into();
        assert_eq!(err.code(), FailureCode::ValidationFailed);

        let err: CoreError = Rejection::AlreadyReviewed {
            transaction: "order O1".to_string(),
            reviewer_id: "B".to_string(),
            review_id: "rv-00000001".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::AlreadyReviewed { .. }));
        assert_eq!(err.code().as_str(), "duplicate_review");

        let err: CoreError = StoreError::Forbidden {
            review_id: "rv-1".to_string(),
            reviewer_id: "C".to_string(),
        }
        .into();
        assert_eq!(err.code(), FailureCode::Forbidden);

        let err: CoreError = StoreError::NotFound {
            review_id: "rv-1".to_string(),
        }
        .into();
        assert_eq!(err.code(), FailureCode::NotFound);
    }

    #[test]
    fn test_code_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(FailureCode::InternalError).unwrap(),
            "internal_error"
        );
    }
}
