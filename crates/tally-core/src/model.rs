//! Review domain types.
//!
//! A review always rolls up onto a seller. What differs between review kinds is
//! the completed transaction that grants eligibility: an order for seller
//! reviews, a service booking (test drive, inspection) for service reviews.
//! [`ReviewTarget`] carries exactly one of the two, so a review can never hold
//! both references or neither.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing an enum tag from text fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Input rejected before any lookup or write happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Target kind
// ============================================================================

/// Which kind of transaction a review is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Business/product review backed by a completed order
    Seller,
    /// Service review backed by a completed service booking
    Service,
}

impl TargetKind {
    pub const ALL: [Self; 2] = [Self::Seller, Self::Service];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seller => "seller",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seller" => Ok(Self::Seller),
            "service" => Ok(Self::Service),
            other => Err(ParseEnumError {
                kind: "target type",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Rating
// ============================================================================

/// Star rating between 1 and 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Rating must be between 1 and 5, got {0}")]
pub struct RatingError(pub i64);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Build a rating, rejecting anything outside 1..=5.
    pub fn new(value: i64) -> Result<Self, RatingError> {
        match u8::try_from(value) {
            Ok(v) if (Self::MIN..=Self::MAX).contains(&v) => Ok(Self(v)),
            _ => Err(RatingError(value)),
        }
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = RatingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        Self::from(rating.0)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Review target
// ============================================================================

/// The completed transaction a review is anchored to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target_type", rename_all = "lowercase")]
pub enum ReviewTarget {
    Seller { order_id: String },
    Service {
        #[serde(rename = "service_booking_id")]
        booking_id: String,
    },
}

impl ReviewTarget {
    pub fn order(order_id: impl Into<String>) -> Self {
        Self::Seller {
            order_id: order_id.into(),
        }
    }

    pub fn booking(booking_id: impl Into<String>) -> Self {
        Self::Service {
            booking_id: booking_id.into(),
        }
    }

    /// Build a target from its tag and transaction reference.
    pub fn from_parts(kind: TargetKind, transaction_ref: impl Into<String>) -> Self {
        match kind {
            TargetKind::Seller => Self::order(transaction_ref),
            TargetKind::Service => Self::booking(transaction_ref),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TargetKind {
        match self {
            Self::Seller { .. } => TargetKind::Seller,
            Self::Service { .. } => TargetKind::Service,
        }
    }

    /// The order or booking id, whichever this target carries.
    #[must_use]
    pub fn transaction_ref(&self) -> &str {
        match self {
            Self::Seller { order_id } => order_id,
            Self::Service { booking_id } => booking_id,
        }
    }

    #[must_use]
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::Seller { order_id } => Some(order_id),
            Self::Service { .. } => None,
        }
    }

    #[must_use]
    pub fn booking_id(&self) -> Option<&str> {
        match self {
            Self::Seller { .. } => None,
            Self::Service { booking_id } => Some(booking_id),
        }
    }
}

impl fmt::Display for ReviewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seller { order_id } => write!(f, "order {order_id}"),
            Self::Service { booking_id } => write!(f, "booking {booking_id}"),
        }
    }
}

// ============================================================================
// Review
// ============================================================================

/// A persisted review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub reviewer_id: String,
    /// Seller the aggregate rolls up onto (the review's `target_id`).
    #[serde(rename = "target_id")]
    pub seller_id: String,
    pub target: ReviewTarget,
    pub rating: Rating,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    #[must_use]
    pub const fn target_type(&self) -> TargetKind {
        self.target.kind()
    }
}

/// Request to create a review, before validation.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub reviewer_id: String,
    pub seller_id: String,
    pub target: ReviewTarget,
    pub rating: i64,
    pub title: Option<String>,
    pub comment: Option<String>,
}

/// A create request that passed input validation.
#[derive(Debug, Clone)]
pub struct ReviewDraft {
    pub reviewer_id: String,
    pub seller_id: String,
    pub target: ReviewTarget,
    pub rating: Rating,
    pub title: Option<String>,
    pub comment: Option<String>,
}

impl NewReview {
    pub fn new(
        reviewer_id: impl Into<String>,
        seller_id: impl Into<String>,
        target: ReviewTarget,
        rating: i64,
    ) -> Self {
        Self {
            reviewer_id: reviewer_id.into(),
            seller_id: seller_id.into(),
            target,
            rating,
            title: None,
            comment: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Check the request shape: ids present, transaction reference present,
    /// rating in range. Blank title/comment collapse to `None`.
    pub fn validate(self) -> Result<ReviewDraft, ValidationError> {
        let reviewer_id = required("reviewer_id", &self.reviewer_id)?;
        let seller_id = required("target_id", &self.seller_id)?;
        let field = match self.target.kind() {
            TargetKind::Seller => "order_id",
            TargetKind::Service => "service_booking_id",
        };
        let transaction_ref = required(field, self.target.transaction_ref())?;
        let rating = Rating::new(self.rating).map_err(|e| ValidationError::new(e.to_string()))?;

        Ok(ReviewDraft {
            reviewer_id,
            seller_id,
            target: ReviewTarget::from_parts(self.target.kind(), transaction_ref),
            rating,
            title: normalize_text(self.title),
            comment: normalize_text(self.comment),
        })
    }
}

/// Partial update of a review. Only rating, title and comment are mutable.
///
/// `Some("")` for title or comment clears the field.
#[derive(Debug, Clone, Default)]
pub struct ReviewPatch {
    pub rating: Option<i64>,
    pub title: Option<String>,
    pub comment: Option<String>,
}

/// A validated patch, ready for the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewChanges {
    pub rating: Option<Rating>,
    pub title: Option<Option<String>>,
    pub comment: Option<Option<String>>,
}

impl ReviewPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rating.is_none() && self.title.is_none() && self.comment.is_none()
    }

    pub fn validate(self) -> Result<ReviewChanges, ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::new(
                "Nothing to update: provide rating, title or comment",
            ));
        }

        let rating = self
            .rating
            .map(Rating::new)
            .transpose()
            .map_err(|e| ValidationError::new(e.to_string()))?;

        Ok(ReviewChanges {
            rating,
            title: self.title.map(|t| normalize_text(Some(t))),
            comment: self.comment.map(|c| normalize_text(Some(c))),
        })
    }
}

impl ReviewChanges {
    /// Apply the changes to a review in place.
    pub fn apply(&self, review: &mut Review, now: DateTime<Utc>) {
        if let Some(rating) = self.rating {
            review.rating = rating;
        }
        if let Some(title) = &self.title {
            review.title.clone_from(title);
        }
        if let Some(comment) = &self.comment {
            review.comment.clone_from(comment);
        }
        review.updated_at = now;
    }
}

fn required(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Seller
// ============================================================================

/// Seller record with its derived aggregate fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub id: String,
    pub name: String,
    pub rating: f64,
    pub review_count: u32,
}
