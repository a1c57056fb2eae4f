//! Interfaces to the marketplace records the review engine reads but does not own.
//!
//! Orders, service bookings and sellers are managed elsewhere in the
//! marketplace. The engine only needs to look them up; the seller aggregate
//! write is done by [`crate::aggregate::AggregateUpdater`] inside the review
//! transaction, never through these traits.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ParseEnumError, Seller};

/// Order lifecycle as seen by the review engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states that grant review eligibility.
    #[must_use]
    pub const fn is_reviewable(self) -> bool {
        matches!(self, Self::Confirmed | Self::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseEnumError {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// Service booking (test drive, inspection) lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_reviewable(self) -> bool {
        matches!(self, Self::Confirmed | Self::Completed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseEnumError {
                kind: "booking status",
                value: other.to_string(),
            }),
        }
    }
}

/// A listing purchased in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub listing_id: String,
    pub seller_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub owner_id: String,
    pub status: OrderStatus,
    pub line_items: Vec<LineItem>,
}

impl Order {
    /// Whether any line item is a listing sold by `seller_id`.
    #[must_use]
    pub fn sold_by(&self, seller_id: &str) -> bool {
        self.line_items.iter().any(|item| item.seller_id == seller_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBooking {
    pub id: String,
    pub owner_id: String,
    /// Seller providing the service.
    pub seller_id: String,
    pub status: BookingStatus,
    pub scheduled_at: DateTime<Utc>,
}

pub trait OrderLookup {
    fn find_order(&self, order_id: &str) -> Result<Option<Order>>;
}

pub trait BookingLookup {
    fn find_booking(&self, booking_id: &str) -> Result<Option<ServiceBooking>>;
}

pub trait SellerDirectory {
    fn find_seller(&self, seller_id: &str) -> Result<Option<Seller>>;
}
