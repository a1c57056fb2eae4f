//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tally_core::collaborators::{BookingStatus, OrderStatus};
use tally_core::model::{ReviewTarget, TargetKind};

use crate::output::OutputFormat;

pub mod commands;

/// Reviews and seller ratings for the EV marketplace
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Database path (default: $TALLY_DB or .tally/tally.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Act as this user (default: $TALLY_REVIEWER or $USER)
    #[arg(long = "as", global = true, value_name = "USER")]
    pub reviewer: Option<String>,

    /// How long to wait on a locked database, in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub busy_timeout_ms: Option<u64>,

    /// Read straight from the database, skipping the cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Output format after applying `--json`.
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format.unwrap_or_default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and its schema
    Init,

    /// Manage sellers and inspect their aggregates
    #[command(subcommand)]
    Sellers(SellersCommands),

    /// Record orders that grant seller-review eligibility
    #[command(subcommand)]
    Orders(OrdersCommands),

    /// Record service bookings that grant service-review eligibility
    #[command(subcommand)]
    Bookings(BookingsCommands),

    /// Create, list, update and delete reviews
    #[command(subcommand)]
    Reviews(ReviewsCommands),
}

// ============================================================================
// Sellers subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SellersCommands {
    /// Register a seller with no reviews
    Add {
        seller_id: String,

        #[arg(long)]
        name: String,
    },

    /// Show a seller with its rating and review count
    Show { seller_id: String },

    /// Check the stored aggregate against the reviews
    Verify { seller_id: String },
}

// ============================================================================
// Orders and bookings subcommands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum OrdersCommands {
    /// Record an order
    Add {
        order_id: String,

        /// Buyer who placed the order (default: acting user)
        #[arg(long)]
        owner: Option<String>,

        #[arg(long, value_enum, default_value_t = OrderStatus::Completed)]
        status: OrderStatus,

        /// Line item as LISTING:SELLER (repeatable)
        #[arg(long = "item", value_name = "LISTING:SELLER", required = true)]
        items: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum BookingsCommands {
    /// Record a service booking (test drive, inspection)
    Add {
        booking_id: String,

        /// Buyer who booked (default: acting user)
        #[arg(long)]
        owner: Option<String>,

        /// Seller providing the service
        #[arg(long)]
        seller: String,

        #[arg(long, value_enum, default_value_t = BookingStatus::Confirmed)]
        status: BookingStatus,

        /// Scheduled time, RFC 3339 (default: now)
        #[arg(long)]
        at: Option<String>,
    },
}

// ============================================================================
// Reviews subcommands
// ============================================================================

/// The order or booking a review is written through.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct TransactionArgs {
    /// Order for a seller review
    #[arg(long)]
    pub order: Option<String>,

    /// Service booking for a service review
    #[arg(long)]
    pub booking: Option<String>,
}

impl TransactionArgs {
    #[must_use]
    pub fn target(&self) -> Option<ReviewTarget> {
        match (&self.order, &self.booking) {
            (Some(order), None) => Some(ReviewTarget::order(order.as_str())),
            (None, Some(booking)) => Some(ReviewTarget::booking(booking.as_str())),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ReviewsCommands {
    /// Review a seller through a completed order or booking
    Create {
        /// Seller being reviewed
        #[arg(long)]
        seller: String,

        #[command(flatten)]
        transaction: TransactionArgs,

        /// Rating from 1 to 5
        #[arg(long, allow_negative_numbers = true)]
        rating: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Check whether the acting user may review, without writing
    Check {
        #[arg(long)]
        seller: String,

        #[command(flatten)]
        transaction: TransactionArgs,
    },

    /// List reviews of a seller, or by a reviewer
    List {
        /// Reviews of this seller
        #[arg(long, conflicts_with = "by")]
        seller: Option<String>,

        /// Which reviews of the seller to list
        #[arg(long, value_enum, default_value_t = TargetKind::Seller)]
        kind: TargetKind,

        /// Reviews written by this user (default: acting user)
        #[arg(long)]
        by: Option<String>,
    },

    /// Show a single review
    Show { review_id: String },

    /// Change rating, title or comment of your review
    Update {
        review_id: String,

        #[arg(long, allow_negative_numbers = true)]
        rating: Option<i64>,

        /// New title (empty string clears it)
        #[arg(long)]
        title: Option<String>,

        /// New comment (empty string clears it)
        #[arg(long)]
        comment: Option<String>,
    },

    /// Delete your review
    Delete { review_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_requires_exactly_one_transaction() {
        let parsed = Cli::try_parse_from([
            "tally", "reviews", "create", "--seller", "S", "--order", "O1", "--rating", "4",
        ])
        .unwrap();
        let Commands::Reviews(ReviewsCommands::Create { transaction, .. }) = parsed.command else {
            panic!("wrong command");
        };
        assert_eq!(transaction.target(), Some(ReviewTarget::order("O1")));

        assert!(Cli::try_parse_from([
            "tally", "reviews", "create", "--seller", "S", "--rating", "4",
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "tally", "reviews", "create", "--seller", "S", "--order", "O1", "--booking", "B1",
            "--rating", "4",
        ])
        .is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let parsed = Cli::try_parse_from([
            "tally", "reviews", "list", "--seller", "S", "--json", "--as", "buyer-b",
        ])
        .unwrap();
        assert_eq!(parsed.output_format(), OutputFormat::Json);
        assert_eq!(parsed.reviewer.as_deref(), Some("buyer-b"));
    }
}
