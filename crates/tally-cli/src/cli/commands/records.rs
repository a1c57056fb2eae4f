//! Implementation of `tally orders` and `tally bookings` subcommands.
//!
//! These seed the marketplace records that grant review eligibility.

use std::process::ExitCode;

use anyhow::Result;
use chrono::Utc;
use tally_core::collaborators::{BookingStatus, Order, OrderStatus, ServiceBooking};

use crate::cli::commands::helpers::{open_services, parse_line_item, parse_timestamp};
use crate::config::Settings;
use crate::output::{Formatter, OutputFormat};

/// Record an order with its line items.
#[tracing::instrument(skip(settings, items, format))]
pub fn run_orders_add(
    settings: &Settings,
    order_id: &str,
    owner: Option<&str>,
    status: OrderStatus,
    items: &[String],
    format: OutputFormat,
) -> Result<ExitCode> {
    let owner_id = match owner {
        Some(owner) => owner.to_string(),
        None => settings.require_reviewer()?.to_string(),
    };
    let line_items = items
        .iter()
        .map(|raw| parse_line_item(raw))
        .collect::<Result<Vec<_>>>()?;

    let order = Order {
        id: order_id.to_string(),
        owner_id,
        status,
        line_items,
    };

    let services = open_services(settings)?;
    services.db().insert_order(&order)?;

    Formatter::new(format).print(&order)?;
    Ok(ExitCode::SUCCESS)
}

/// Record a service booking.
#[tracing::instrument(skip(settings, format))]
pub fn run_bookings_add(
    settings: &Settings,
    booking_id: &str,
    owner: Option<&str>,
    seller_id: &str,
    status: BookingStatus,
    at: Option<&str>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let owner_id = match owner {
        Some(owner) => owner.to_string(),
        None => settings.require_reviewer()?.to_string(),
    };
    let scheduled_at = match at {
        Some(raw) => parse_timestamp(raw)?,
        None => Utc::now(),
    };

    let booking = ServiceBooking {
        id: booking_id.to_string(),
        owner_id,
        seller_id: seller_id.to_string(),
        status,
        scheduled_at,
    };

    let services = open_services(settings)?;
    services.db().insert_booking(&booking)?;

    Formatter::new(format).print(&booking)?;
    Ok(ExitCode::SUCCESS)
}
