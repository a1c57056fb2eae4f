//! Seller, order and booking records kept next to the reviews.
//!
//! These back the collaborator traits so a single database serves the whole
//! engine. Inserts exist for seeding; the engine itself only reads them.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::collaborators::{
    BookingLookup, BookingStatus, LineItem, Order, OrderLookup, OrderStatus, SellerDirectory,
    ServiceBooking,
};
use crate::model::Seller;

use super::{conversion_error, format_ts, parse_ts, ReviewDb};

impl ReviewDb {
    /// Register a seller with an empty aggregate.
    pub fn insert_seller(&self, seller_id: &str, name: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sellers (seller_id, name, rating, review_count, created_at)
                 VALUES (?, ?, 0, 0, ?)",
                params![seller_id, name, format_ts(&Utc::now())],
            )
            .with_context(|| format!("Failed to insert seller {seller_id}"))?;
        Ok(())
    }

    /// Insert an order together with its line items.
    pub fn insert_order(&self, order: &Order) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        tx.execute(
            "INSERT INTO orders (order_id, owner_id, status, created_at) VALUES (?, ?, ?, ?)",
            params![
                order.id,
                order.owner_id,
                order.status.as_str(),
                format_ts(&Utc::now())
            ],
        )
        .with_context(|| format!("Failed to insert order {}", order.id))?;

        for item in &order.line_items {
            tx.execute(
                "INSERT INTO order_items (order_id, listing_id, seller_id) VALUES (?, ?, ?)",
                params![order.id, item.listing_id, item.seller_id],
            )
            .with_context(|| format!("Failed to insert line item {}", item.listing_id))?;
        }

        tx.commit().context("Failed to commit order")?;
        Ok(())
    }

    pub fn insert_booking(&self, booking: &ServiceBooking) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO service_bookings (booking_id, owner_id, seller_id, status, scheduled_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    booking.id,
                    booking.owner_id,
                    booking.seller_id,
                    booking.status.as_str(),
                    format_ts(&booking.scheduled_at),
                ],
            )
            .with_context(|| format!("Failed to insert booking {}", booking.id))?;
        Ok(())
    }
}

impl OrderLookup for ReviewDb {
    fn find_order(&self, order_id: &str) -> Result<Option<Order>> {
        let header: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT owner_id, status FROM orders WHERE order_id = ?",
                [order_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to query orders")?;

        let Some((owner_id, status)) = header else {
            return Ok(None);
        };
        let status: OrderStatus = status.parse()?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT listing_id, seller_id FROM order_items
                 WHERE order_id = ? ORDER BY listing_id",
            )
            .context("Failed to prepare order_items query")?;
        let line_items = stmt
            .query_map([order_id], |row| {
                Ok(LineItem {
                    listing_id: row.get(0)?,
                    seller_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read order_items")?;

        Ok(Some(Order {
            id: order_id.to_string(),
            owner_id,
            status,
            line_items,
        }))
    }
}

impl BookingLookup for ReviewDb {
    fn find_booking(&self, booking_id: &str) -> Result<Option<ServiceBooking>> {
        let booking = self
            .conn
            .query_row(
                "SELECT booking_id, owner_id, seller_id, status, scheduled_at
                 FROM service_bookings WHERE booking_id = ?",
                [booking_id],
                |row| {
                    let status: String = row.get(3)?;
                    let scheduled_at: String = row.get(4)?;
                    Ok(ServiceBooking {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        seller_id: row.get(2)?,
                        status: status
                            .parse::<BookingStatus>()
                            .map_err(|e| conversion_error(3, e.to_string()))?,
                        scheduled_at: parse_ts(4, &scheduled_at)?,
                    })
                },
            )
            .optional()
            .context("Failed to query service_bookings")?;
        Ok(booking)
    }
}

impl SellerDirectory for ReviewDb {
    fn find_seller(&self, seller_id: &str) -> Result<Option<Seller>> {
        let seller = self
            .conn
            .query_row(
                "SELECT seller_id, name, rating, review_count FROM sellers WHERE seller_id = ?",
                [seller_id],
                |row| {
                    Ok(Seller {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        rating: row.get(2)?,
                        review_count: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("Failed to query sellers")?;
        Ok(seller)
    }
}
