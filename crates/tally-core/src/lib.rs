//! Review and aggregate-rating engine for the EV marketplace.
//!
//! This crate owns the review model, SQLite review storage, eligibility rules,
//! seller aggregate recomputation and the read-through cache in front of
//! review queries.

pub mod aggregate;
pub mod cache;
pub mod collaborators;
pub mod core;
pub mod eligibility;
pub mod ids;
pub mod model;
pub mod store;
