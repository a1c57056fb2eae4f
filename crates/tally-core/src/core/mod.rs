//! Service layer for tally-core.
//!
//! Provides typed, high-level APIs for review and seller operations. The
//! service layer owns the database handle and the injected cache, and keeps
//! review writes, aggregate recomputation and cache invalidation in step.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally_core::cache::MemoryCache;
//! use tally_core::core::TallyServices;
//! use tally_core::model::TargetKind;
//! use tally_core::store::StoreConfig;
//!
//! let services = TallyServices::open(
//!     &StoreConfig::new("/srv/tally/tally.db"),
//!     Arc::new(MemoryCache::new()),
//! ).unwrap();
//!
//! let reviews = services.reviews().get_by_target("seller-1", TargetKind::Seller).unwrap();
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod errors;
pub mod response;
pub mod reviews;
pub mod sellers;

pub use errors::{CoreError, CoreResult, FailureCode};
pub use response::{Failure, ServiceResponse};

use std::sync::Arc;

use crate::cache::ReviewCache;
use crate::store::{ReviewDb, StoreConfig};

/// Facade providing all tally service APIs.
///
/// Owns one database connection and a shared cache. Open one per thread or
/// request; clones of the cache `Arc` let several facades share one cache.
pub struct TallyServices {
    db: ReviewDb,
    cache: Arc<dyn ReviewCache>,
}

impl TallyServices {
    /// Wrap an already opened database.
    pub const fn new(db: ReviewDb, cache: Arc<dyn ReviewCache>) -> Self {
        Self { db, cache }
    }

    /// Open the database, initialize its schema, and wrap it.
    pub fn open(config: &StoreConfig, cache: Arc<dyn ReviewCache>) -> CoreResult<Self> {
        let db = ReviewDb::open_with(config)?;
        db.init_schema()?;
        Ok(Self::new(db, cache))
    }

    /// Access review operations.
    #[must_use]
    pub fn reviews(&self) -> reviews::ReviewService<'_> {
        reviews::ReviewService::new(&self.db, &self.db, &self.db, self.cache.as_ref())
    }

    /// Access seller operations.
    #[must_use]
    pub fn sellers(&self) -> sellers::SellerService<'_> {
        sellers::SellerService::new(&self.db, &self.db, self.cache.as_ref())
    }

    /// Get a reference to the underlying database.
    ///
    /// Used for seeding collaborator records and for queries not covered by
    /// the service layer.
    #[must_use]
    pub const fn db(&self) -> &ReviewDb {
        &self.db
    }

    #[must_use]
    pub fn cache(&self) -> &dyn ReviewCache {
        self.cache.as_ref()
    }
}
