//! Seller reads and aggregate verification.

use crate::aggregate::{AggregateCheck, AggregateUpdater, RecomputeError};
use crate::cache::{get_or_set, keys, ReviewCache};
use crate::collaborators::SellerDirectory;
use crate::model::Seller;
use crate::store::ReviewDb;

use super::{CoreError, CoreResult};

/// Service for seller operations.
pub struct SellerService<'a> {
    db: &'a ReviewDb,
    sellers: &'a dyn SellerDirectory,
    cache: &'a dyn ReviewCache,
}

impl<'a> SellerService<'a> {
    pub const fn new(
        db: &'a ReviewDb,
        sellers: &'a dyn SellerDirectory,
        cache: &'a dyn ReviewCache,
    ) -> Self {
        Self { db, sellers, cache }
    }

    /// Seller record with its current aggregate. Served from cache when
    /// present; review writes drop the cached copy.
    pub fn get(&self, seller_id: &str) -> CoreResult<Seller> {
        get_or_set(self.cache, &keys::seller(seller_id), || {
            self.sellers
                .find_seller(seller_id)?
                .ok_or_else(|| CoreError::SellerNotFound {
                    seller_id: seller_id.to_string(),
                })
        })
    }

    /// Compare the stored aggregate with one recomputed from the reviews.
    /// Reads only; drift is reported, not repaired.
    pub fn verify(&self, seller_id: &str) -> CoreResult<AggregateCheck> {
        AggregateUpdater::new(self.db.conn())
            .verify(seller_id)
            .map_err(|err| match err {
                RecomputeError::SellerMissing { seller_id } => {
                    CoreError::SellerNotFound { seller_id }
                }
                other => CoreError::Internal(other.into()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    #[test]
    fn test_get_is_cached_until_invalidated() {
        let db = ReviewDb::open_in_memory().unwrap();
        db.init_schema().unwrap();
        db.insert_seller("S", "Volt Motors").unwrap();
        let cache = MemoryCache::new();
        let svc = SellerService::new(&db, &db, &cache);

        let seller = svc.get("S").unwrap();
        assert_eq!(seller.review_count, 0);
        assert!(cache.get(&keys::seller("S")).is_some());

        db.conn()
            .execute("UPDATE sellers SET name = 'Renamed' WHERE seller_id = 'S'", [])
            .unwrap();
        assert_eq!(svc.get("S").unwrap().name, "Volt Motors");

        cache.delete(&keys::seller("S"));
        assert_eq!(svc.get("S").unwrap().name, "Renamed");
    }

    #[test]
    fn test_missing_seller() {
        let db = ReviewDb::open_in_memory().unwrap();
        db.init_schema().unwrap();
        let cache = MemoryCache::new();
        let svc = SellerService::new(&db, &db, &cache);

        assert!(matches!(
            svc.get("ghost").unwrap_err(),
            CoreError::SellerNotFound { .. }
        ));
        assert!(cache.is_empty());
        assert!(matches!(
            svc.verify("ghost").unwrap_err(),
            CoreError::SellerNotFound { .. }
        ));
    }
}
