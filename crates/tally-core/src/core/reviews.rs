//! Review service: create, read, update and delete reviews.
//!
//! Every mutation runs as one unit: review write and seller recompute share a
//! single write transaction, and cache invalidation follows the commit. A
//! failure anywhere before the commit leaves the review set, the aggregate
//! and the cache exactly as they were.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::aggregate::{AggregateUpdater, SellerAggregate};
use crate::cache::{get_or_set, invalidate_review_keys, keys, ReviewCache};
use crate::collaborators::{BookingLookup, OrderLookup};
use crate::eligibility::{EligibilityValidator, Verdict};
use crate::ids::new_review_id;
use crate::model::{NewReview, Review, ReviewDraft, ReviewPatch, ReviewTarget, TargetKind};
use crate::store::{ReviewDb, ReviewStore, StoreError};

use super::{CoreError, CoreResult};

/// Service for review operations.
pub struct ReviewService<'a> {
    db: &'a ReviewDb,
    orders: &'a dyn OrderLookup,
    bookings: &'a dyn BookingLookup,
    cache: &'a dyn ReviewCache,
}

impl<'a> ReviewService<'a> {
    pub const fn new(
        db: &'a ReviewDb,
        orders: &'a dyn OrderLookup,
        bookings: &'a dyn BookingLookup,
        cache: &'a dyn ReviewCache,
    ) -> Self {
        Self {
            db,
            orders,
            bookings,
            cache,
        }
    }

    /// Create a review after validating input and eligibility.
    ///
    /// Returns the stored review. A second review for the same reviewer and
    /// transaction fails with [`CoreError::AlreadyReviewed`], whether caught by
    /// the eligibility check or by the store's unique constraint.
    pub fn create(&self, request: NewReview) -> CoreResult<Review> {
        self.create_at(request, Utc::now())
    }

    /// [`Self::create`] with an explicit clock, used for timestamps and the
    /// booking schedule check.
    #[tracing::instrument(
        skip(self, request),
        fields(reviewer_id = %request.reviewer_id, seller_id = %request.seller_id)
    )]
    pub fn create_at(&self, request: NewReview, now: DateTime<Utc>) -> CoreResult<Review> {
        let draft = request.validate()?;

        self.validator()
            .validate(&draft.reviewer_id, &draft.seller_id, &draft.target, now)?
            .into_result()?;

        self.insert(draft, now)
    }

    /// Write a review that passed the eligibility check and fold it into the
    /// seller aggregate.
    ///
    /// The unique index has the final say on duplicates: a review that raced
    /// past the check fails here with [`CoreError::AlreadyReviewed`] and
    /// nothing is written.
    fn insert(&self, draft: ReviewDraft, now: DateTime<Utc>) -> CoreResult<Review> {
        let review = Review {
            id: new_review_id()?,
            reviewer_id: draft.reviewer_id,
            seller_id: draft.seller_id,
            target: draft.target,
            rating: draft.rating,
            title: draft.title,
            comment: draft.comment,
            created_at: now,
            updated_at: now,
        };

        let tx = self.db.write_transaction()?;
        ReviewStore::new(&tx).create(&review)?;
        let aggregate = recompute(&tx, &review.seller_id)?;
        tx.commit().map_err(StoreError::from)?;

        invalidate_review_keys(self.cache, &review.seller_id, &review.reviewer_id);
        tracing::info!(
            review_id = %review.id,
            rating = aggregate.rating,
            review_count = aggregate.review_count,
            "review created"
        );
        Ok(review)
    }

    /// Get a single review, bypassing the cache.
    ///
    /// Returns `Err(CoreError::ReviewNotFound)` if the review does not exist.
    pub fn get(&self, review_id: &str) -> CoreResult<Review> {
        self.db
            .reviews()
            .find_by_id(review_id)?
            .ok_or_else(|| CoreError::ReviewNotFound {
                review_id: review_id.to_string(),
            })
    }

    /// Reviews of one kind for a seller, newest first. Served from cache when
    /// present.
    pub fn get_by_target(&self, seller_id: &str, kind: TargetKind) -> CoreResult<Vec<Review>> {
        get_or_set(self.cache, &keys::target(seller_id, kind), || {
            Ok(self.db.reviews().find_by_target(seller_id, kind)?)
        })
    }

    /// Reviews written by a reviewer, newest first. Served from cache when
    /// present.
    pub fn get_by_reviewer(&self, reviewer_id: &str) -> CoreResult<Vec<Review>> {
        get_or_set(self.cache, &keys::reviewer(reviewer_id), || {
            Ok(self.db.reviews().find_by_reviewer(reviewer_id)?)
        })
    }

    /// Change rating, title or comment of a review written by `reviewer_id`.
    ///
    /// A missing review or another reviewer is reported before the patch
    /// itself is looked at.
    #[tracing::instrument(skip(self, patch))]
    pub fn update(
        &self,
        review_id: &str,
        reviewer_id: &str,
        patch: ReviewPatch,
    ) -> CoreResult<Review> {
        let existing = self.get(review_id)?;
        if existing.reviewer_id != reviewer_id {
            return Err(CoreError::Forbidden {
                review_id: review_id.to_string(),
                reviewer_id: reviewer_id.to_string(),
            });
        }
        let changes = patch.validate()?;

        let tx = self.db.write_transaction()?;
        let review = ReviewStore::new(&tx).update(review_id, reviewer_id, &changes, Utc::now())?;
        let aggregate = recompute(&tx, &review.seller_id)?;
        tx.commit().map_err(StoreError::from)?;

        invalidate_review_keys(self.cache, &review.seller_id, &review.reviewer_id);
        tracing::info!(
            rating = aggregate.rating,
            review_count = aggregate.review_count,
            "review updated"
        );
        Ok(review)
    }

    /// Delete a review written by `reviewer_id`.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, review_id: &str, reviewer_id: &str) -> CoreResult<()> {
        let tx = self.db.write_transaction()?;
        let removed = ReviewStore::new(&tx).delete(review_id, reviewer_id)?;
        let aggregate = recompute(&tx, &removed.seller_id)?;
        tx.commit().map_err(StoreError::from)?;

        invalidate_review_keys(self.cache, &removed.seller_id, &removed.reviewer_id);
        tracing::info!(
            seller_id = %removed.seller_id,
            rating = aggregate.rating,
            review_count = aggregate.review_count,
            "review deleted"
        );
        Ok(())
    }

    /// Run the eligibility rules without writing anything.
    pub fn check_eligibility(
        &self,
        reviewer_id: &str,
        seller_id: &str,
        target: &ReviewTarget,
    ) -> CoreResult<Verdict> {
        Ok(self
            .validator()
            .validate(reviewer_id, seller_id, target, Utc::now())?)
    }

    fn validator(&self) -> EligibilityValidator<'_> {
        EligibilityValidator::new(self.orders, self.bookings, self.db.reviews())
    }
}

/// Recompute inside the caller's transaction. On failure the caller drops
/// the transaction, which rolls the review change back.
fn recompute(conn: &Connection, seller_id: &str) -> CoreResult<SellerAggregate> {
    AggregateUpdater::new(conn).recompute(seller_id).map_err(|source| {
        tracing::error!(seller_id, error = %source, "aggregate recompute failed, rolling back");
        CoreError::Recompute {
            seller_id: seller_id.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::collaborators::{LineItem, Order, OrderStatus, SellerDirectory};
    use crate::core::FailureCode;

    fn setup() -> (ReviewDb, MemoryCache) {
        let db = ReviewDb::open_in_memory().unwrap();
        db.init_schema().unwrap();
        db.insert_seller("S", "Volt Motors").unwrap();
        for (order, owner, seller) in [("O1", "B", "S"), ("O2", "C", "S"), ("O9", "B", "Z")] {
            db.insert_order(&Order {
                id: order.to_string(),
                owner_id: owner.to_string(),
                status: OrderStatus::Completed,
                line_items: vec![LineItem {
                    listing_id: format!("L-{order}"),
                    seller_id: seller.to_string(),
                }],
            })
            .unwrap();
        }
        (db, MemoryCache::new())
    }

    fn service<'a>(db: &'a ReviewDb, cache: &'a MemoryCache) -> ReviewService<'a> {
        ReviewService::new(db, db, db, cache)
    }

    fn seller_aggregate(db: &ReviewDb) -> (f64, u32) {
        let seller = db.find_seller("S").unwrap().unwrap();
        (seller.rating, seller.review_count)
    }

    #[test]
    fn test_create_recomputes_and_invalidates() {
        let (db, cache) = setup();
        let svc = service(&db, &cache);

        assert!(svc.get_by_target("S", TargetKind::Seller).unwrap().is_empty());
        assert!(svc.get_by_reviewer("B").unwrap().is_empty());
        assert_eq!(cache.len(), 2);

        let review = svc
            .create(NewReview::new("B", "S", ReviewTarget::order("O1"), 4).with_title("Great car"))
            .unwrap();
        assert!(cache.is_empty());
        assert_eq!(seller_aggregate(&db), (4.0, 1));

        let listed = svc.get_by_target("S", TargetKind::Seller).unwrap();
        assert_eq!(listed, vec![review.clone()]);
        assert_eq!(svc.get_by_reviewer("B").unwrap(), vec![review.clone()]);
        assert_eq!(svc.get(&review.id).unwrap(), review);
    }

    #[test]
    fn test_duplicate_create_is_conflict() {
        let (db, cache) = setup();
        let svc = service(&db, &cache);

        svc.create(NewReview::new("B", "S", ReviewTarget::order("O1"), 4))
            .unwrap();
        let err = svc
            .create(NewReview::new("B", "S", ReviewTarget::order("O1"), 1))
            .unwrap_err();
        assert_eq!(err.code(), FailureCode::DuplicateReview);
        assert_eq!(seller_aggregate(&db), (4.0, 1));
    }

    #[test]
    fn test_non_author_cannot_mutate() {
        let (db, cache) = setup();
        let svc = service(&db, &cache);
        let review = svc
            .create(NewReview::new("B", "S", ReviewTarget::order("O1"), 4))
            .unwrap();

        let patch = ReviewPatch {
            rating: Some(1),
            ..ReviewPatch::default()
        };
        let err = svc.update(&review.id, "C", patch).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden { .. }));
        let err = svc.delete(&review.id, "C").unwrap_err();
        assert!(matches!(err, CoreError::Forbidden { .. }));

        assert_eq!(svc.get(&review.id).unwrap(), review);
        assert_eq!(seller_aggregate(&db), (4.0, 1));
    }

    #[test]
    fn test_update_and_delete_keep_aggregate_in_step() {
        let (db, cache) = setup();
        let svc = service(&db, &cache);
        let first = svc
            .create(NewReview::new("B", "S", ReviewTarget::order("O1"), 4))
            .unwrap();
        svc.create(NewReview::new("C", "S", ReviewTarget::order("O2"), 5))
            .unwrap();
        assert_eq!(seller_aggregate(&db), (4.5, 2));

        let updated = svc
            .update(
                &first.id,
                "B",
                ReviewPatch {
                    rating: Some(2),
                    comment: Some("Charging port issue".to_string()),
                    ..ReviewPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.rating.get(), 2);
        assert_eq!(seller_aggregate(&db), (3.5, 2));

        svc.delete(&first.id, "B").unwrap();
        assert_eq!(seller_aggregate(&db), (5.0, 1));
        assert!(matches!(
            svc.get(&first.id).unwrap_err(),
            CoreError::ReviewNotFound { .. }
        ));
    }

    #[test]
    fn test_recompute_failure_rolls_back() {
        let (db, cache) = setup();
        let svc = service(&db, &cache);
        svc.get_by_reviewer("B").unwrap();

        // O9 is sold by Z, which has no seller row.
        let err = svc
            .create(NewReview::new("B", "Z", ReviewTarget::order("O9"), 3))
            .unwrap_err();
        assert!(matches!(err, CoreError::Recompute { .. }), "got {err:?}");
        assert_eq!(err.code(), FailureCode::InternalError);

        assert!(db.reviews().find_by_reviewer("B").unwrap().is_empty());
        // Cache untouched on failure.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalid_input_is_rejected_before_lookup() {
        let (db, cache) = setup();
        let svc = service(&db, &cache);

        let err = svc
            .create(NewReview::new("B", "S", ReviewTarget::order("O1"), 6))
            .unwrap_err();
        assert_eq!(err.code(), FailureCode::ValidationFailed);

        let err = svc
            .create(NewReview::new("B", "S", ReviewTarget::order("O_fake"), 5))
            .unwrap_err();
        assert!(matches!(err, CoreError::Ineligible(_)));
        assert_eq!(err.code(), FailureCode::ValidationFailed);

        let err = svc.update("rv-00000000", "B", ReviewPatch::default()).unwrap_err();
        assert_eq!(err.code(), FailureCode::NotFound);
    }

    #[test]
    fn test_update_checks_author_before_patch() {
        let (db, cache) = setup();
        let svc = service(&db, &cache);
        let review = svc
            .create(NewReview::new("B", "S", ReviewTarget::order("O1"), 4))
            .unwrap();

        let out_of_range = ReviewPatch {
            rating: Some(9),
            ..ReviewPatch::default()
        };
        let err = svc.update(&review.id, "C", out_of_range.clone()).unwrap_err();
        assert_eq!(err.code(), FailureCode::Forbidden);
        let err = svc.update(&review.id, "C", ReviewPatch::default()).unwrap_err();
        assert_eq!(err.code(), FailureCode::Forbidden);

        let err = svc.update(&review.id, "B", out_of_range).unwrap_err();
        assert_eq!(err.code(), FailureCode::ValidationFailed);
        let err = svc.update(&review.id, "B", ReviewPatch::default()).unwrap_err();
        assert_eq!(err.code(), FailureCode::ValidationFailed);
        assert_eq!(svc.get(&review.id).unwrap(), review);
    }

    #[test]
    fn test_unique_index_catches_review_that_passed_the_check() {
        let (db, cache) = setup();
        let svc = service(&db, &cache);
        let now = Utc::now();

        let draft = NewReview::new("B", "S", ReviewTarget::order("O1"), 1)
            .validate()
            .unwrap();
        let verdict = svc
            .check_eligibility("B", "S", &ReviewTarget::order("O1"))
            .unwrap();
        assert!(verdict.is_eligible());

        // A concurrent writer gets in between the check and the insert.
        svc.create(NewReview::new("B", "S", ReviewTarget::order("O1"), 4))
            .unwrap();
        svc.get_by_target("S", TargetKind::Seller).unwrap();

        let err = svc.insert(draft, now).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyReviewed { .. }), "got {err:?}");
        assert_eq!(err.code(), FailureCode::DuplicateReview);

        assert_eq!(seller_aggregate(&db), (4.0, 1));
        assert_eq!(db.reviews().find_by_reviewer("B").unwrap().len(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_check_eligibility_does_not_write() {
        let (db, cache) = setup();
        let svc = service(&db, &cache);

        let verdict = svc
            .check_eligibility("B", "S", &ReviewTarget::order("O1"))
            .unwrap();
        assert!(verdict.is_eligible());
        assert!(db.reviews().find_by_reviewer("B").unwrap().is_empty());
        assert_eq!(seller_aggregate(&db), (0.0, 0));
    }
}
