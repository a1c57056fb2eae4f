//! Implementation of `tally reviews` subcommands.

use std::process::ExitCode;

use anyhow::Result;
use tally_core::core::CoreResult;
use tally_core::eligibility::Verdict;
use tally_core::model::{NewReview, ReviewPatch, ReviewTarget, TargetKind};

use crate::cli::commands::helpers::{open_services, report, report_list};
use crate::config::Settings;
use crate::output::{Formatter, OutputFormat};

/// Create a review as the acting user.
#[tracing::instrument(skip(settings, request, format), fields(seller_id = %request.seller_id))]
pub fn run_reviews_create(
    settings: &Settings,
    request: NewReview,
    format: OutputFormat,
) -> Result<ExitCode> {
    let services = open_services(settings)?;
    report(&Formatter::new(format), services.reviews().create(request))
}

/// Report whether `reviewer_id` may review `seller_id` through `target`.
#[tracing::instrument(skip(settings, format))]
pub fn run_reviews_check(
    settings: &Settings,
    reviewer_id: &str,
    seller_id: &str,
    target: &ReviewTarget,
    format: OutputFormat,
) -> Result<ExitCode> {
    let services = open_services(settings)?;
    let result: CoreResult<_> = services
        .reviews()
        .check_eligibility(reviewer_id, seller_id, target)
        .map(|verdict| match verdict {
            Verdict::Eligible => serde_json::json!({ "eligible": true }),
            Verdict::Rejected(rejection) => serde_json::json!({
                "eligible": false,
                "message": rejection.to_string(),
                "rejection": rejection,
            }),
        });
    report(&Formatter::new(format), result)
}

/// List one kind of review for a seller.
#[tracing::instrument(skip(settings, format))]
pub fn run_reviews_list_for_seller(
    settings: &Settings,
    seller_id: &str,
    kind: TargetKind,
    format: OutputFormat,
) -> Result<ExitCode> {
    let services = open_services(settings)?;
    report_list(
        &Formatter::new(format),
        services.reviews().get_by_target(seller_id, kind),
        &format!("No {kind} reviews for {seller_id}"),
    )
}

/// List reviews written by a reviewer.
#[tracing::instrument(skip(settings, format))]
pub fn run_reviews_list_by_reviewer(
    settings: &Settings,
    reviewer_id: &str,
    format: OutputFormat,
) -> Result<ExitCode> {
    let services = open_services(settings)?;
    report_list(
        &Formatter::new(format),
        services.reviews().get_by_reviewer(reviewer_id),
        &format!("No reviews by {reviewer_id}"),
    )
}

#[tracing::instrument(skip(settings, format))]
pub fn run_reviews_show(settings: &Settings, review_id: &str, format: OutputFormat) -> Result<ExitCode> {
    let services = open_services(settings)?;
    report(&Formatter::new(format), services.reviews().get(review_id))
}

/// Update the acting user's review.
#[tracing::instrument(skip(settings, patch, format))]
pub fn run_reviews_update(
    settings: &Settings,
    review_id: &str,
    reviewer_id: &str,
    patch: ReviewPatch,
    format: OutputFormat,
) -> Result<ExitCode> {
    let services = open_services(settings)?;
    report(
        &Formatter::new(format),
        services.reviews().update(review_id, reviewer_id, patch),
    )
}

/// Delete the acting user's review.
#[tracing::instrument(skip(settings, format))]
pub fn run_reviews_delete(
    settings: &Settings,
    review_id: &str,
    reviewer_id: &str,
    format: OutputFormat,
) -> Result<ExitCode> {
    let services = open_services(settings)?;
    let result = services
        .reviews()
        .delete(review_id, reviewer_id)
        .map(|()| serde_json::json!({ "review_id": review_id, "deleted": true }));
    report(&Formatter::new(format), result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::init::run_init;
    use crate::cli::commands::records::run_orders_add;
    use crate::cli::commands::sellers::{run_sellers_add, run_sellers_verify};
    use crate::config::Overrides;
    use tally_core::collaborators::OrderStatus;
    use tempfile::TempDir;

    const FMT: OutputFormat = OutputFormat::Json;

    fn settings(dir: &TempDir, reviewer: &str) -> Settings {
        let db = dir.path().join("tally.db");
        Settings::resolve_with(
            &Overrides {
                db: Some(&db),
                reviewer: Some(reviewer),
                ..Overrides::default()
            },
            |_| None,
        )
    }

    fn review_ids(dir: &TempDir) -> Vec<String> {
        let conn = rusqlite::Connection::open(dir.path().join("tally.db")).unwrap();
        let mut stmt = conn
            .prepare("SELECT review_id FROM reviews ORDER BY review_id")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn test_review_commands_end_to_end() {
        let dir = TempDir::new().unwrap();
        let buyer = settings(&dir, "B");
        let other = settings(&dir, "C");

        assert_eq!(run_init(&buyer, FMT).unwrap(), ExitCode::SUCCESS);
        assert_eq!(
            run_sellers_add(&buyer, "S", "Volt Motors", FMT).unwrap(),
            ExitCode::SUCCESS
        );
        assert_eq!(
            run_orders_add(
                &buyer,
                "O1",
                None,
                OrderStatus::Completed,
                &["L1:S".to_string()],
                FMT
            )
            .unwrap(),
            ExitCode::SUCCESS
        );

        let target = ReviewTarget::order("O1");
        assert_eq!(
            run_reviews_check(&buyer, "B", "S", &target, FMT).unwrap(),
            ExitCode::SUCCESS
        );

        let request = NewReview::new("B", "S", target.clone(), 4);
        assert_eq!(
            run_reviews_create(&buyer, request.clone(), FMT).unwrap(),
            ExitCode::SUCCESS
        );
        assert_eq!(
            run_reviews_create(&buyer, request, FMT).unwrap(),
            ExitCode::FAILURE
        );

        let ids = review_ids(&dir);
        assert_eq!(ids.len(), 1);

        assert_eq!(
            run_reviews_delete(&other, &ids[0], "C", FMT).unwrap(),
            ExitCode::FAILURE
        );
        assert_eq!(
            run_reviews_update(
                &buyer,
                &ids[0],
                "B",
                ReviewPatch {
                    rating: Some(5),
                    ..ReviewPatch::default()
                },
                FMT
            )
            .unwrap(),
            ExitCode::SUCCESS
        );
        assert_eq!(run_sellers_verify(&buyer, "S", FMT).unwrap(), ExitCode::SUCCESS);

        assert_eq!(
            run_reviews_delete(&buyer, &ids[0], "B", FMT).unwrap(),
            ExitCode::SUCCESS
        );
        assert!(review_ids(&dir).is_empty());
        assert_eq!(
            run_reviews_show(&buyer, &ids[0], FMT).unwrap(),
            ExitCode::FAILURE
        );
    }

    #[test]
    fn test_list_commands_on_empty_database() {
        let dir = TempDir::new().unwrap();
        let buyer = settings(&dir, "B");

        assert_eq!(
            run_reviews_list_for_seller(&buyer, "S", TargetKind::Service, FMT).unwrap(),
            ExitCode::SUCCESS
        );
        assert_eq!(
            run_reviews_list_by_reviewer(&buyer, "B", OutputFormat::Text).unwrap(),
            ExitCode::SUCCESS
        );
    }

    #[test]
    fn test_list_failure_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let buyer = settings(&dir, "B");
        assert_eq!(run_init(&buyer, FMT).unwrap(), ExitCode::SUCCESS);

        // A row whose timestamp cannot be read back fails the query.
        let conn = rusqlite::Connection::open(dir.path().join("tally.db")).unwrap();
        conn.execute(
            "INSERT INTO reviews (review_id, reviewer_id, seller_id, target_type, order_id,
                rating, created_at, updated_at)
             VALUES ('rv-broken', 'B', 'S', 'seller', 'O1', 4, 'garbage', 'garbage')",
            [],
        )
        .unwrap();
        drop(conn);

        assert_eq!(
            run_reviews_list_by_reviewer(&buyer, "B", FMT).unwrap(),
            ExitCode::FAILURE
        );
        assert_eq!(
            run_reviews_list_for_seller(&buyer, "S", TargetKind::Seller, OutputFormat::Text)
                .unwrap(),
            ExitCode::FAILURE
        );
    }
}
