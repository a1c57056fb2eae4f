//! tally - review and seller rating engine for the EV marketplace

mod cli;
mod config;
mod output;

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tally_core::model::{NewReview, ReviewPatch};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::commands::{
    run_bookings_add, run_init, run_orders_add, run_reviews_check, run_reviews_create,
    run_reviews_delete, run_reviews_list_by_reviewer, run_reviews_list_for_seller,
    run_reviews_show, run_reviews_update, run_sellers_add, run_sellers_show, run_sellers_verify,
};
use cli::{
    BookingsCommands, Cli, Commands, OrdersCommands, ReviewsCommands, SellersCommands,
};
use config::{Overrides, Settings};

/// Install the stderr subscriber. `RUST_LOG` overrides the default `warn`.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(io::stderr)).init();
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let format = cli.output_format();
    let settings = Settings::resolve(&Overrides {
        db: cli.db.as_deref(),
        reviewer: cli.reviewer.as_deref(),
        busy_timeout_ms: cli.busy_timeout_ms,
        no_cache: cli.no_cache,
    });
    tracing::debug!(db = %settings.store.path.display(), cache = settings.use_cache, "resolved settings");

    match cli.command {
        Commands::Init => run_init(&settings, format),

        Commands::Sellers(cmd) => match cmd {
            SellersCommands::Add { seller_id, name } => {
                run_sellers_add(&settings, &seller_id, &name, format)
            }
            SellersCommands::Show { seller_id } => run_sellers_show(&settings, &seller_id, format),
            SellersCommands::Verify { seller_id } => {
                run_sellers_verify(&settings, &seller_id, format)
            }
        },

        Commands::Orders(OrdersCommands::Add {
            order_id,
            owner,
            status,
            items,
        }) => run_orders_add(&settings, &order_id, owner.as_deref(), status, &items, format),

        Commands::Bookings(BookingsCommands::Add {
            booking_id,
            owner,
            seller,
            status,
            at,
        }) => run_bookings_add(
            &settings,
            &booking_id,
            owner.as_deref(),
            &seller,
            status,
            at.as_deref(),
            format,
        ),

        Commands::Reviews(cmd) => match cmd {
            ReviewsCommands::Create {
                seller,
                transaction,
                rating,
                title,
                comment,
            } => {
                let reviewer = settings.require_reviewer()?;
                let target = transaction
                    .target()
                    .context("Exactly one of --order or --booking is required")?;
                let request = NewReview {
                    title,
                    comment,
                    ..NewReview::new(reviewer, seller, target, rating)
                };
                run_reviews_create(&settings, request, format)
            }
            ReviewsCommands::Check {
                seller,
                transaction,
            } => {
                let reviewer = settings.require_reviewer()?;
                let target = transaction
                    .target()
                    .context("Exactly one of --order or --booking is required")?;
                run_reviews_check(&settings, reviewer, &seller, &target, format)
            }
            ReviewsCommands::List { seller, kind, by } => match seller {
                Some(seller) => run_reviews_list_for_seller(&settings, &seller, kind, format),
                None => {
                    let reviewer = match by.as_deref() {
                        Some(by) => by,
                        None => settings.require_reviewer()?,
                    };
                    run_reviews_list_by_reviewer(&settings, reviewer, format)
                }
            },
            ReviewsCommands::Show { review_id } => run_reviews_show(&settings, &review_id, format),
            ReviewsCommands::Update {
                review_id,
                rating,
                title,
                comment,
            } => {
                let reviewer = settings.require_reviewer()?;
                let patch = ReviewPatch {
                    rating,
                    title,
                    comment,
                };
                run_reviews_update(&settings, &review_id, reviewer, patch, format)
            }
            ReviewsCommands::Delete { review_id } => {
                let reviewer = settings.require_reviewer()?;
                run_reviews_delete(&settings, &review_id, reviewer, format)
            }
        },
    }
}
