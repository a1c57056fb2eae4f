//! Implementation of `tally sellers` subcommands.

use std::process::ExitCode;

use anyhow::Result;

use crate::cli::commands::helpers::{open_services, report};
use crate::config::Settings;
use crate::output::{Formatter, OutputFormat};

/// Register a seller and print it.
#[tracing::instrument(skip(settings, format))]
pub fn run_sellers_add(
    settings: &Settings,
    seller_id: &str,
    name: &str,
    format: OutputFormat,
) -> Result<ExitCode> {
    let services = open_services(settings)?;
    services.db().insert_seller(seller_id, name)?;
    report(&Formatter::new(format), services.sellers().get(seller_id))
}

#[tracing::instrument(skip(settings, format))]
pub fn run_sellers_show(settings: &Settings, seller_id: &str, format: OutputFormat) -> Result<ExitCode> {
    let services = open_services(settings)?;
    report(&Formatter::new(format), services.sellers().get(seller_id))
}

/// Compare stored and recomputed aggregates. Exits non-zero on drift.
#[tracing::instrument(skip(settings, format))]
pub fn run_sellers_verify(
    settings: &Settings,
    seller_id: &str,
    format: OutputFormat,
) -> Result<ExitCode> {
    let services = open_services(settings)?;
    let result = services.sellers().verify(seller_id);
    let drifted = result.as_ref().is_ok_and(|check| !check.consistent);

    let code = report(&Formatter::new(format), result)?;
    Ok(if drifted { ExitCode::FAILURE } else { code })
}
