//! Implementation of `tally init`.

use std::process::ExitCode;

use anyhow::Result;

use crate::cli::commands::helpers::open_services;
use crate::config::Settings;
use crate::output::{Formatter, OutputFormat};

/// Create the database file and schema. Safe to run more than once.
#[tracing::instrument(skip_all)]
pub fn run_init(settings: &Settings, format: OutputFormat) -> Result<ExitCode> {
    open_services(settings)?;

    let output = serde_json::json!({
        "db": settings.store.path.display().to_string(),
        "initialized": true,
    });
    Formatter::new(format).print(&output)?;
    Ok(ExitCode::SUCCESS)
}
