//! Shared helpers for CLI commands.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_core::cache::{MemoryCache, NoopCache, ReviewCache};
use tally_core::collaborators::LineItem;
use tally_core::core::{CoreResult, ServiceResponse, TallyServices};

use crate::config::Settings;
use crate::output::Formatter;

/// Open the database (creating schema if needed) with the configured cache.
pub fn open_services(settings: &Settings) -> Result<TallyServices> {
    let cache: Arc<dyn ReviewCache> = if settings.use_cache {
        Arc::new(MemoryCache::new())
    } else {
        Arc::new(NoopCache)
    };
    TallyServices::open(&settings.store, cache).with_context(|| {
        format!(
            "Failed to open review database at {}",
            settings.store.path.display()
        )
    })
}

/// Print a service result as a `{success, data?, error?}` envelope.
///
/// Failures are reported in the envelope and turned into a failing exit code
/// rather than an error, so callers always get a parseable result.
pub fn report<T: Serialize>(formatter: &Formatter, result: CoreResult<T>) -> Result<ExitCode> {
    respond(formatter, result, None)
}

/// [`report`] for list results; text output shows `empty_message` when
/// nothing matched.
pub fn report_list<T: Serialize>(
    formatter: &Formatter,
    result: CoreResult<Vec<T>>,
    empty_message: &str,
) -> Result<ExitCode> {
    respond(formatter, result, Some(empty_message))
}

fn respond<T: Serialize>(
    formatter: &Formatter,
    result: CoreResult<T>,
    empty_message: Option<&str>,
) -> Result<ExitCode> {
    if let Err(err) = &result {
        tracing::debug!(code = err.code().as_str(), error = %err, "operation failed");
    }
    let response = ServiceResponse::from_result(result);
    formatter.print_response(&response, empty_message)?;
    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Parse a `LISTING:SELLER` line item.
pub fn parse_line_item(raw: &str) -> Result<LineItem> {
    let Some((listing_id, seller_id)) = raw.split_once(':') else {
        bail!("Invalid line item '{raw}': expected LISTING:SELLER");
    };
    let (listing_id, seller_id) = (listing_id.trim(), seller_id.trim());
    if listing_id.is_empty() || seller_id.is_empty() {
        bail!("Invalid line item '{raw}': expected LISTING:SELLER");
    }
    Ok(LineItem {
        listing_id: listing_id.to_string(),
        seller_id: seller_id.to_string(),
    })
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp '{raw}': expected RFC 3339"))
}
