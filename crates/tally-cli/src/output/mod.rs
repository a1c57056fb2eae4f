//! Output formatting for tally.
//!
//! JSON prints the full `{success, data?, error?}` envelope. Text and pretty
//! print only the payload, or a single `error[code]: message` line.

use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tally_core::core::ServiceResponse;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Machine-readable envelope
    Json,
    /// One record per line
    #[default]
    Text,
    /// Indented, one field per line
    Pretty,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render any serializable value in the configured format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        Ok(match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&value)?,
            OutputFormat::Text => text_line(&value),
            OutputFormat::Pretty => pretty_block(&value, 0),
        })
    }

    /// Render a service response. `empty_message` replaces an empty list
    /// payload in text and pretty output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn render_response<T: Serialize>(
        &self,
        response: &ServiceResponse<T>,
        empty_message: Option<&str>,
    ) -> Result<String> {
        if self.format == OutputFormat::Json {
            return self.render(response);
        }
        if let Some(failure) = &response.error {
            return Ok(format!("error[{}]: {}", failure.code.as_str(), failure.message));
        }

        let data = serde_json::to_value(&response.data)?;
        if let (Some(message), Some([])) = (empty_message, data.as_array().map(Vec::as_slice)) {
            return Ok(message.to_string());
        }
        self.render(&data)
    }

    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print<T: Serialize>(&self, data: &T) -> Result<()> {
        write_stdout(&self.render(data)?)
    }

    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print_response<T: Serialize>(
        &self,
        response: &ServiceResponse<T>,
        empty_message: Option<&str>,
    ) -> Result<()> {
        write_stdout(&self.render_response(response, empty_message)?)
    }
}

fn write_stdout(output: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{output}")?;
    Ok(())
}

/// Keys printed bare at the start of a text line.
const LEAD_KEYS: [&str; 3] = ["id", "review_id", "seller_id"];

/// One line per record: lead ids, then `key:value` pairs, blanks skipped.
fn text_line(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(text_line).collect::<Vec<_>>().join("\n"),
        Value::Object(map) => {
            let lead = LEAD_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .map(scalar);
            let rest = map
                .iter()
                .filter(|(key, val)| !LEAD_KEYS.contains(&key.as_str()) && !is_blank(val))
                .map(|(key, val)| format!("{key}:{}", scalar(val)));
            lead.chain(rest).collect::<Vec<_>>().join("  ")
        }
        other => scalar(other),
    }
}

fn is_blank(value: &Value) -> bool {
    value.is_null() || value.as_array().is_some_and(Vec::is_empty)
}

/// Inline rendering; strings with whitespace are quoted.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) if s.contains(char::is_whitespace) => format!("{s:?}"),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            format!("[{}]", items.iter().map(scalar).collect::<Vec<_>>().join(","))
        }
        Value::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .filter(|(_, val)| !val.is_null())
                .map(|(key, val)| format!("{key}:{}", scalar(val)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        other => other.to_string(),
    }
}

fn pretty_block(value: &Value, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(_, val)| !val.is_null())
            .map(|(key, val)| {
                if val.is_object() || val.as_array().is_some_and(|items| !items.is_empty()) {
                    format!("{indent}{key}:\n{}", pretty_block(val, depth + 1))
                } else {
                    format!("{indent}{key}: {}", scalar(val))
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Array(items) => items
            .iter()
            .map(|item| pretty_block(item, depth))
            .collect::<Vec<_>>()
            .join(&format!("\n{indent}--\n")),
        other => format!("{indent}{}", scalar(other)),
    }
}
