//! Document inspection tool.
//!
//! Reads an encoded document and prints a JSON report: format version, node
//! counts, addresses, dangling pointers, duplicate ids, nesting depth, class
//! histogram and canonical hash. Exits non-zero if the document cannot be
//! read or is not consistent.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! Logs go to stderr; the report goes to stdout.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin toastpoint_inspect -- scene.json
//! ```

use std::process::ExitCode;

use serde_json::{json, Value as Json};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use toastpoint::{canonical_hash_hex, inspect_document, CodecError};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn run(path: &str) -> Result<bool, CodecError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CodecError::invalid(format!("cannot read {path}: {e}")))?;
    let doc: Json = serde_json::from_str(&text)?;
    let report = inspect_document(&doc)?;

    info!(
        path,
        format_version = report.format_version,
        addresses = report.ids.len(),
        pointers = report.nodes.pointers,
        "document inspected"
    );
    if !report.dangling_pointers.is_empty() {
        warn!(dangling = ?report.dangling_pointers, "document has dangling pointers");
    }
    if !report.duplicate_ids.is_empty() {
        warn!(duplicates = ?report.duplicate_ids, "document has duplicate ids");
    }

    let consistent = report.is_consistent();
    let output = json!({
        "path": path,
        "canonical_hash": canonical_hash_hex(&doc),
        "report": report,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(consistent)
}

fn main() -> ExitCode {
    init_tracing();

    let Some(path) = std::env::args().nth(1) else {
        error!("usage: toastpoint_inspect <document.json>");
        return ExitCode::from(2);
    };

    match run(&path) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, path = %path, "inspection failed");
            ExitCode::FAILURE
        }
    }
}
