pub mod csv;
pub mod json;
pub mod pdf;

use std::time::Duration;

use clap::ValueEnum;
use serde_json::Value;
use tracing::debug;

use crate::error::{ReportError, Result};
use crate::section::ReportSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Pdf,
    Csv,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }
}

/// Rendered bytes plus the extension they should be delivered under.
/// Exists only until delivery writes it out.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// Renders the report under a hard timeout. PDF consumes the validated
/// sections; CSV and JSON serialize the raw fetched rows directly. A
/// zero-byte result is a generation failure, never a valid empty report.
pub async fn render_document(
    format: ReportFormat,
    title: String,
    subtitle: Option<String>,
    sections: Vec<ReportSection>,
    raw_rows: Vec<Value>,
    timeout: Duration,
) -> Result<RenderedDocument> {
    let extension = format.extension();
    let handle = tokio::task::spawn_blocking(move || match format {
        ReportFormat::Pdf => pdf::render(&title, subtitle.as_deref(), &sections),
        ReportFormat::Csv => csv::render(&raw_rows),
        ReportFormat::Json => json::render(&raw_rows),
    });

    let bytes = match tokio::time::timeout(timeout, handle).await {
        Ok(joined) => joined.map_err(|err| ReportError::Unknown(err.to_string()))??,
        Err(_) => return Err(ReportError::Timeout(timeout.as_secs())),
    };

    if bytes.is_empty() {
        return Err(ReportError::Generation(
            "rendered document was empty".to_string(),
        ));
    }
    debug!(extension, bytes = bytes.len(), "document rendered");
    Ok(RenderedDocument { bytes, extension })
}
