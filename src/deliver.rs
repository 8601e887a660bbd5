use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::{ReportError, Result};
use crate::render::RenderedDocument;

/// `{type}_report_{yyyy-MM-dd_HH-mm}.{ext}`. Minute resolution only, so
/// two runs inside the same minute collide; content for unchanged data is
/// identical either way.
pub fn report_filename(report_type: &str, extension: &str, at: DateTime<Local>) -> String {
    format!(
        "{}_report_{}.{}",
        report_type,
        at.format("%Y-%m-%d_%H-%M"),
        extension
    )
}

/// Writes the rendered document into the output directory. A zero-byte
/// document is never written.
pub fn deliver(out_dir: &Path, report_type: &str, document: &RenderedDocument) -> Result<PathBuf> {
    if document.bytes.is_empty() {
        return Err(ReportError::Generation(
            "refusing to deliver an empty report file".to_string(),
        ));
    }
    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(report_filename(
        report_type,
        document.extension,
        Local::now(),
    ));
    fs::write(&path, &document.bytes)?;
    info!(path = %path.display(), bytes = document.bytes.len(), "report delivered");
    Ok(path)
}
