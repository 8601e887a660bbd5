use std::path::PathBuf;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{error, info};

use crate::config::ReportConfig;
use crate::deliver;
use crate::error::Result;
use crate::progress::{ProgressSender, ReportStatus};
use crate::render::{self, ReportFormat};
use crate::reports::{self, ReportType};
use crate::section;

/// One report invocation end to end: fetch, derive, assemble, render,
/// deliver. Stages run sequentially; any failure is reported exactly once
/// on the progress channel as a terminal error event, then returned.
pub async fn generate_report(
    pool: &PgPool,
    report_type: ReportType,
    format: ReportFormat,
    config: &ReportConfig,
    progress: &ProgressSender,
) -> Result<PathBuf> {
    match run(pool, report_type, format, config, progress).await {
        Ok(path) => {
            progress.completed();
            info!(report = %report_type, path = %path.display(), "report generated");
            Ok(path)
        }
        Err(err) => {
            error!(
                report = %report_type,
                category = err.category(),
                "report generation failed: {err}"
            );
            progress.error(err.user_message());
            Err(err)
        }
    }
}

async fn run(
    pool: &PgPool,
    report_type: ReportType,
    format: ReportFormat,
    config: &ReportConfig,
    progress: &ProgressSender,
) -> Result<PathBuf> {
    progress.send(ReportStatus::Pending, 0, "Queued");
    info!(report = %report_type, format = format.extension(), "starting report generation");

    let builder = reports::builder_for(report_type);
    let artifacts = builder.build(pool, config, progress).await?;

    let sections = section::validate_sections(artifacts.sections);
    let subtitle = format!(
        "Generated {} ({} records)",
        Utc::now().format("%Y-%m-%d %H:%M UTC"),
        artifacts.metrics.total_records
    );

    progress.update(80, "Rendering document");
    let document = render::render_document(
        format,
        report_type.title().to_string(),
        Some(subtitle),
        sections,
        artifacts.raw_rows,
        config.render_timeout,
    )
    .await?;

    let path = deliver::deliver(&config.out_dir, report_type.as_str(), &document)?;
    Ok(path)
}
