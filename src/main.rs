use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod deliver;
mod error;
mod metrics;
mod models;
mod pipeline;
mod progress;
mod render;
mod reports;
mod retry;
mod section;

use config::ReportConfig;
use progress::{ProgressBoard, ProgressSender, ReportProgress};
use render::ReportFormat;
use reports::ReportType;

#[derive(Parser)]
#[command(name = "facility-reports")]
#[command(about = "Report generator for the facilities management database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one report
    Generate {
        #[arg(long, value_enum)]
        report: ReportType,
        /// Defaults to PDF (JSON for the database export)
        #[arg(long, value_enum)]
        format: Option<ReportFormat>,
        #[arg(long, default_value = "reports")]
        out_dir: PathBuf,
        /// Row cap for the underlying queries
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Generate every report type concurrently
    GenerateAll {
        #[arg(long, value_enum)]
        format: Option<ReportFormat>,
        #[arg(long, default_value = "reports")]
        out_dir: PathBuf,
    },
    /// List the available report types
    ListTypes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::ListTypes = &cli.command {
        for report_type in ReportType::ALL {
            println!(
                "{:<10} {} (default: {})",
                report_type.as_str(),
                report_type.title(),
                report_type.default_format().extension()
            );
        }
        return Ok(());
    }

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the facilities Postgres instance")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::Generate {
            report,
            format,
            out_dir,
            limit,
        } => {
            let mut config = ReportConfig::from_env();
            config.out_dir = out_dir;
            if let Some(limit) = limit {
                config.row_cap = limit.max(1);
            }
            let format = format.unwrap_or_else(|| report.default_format());

            let (tx, rx) = mpsc::unbounded_channel();
            let drain = spawn_drain(rx);
            let progress = ProgressSender::new(report, tx);
            let result = pipeline::generate_report(&pool, report, format, &config, &progress).await;
            drop(progress);
            drain.await.ok();

            let path = result?;
            println!("Report written to {}.", path.display());
        }
        Commands::GenerateAll { format, out_dir } => {
            let mut config = ReportConfig::from_env();
            config.out_dir = out_dir;

            let (tx, rx) = mpsc::unbounded_channel();
            let drain = spawn_drain(rx);
            let mut handles = Vec::new();
            for report_type in ReportType::ALL {
                let pool = pool.clone();
                let config = config.clone();
                let progress = ProgressSender::new(report_type, tx.clone());
                let format = format.unwrap_or_else(|| report_type.default_format());
                handles.push(tokio::spawn(async move {
                    let result =
                        pipeline::generate_report(&pool, report_type, format, &config, &progress)
                            .await;
                    (report_type, result)
                }));
            }
            drop(tx);

            let mut failures = 0usize;
            for handle in handles {
                let (report_type, result) = handle.await.context("report task panicked")?;
                match result {
                    Ok(path) => println!("{report_type}: {}", path.display()),
                    Err(err) => {
                        failures += 1;
                        println!("{report_type}: failed: {}", err.user_message());
                    }
                }
            }

            let board = drain.await.context("progress drain task panicked")?;
            println!("Final status:");
            for report_type in ReportType::ALL {
                if let Some(event) = board.get(report_type) {
                    println!("  {report_type}: {:?} ({}%)", event.status, event.percent);
                    board.clear(report_type);
                }
            }

            if failures > 0 {
                anyhow::bail!("{failures} report(s) failed");
            }
        }
        Commands::ListTypes => unreachable!("handled above"),
    }

    Ok(())
}

/// Drains progress events into the keyed board and the log. The board is
/// what a UI would poll; here it doubles as the final status line source.
fn spawn_drain(
    mut rx: mpsc::UnboundedReceiver<ReportProgress>,
) -> tokio::task::JoinHandle<ProgressBoard> {
    tokio::spawn(async move {
        let board = ProgressBoard::default();
        while let Some(event) = rx.recv().await {
            info!(
                report = %event.report_type,
                status = ?event.status,
                percent = event.percent,
                "{}",
                event.message.as_deref().unwrap_or_default()
            );
            board.record(event);
        }
        board
    })
}
