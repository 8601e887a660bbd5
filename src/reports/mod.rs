pub mod database;
pub mod floorplan;
pub mod issues;
pub mod keys;
pub mod lighting;
pub mod occupants;
pub mod rooms;

use std::collections::BTreeMap;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::config::ReportConfig;
use crate::error::Result;
use crate::metrics::{percentage, ReportMetrics};
use crate::progress::ProgressSender;
use crate::render::ReportFormat;
use crate::section::{ContentBlock, Priority, ReportSection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Issue,
    Lighting,
    Occupant,
    Key,
    Room,
    Floorplan,
    Database,
}

impl ReportType {
    pub const ALL: [ReportType; 7] = [
        ReportType::Issue,
        ReportType::Lighting,
        ReportType::Occupant,
        ReportType::Key,
        ReportType::Room,
        ReportType::Floorplan,
        ReportType::Database,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Issue => "issue",
            ReportType::Lighting => "lighting",
            ReportType::Occupant => "occupant",
            ReportType::Key => "key",
            ReportType::Room => "room",
            ReportType::Floorplan => "floorplan",
            ReportType::Database => "database",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportType::Issue => "Facility Issues Report",
            ReportType::Lighting => "Lighting Fixtures Report",
            ReportType::Occupant => "Occupants Report",
            ReportType::Key => "Key Assignments Report",
            ReportType::Room => "Rooms Report",
            ReportType::Floorplan => "Floorplan Report",
            ReportType::Database => "Full Database Export",
        }
    }

    pub fn default_format(&self) -> ReportFormat {
        match self {
            ReportType::Database => ReportFormat::Json,
            _ => ReportFormat::Pdf,
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one builder invocation, handed to the renderer: validated
/// sections for PDF, the raw rows for CSV/JSON, and the metrics snapshot
/// for the subtitle line.
pub struct ReportArtifacts {
    pub metrics: ReportMetrics,
    pub sections: Vec<ReportSection>,
    pub raw_rows: Vec<Value>,
}

/// The per-report-type strategy: owns its fixed query and the derivation
/// and assembly for its rows. The pipeline stays generic over this.
#[async_trait]
pub trait ReportBuilder: Send + Sync {
    fn report_type(&self) -> ReportType;

    async fn build(
        &self,
        pool: &PgPool,
        config: &ReportConfig,
        progress: &ProgressSender,
    ) -> Result<ReportArtifacts>;
}

/// Registry dispatch: one place that knows every report type.
pub fn builder_for(report_type: ReportType) -> Box<dyn ReportBuilder> {
    match report_type {
        ReportType::Issue => Box::new(issues::IssueReport),
        ReportType::Lighting => Box::new(lighting::LightingReport),
        ReportType::Occupant => Box::new(occupants::OccupantReport),
        ReportType::Key => Box::new(keys::KeyReport),
        ReportType::Room => Box::new(rooms::RoomReport),
        ReportType::Floorplan => Box::new(floorplan::FloorplanReport),
        ReportType::Database => Box::new(database::DatabaseReport),
    }
}

pub(crate) fn rows_to_json<T: Serialize>(rows: &[T]) -> Result<Vec<Value>> {
    rows.iter()
        .map(|row| serde_json::to_value(row).map_err(Into::into))
        .collect()
}

/// Breakdown table with a share column. Percentages divide by the
/// breakdown's own row count, so the column always sums to 100.
pub(crate) fn breakdown_table(label: &str, counts: &BTreeMap<String, usize>) -> ContentBlock {
    let total: usize = counts.values().sum();
    if total == 0 {
        return ContentBlock::Paragraph("No data found for this breakdown.".to_string());
    }
    let body = counts
        .iter()
        .map(|(key, &count)| {
            vec![
                key.clone(),
                count.to_string(),
                format!("{:.1}%", percentage(count, total)),
            ]
        })
        .collect();
    ContentBlock::Table {
        header: vec![label.to_string(), "Count".to_string(), "Share".to_string()],
        body,
    }
}

/// The graceful zero-row path: a completed report with an explicit
/// empty-state section instead of an error.
pub(crate) fn no_data_sections(subject: &str) -> Vec<ReportSection> {
    vec![ReportSection::new(
        "Executive Summary",
        Priority::High,
        vec![Some(ContentBlock::Paragraph(format!(
            "No {subject} data found for this report."
        )))],
    )]
}

pub(crate) fn recommendations_section(recommendations: Vec<String>) -> Option<ReportSection> {
    if recommendations.is_empty() {
        return None;
    }
    Some(ReportSection::new(
        "Recommendations",
        Priority::High,
        vec![Some(ContentBlock::List(recommendations))],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_report_type() {
        for report_type in ReportType::ALL {
            assert_eq!(builder_for(report_type).report_type(), report_type);
        }
    }

    #[test]
    fn database_export_defaults_to_json() {
        assert_eq!(ReportType::Database.default_format(), ReportFormat::Json);
        assert_eq!(ReportType::Issue.default_format(), ReportFormat::Pdf);
    }

    #[test]
    fn breakdown_shares_sum_to_100() {
        let counts: BTreeMap<String, usize> = [
            ("LED".to_string(), 3),
            ("Fluorescent".to_string(), 1),
        ]
        .into_iter()
        .collect();
        let ContentBlock::Table { body, .. } = breakdown_table("Technology", &counts) else {
            panic!("expected a table");
        };
        let sum: f64 = body
            .iter()
            .map(|row| row[2].trim_end_matches('%').parse::<f64>().unwrap())
            .sum();
        assert!((sum - 100.0).abs() < 1.0);
    }

    #[test]
    fn empty_breakdown_renders_a_placeholder() {
        let counts = BTreeMap::new();
        assert!(matches!(
            breakdown_table("Status", &counts),
            ContentBlock::Paragraph(_)
        ));
    }
}
