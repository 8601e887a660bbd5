use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::config::ReportConfig;
use crate::db::{self, QuerySpec};
use crate::error::Result;
use crate::metrics::{count_by, evaluate_rules, ReportMetrics, NOT_SPECIFIED, UNASSIGNED};
use crate::models::KeyRecord;
use crate::progress::ProgressSender;
use crate::section::{ContentBlock, Priority, ReportSection};

use super::{
    breakdown_table, no_data_sections, recommendations_section, rows_to_json, ReportArtifacts,
    ReportBuilder, ReportType,
};

pub struct KeyReport;

fn query(row_cap: u32) -> QuerySpec {
    QuerySpec::new(
        "keys",
        &[
            "id",
            "key_code",
            "assignee",
            "room",
            "building",
            "status",
            "issued_at",
            "due_back",
            "returned_at",
        ],
    )
    .order_by("building, key_code")
    .limit(row_cap)
}

#[derive(Debug)]
pub(crate) struct KeyFigures {
    pub total: usize,
    pub outstanding: usize,
    pub overdue_returns: usize,
    pub lost: usize,
}

const RULES: &[(fn(&KeyFigures) -> bool, &'static str)] = &[
    (
        |f| f.overdue_returns > 0,
        "Keys are past their return date. Follow up with the assignees.",
    ),
    (
        |f| f.lost > 0,
        "Lost keys are on record. Evaluate whether affected locks need rekeying.",
    ),
    (
        |f| f.total > 0 && f.outstanding * 100 > f.total * 80,
        "Most keys are checked out. Audit assignments against current occupants.",
    ),
];

/// A key return is overdue when the key is still out and its due-back
/// date has passed. Returned keys never count, whatever the date says.
pub(crate) fn derive_figures(rows: &[KeyRecord], now: DateTime<Utc>) -> KeyFigures {
    let today = now.date_naive();
    let mut outstanding = 0;
    let mut overdue_returns = 0;
    let mut lost = 0;

    for row in rows {
        let returned = row.returned_at.is_some();
        if !returned {
            outstanding += 1;
            if matches!(row.due_back, Some(due) if due < today) {
                overdue_returns += 1;
            }
        }
        if matches!(row.status.as_deref(), Some(s) if s.eq_ignore_ascii_case("lost")) {
            lost += 1;
        }
    }

    KeyFigures {
        total: rows.len(),
        outstanding,
        overdue_returns,
        lost,
    }
}

pub(crate) fn assemble(rows: &[KeyRecord], now: DateTime<Utc>) -> (ReportMetrics, Vec<ReportSection>) {
    let by_status = count_by(rows, NOT_SPECIFIED, |row| row.status.as_deref());
    let figures = derive_figures(rows, now);

    let mut extras = std::collections::BTreeMap::new();
    extras.insert("outstanding".to_string(), figures.outstanding as f64);
    extras.insert("overdue_returns".to_string(), figures.overdue_returns as f64);
    extras.insert("lost".to_string(), figures.lost as f64);
    let metrics = ReportMetrics {
        total_records: rows.len(),
        categories: by_status.clone(),
        extras,
    };

    if rows.is_empty() {
        return (metrics, no_data_sections("key assignment"));
    }

    let summary = ReportSection::new(
        "Executive Summary",
        Priority::High,
        vec![Some(ContentBlock::Paragraph(format!(
            "{} keys tracked: {} outstanding, {} overdue for return, {} lost.",
            figures.total, figures.outstanding, figures.overdue_returns, figures.lost
        )))],
    );

    let distributions = ReportSection::new(
        "Distributions",
        Priority::Medium,
        vec![
            Some(breakdown_table("Status", &by_status)),
            Some(breakdown_table(
                "Building",
                &count_by(rows, NOT_SPECIFIED, |row| row.building.as_deref()),
            )),
        ],
    );

    let details = ReportSection::new(
        "Key Details",
        Priority::Low,
        vec![Some(ContentBlock::Table {
            header: vec![
                "Key".to_string(),
                "Assignee".to_string(),
                "Building".to_string(),
                "Room".to_string(),
                "Due Back".to_string(),
                "Returned".to_string(),
            ],
            body: rows
                .iter()
                .map(|row| {
                    vec![
                        row.key_code.clone(),
                        row.assignee.clone().unwrap_or_else(|| UNASSIGNED.into()),
                        row.building.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.room.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.due_back.map(|d| d.to_string()).unwrap_or_default(),
                        row.returned_at.map(|d| d.to_string()).unwrap_or_default(),
                    ]
                })
                .collect(),
        })],
    );

    let mut sections = vec![summary, distributions, details];
    if let Some(section) = recommendations_section(evaluate_rules(&figures, RULES)) {
        sections.push(section);
    }
    (metrics, sections)
}

#[async_trait]
impl ReportBuilder for KeyReport {
    fn report_type(&self) -> ReportType {
        ReportType::Key
    }

    async fn build(
        &self,
        pool: &PgPool,
        config: &ReportConfig,
        progress: &ProgressSender,
    ) -> Result<ReportArtifacts> {
        progress.update(10, "Fetching key assignments");
        let result =
            db::execute_query(pool, &query(config.row_cap), db::key_from_row, &config.retry)
                .await?;
        progress.update(40, format!("Computing metrics for {} keys", result.count));
        let (metrics, sections) = assemble(&result.data, Utc::now());
        progress.update(60, "Assembling sections");
        Ok(ReportArtifacts {
            metrics,
            sections,
            raw_rows: rows_to_json(&result.data)?,
        })
    }
}
