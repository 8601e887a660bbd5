use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::config::ReportConfig;
use crate::db::{self, QuerySpec};
use crate::error::Result;
use crate::metrics::{
    count_by, days_overdue, evaluate_rules, is_overdue, mean_resolution_hours, trend_buckets,
    ReportMetrics, TrendWindow, NOT_SPECIFIED, UNASSIGNED,
};
use crate::models::IssueRecord;
use crate::progress::ProgressSender;
use crate::section::{ContentBlock, Priority, ReportSection};

use super::{
    breakdown_table, no_data_sections, recommendations_section, rows_to_json, ReportArtifacts,
    ReportBuilder, ReportType,
};

pub struct IssueReport;

fn query(row_cap: u32) -> QuerySpec {
    QuerySpec::new(
        "issues",
        &[
            "id",
            "title",
            "status",
            "priority",
            "issue_type",
            "location",
            "assigned_to",
            "created_at",
            "due_date",
            "resolved_at",
        ],
    )
    .order_by("created_at DESC")
    .limit(row_cap)
}

#[derive(Debug)]
pub(crate) struct IssueFigures {
    pub total: usize,
    pub open: usize,
    pub overdue: usize,
    pub critical_overdue: usize,
    pub max_days_overdue: i64,
    pub avg_resolution_hours: Option<f64>,
}

const RULES: &[(fn(&IssueFigures) -> bool, &'static str)] = &[
    (
        |f| f.critical_overdue > 0,
        "Critical issues are past due. Escalate them to facilities management today.",
    ),
    (
        |f| f.total > 0 && f.overdue * 100 > f.total * 30,
        "More than 30% of issues are overdue. Review the triage and scheduling process.",
    ),
    (
        |f| matches!(f.avg_resolution_hours, Some(hours) if hours > 72.0),
        "Average resolution time exceeds three days. Consider additional maintenance capacity.",
    ),
    (
        |f| f.total > 0 && f.open * 100 > f.total * 50,
        "Over half of tracked issues remain open. Schedule a backlog review.",
    ),
];

pub(crate) fn derive_figures(rows: &[IssueRecord], now: DateTime<Utc>) -> IssueFigures {
    let mut open = 0;
    let mut overdue = 0;
    let mut critical_overdue = 0;
    let mut max_days = 0i64;

    for row in rows {
        let status = row.status.as_deref();
        let resolved = matches!(
            status,
            Some(s) if s.eq_ignore_ascii_case("resolved") || s.eq_ignore_ascii_case("closed")
        );
        if !resolved {
            open += 1;
        }
        if is_overdue(status, row.due_date, now) {
            overdue += 1;
            if let Some(due) = row.due_date {
                max_days = max_days.max(days_overdue(now, due));
            }
            if matches!(row.priority.as_deref(), Some(p) if p.eq_ignore_ascii_case("critical")) {
                critical_overdue += 1;
            }
        }
    }

    IssueFigures {
        total: rows.len(),
        open,
        overdue,
        critical_overdue,
        max_days_overdue: max_days,
        avg_resolution_hours: mean_resolution_hours(
            rows.iter().map(|row| (row.created_at, row.resolved_at)),
        ),
    }
}

pub(crate) fn assemble(rows: &[IssueRecord], now: DateTime<Utc>) -> (ReportMetrics, Vec<ReportSection>) {
    let by_status = count_by(rows, NOT_SPECIFIED, |row| row.status.as_deref());
    let figures = derive_figures(rows, now);

    let mut extras = std::collections::BTreeMap::new();
    extras.insert("open".to_string(), figures.open as f64);
    extras.insert("overdue".to_string(), figures.overdue as f64);
    extras.insert("critical_overdue".to_string(), figures.critical_overdue as f64);
    if let Some(hours) = figures.avg_resolution_hours {
        extras.insert("avg_resolution_hours".to_string(), hours);
    }
    let metrics = ReportMetrics {
        total_records: rows.len(),
        categories: by_status.clone(),
        extras,
    };

    if rows.is_empty() {
        return (metrics, no_data_sections("issue"));
    }

    let resolution_line = match figures.avg_resolution_hours {
        Some(hours) => format!("Average resolution time: {hours:.1} hours."),
        None => "No issues have been resolved yet.".to_string(),
    };
    let summary = ReportSection::new(
        "Executive Summary",
        Priority::High,
        vec![
            Some(ContentBlock::Paragraph(format!(
                "{} issues on record: {} open, {} overdue ({} critical). \
                 Longest overdue item is {} days past due.",
                figures.total,
                figures.open,
                figures.overdue,
                figures.critical_overdue,
                figures.max_days_overdue
            ))),
            Some(ContentBlock::Paragraph(resolution_line)),
        ],
    );

    let distributions = ReportSection::new(
        "Distributions",
        Priority::Medium,
        vec![
            Some(breakdown_table("Status", &by_status)),
            Some(breakdown_table(
                "Priority",
                &count_by(rows, NOT_SPECIFIED, |row| row.priority.as_deref()),
            )),
            Some(breakdown_table(
                "Type",
                &count_by(rows, NOT_SPECIFIED, |row| row.issue_type.as_deref()),
            )),
        ],
    );

    let created: Vec<DateTime<Utc>> = rows.iter().map(|row| row.created_at).collect();
    let trend_body = trend_buckets(&created, TrendWindow::Weekly, now)
        .into_iter()
        .map(|bucket| {
            vec![
                bucket.start.to_string(),
                (bucket.end - chrono::Duration::days(1)).to_string(),
                bucket.count.to_string(),
            ]
        })
        .collect();
    let trend = ReportSection::new(
        "Weekly Intake Trend",
        Priority::Medium,
        vec![Some(ContentBlock::Table {
            header: vec![
                "Week Start".to_string(),
                "Week End".to_string(),
                "New Issues".to_string(),
            ],
            body: trend_body,
        })],
    );

    let details = ReportSection::new(
        "Issue Details",
        Priority::Low,
        vec![Some(ContentBlock::Table {
            header: vec![
                "Title".to_string(),
                "Status".to_string(),
                "Priority".to_string(),
                "Location".to_string(),
                "Assigned To".to_string(),
            ],
            body: rows
                .iter()
                .map(|row| {
                    vec![
                        row.title.clone(),
                        row.status.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.priority.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.location.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.assigned_to.clone().unwrap_or_else(|| UNASSIGNED.into()),
                    ]
                })
                .collect(),
        })],
    );

    let mut sections = vec![summary, distributions, trend, details];
    if let Some(section) = recommendations_section(evaluate_rules(&figures, RULES)) {
        sections.push(section);
    }
    (metrics, sections)
}

#[async_trait]
impl ReportBuilder for IssueReport {
    fn report_type(&self) -> ReportType {
        ReportType::Issue
    }

    async fn build(
        &self,
        pool: &PgPool,
        config: &ReportConfig,
        progress: &ProgressSender,
    ) -> Result<ReportArtifacts> {
        progress.update(10, "Fetching issues");
        let result =
            db::execute_query(pool, &query(config.row_cap), db::issue_from_row, &config.retry)
                .await?;
        progress.update(40, format!("Computing metrics for {} issues", result.count));
        let (metrics, sections) = assemble(&result.data, Utc::now());
        progress.update(60, "Assembling sections");
        Ok(ReportArtifacts {
            metrics,
            sections,
            raw_rows: rows_to_json(&result.data)?,
        })
    }
}
