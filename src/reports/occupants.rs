use async_trait::async_trait;
use sqlx::PgPool;

use crate::config::ReportConfig;
use crate::db::{self, QuerySpec};
use crate::error::Result;
use crate::metrics::{count_by, ReportMetrics, NOT_SPECIFIED};
use crate::models::OccupantRecord;
use crate::progress::ProgressSender;
use crate::section::{ContentBlock, Priority, ReportSection};

use super::{
    breakdown_table, no_data_sections, rows_to_json, ReportArtifacts, ReportBuilder, ReportType,
};

pub struct OccupantReport;

fn query(row_cap: u32) -> QuerySpec {
    QuerySpec::new(
        "occupants",
        &["id", "full_name", "email", "department", "status", "room", "building"],
    )
    .order_by("building, room, full_name")
    .limit(row_cap)
}

pub(crate) fn assemble(rows: &[OccupantRecord]) -> (ReportMetrics, Vec<ReportSection>) {
    let by_department = count_by(rows, NOT_SPECIFIED, |row| row.department.as_deref());
    let unhoused = rows.iter().filter(|row| row.room.is_none()).count();

    let mut extras = std::collections::BTreeMap::new();
    extras.insert("without_room".to_string(), unhoused as f64);
    let metrics = ReportMetrics {
        total_records: rows.len(),
        categories: by_department.clone(),
        extras,
    };

    if rows.is_empty() {
        return (metrics, no_data_sections("occupant"));
    }

    let summary = ReportSection::new(
        "Executive Summary",
        Priority::High,
        vec![Some(ContentBlock::Paragraph(format!(
            "{} occupants on record across {} departments; {} have no room assignment.",
            rows.len(),
            by_department.len(),
            unhoused
        )))],
    );

    let distributions = ReportSection::new(
        "Distributions",
        Priority::Medium,
        vec![
            Some(breakdown_table("Department", &by_department)),
            Some(breakdown_table(
                "Status",
                &count_by(rows, NOT_SPECIFIED, |row| row.status.as_deref()),
            )),
            Some(breakdown_table(
                "Building",
                &count_by(rows, NOT_SPECIFIED, |row| row.building.as_deref()),
            )),
        ],
    );

    let details = ReportSection::new(
        "Occupant Details",
        Priority::Low,
        vec![Some(ContentBlock::Table {
            header: vec![
                "Name".to_string(),
                "Department".to_string(),
                "Building".to_string(),
                "Room".to_string(),
                "Status".to_string(),
            ],
            body: rows
                .iter()
                .map(|row| {
                    vec![
                        row.full_name.clone(),
                        row.department.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.building.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.room.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.status.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                    ]
                })
                .collect(),
        })],
    );

    (metrics, vec![summary, distributions, details])
}

#[async_trait]
impl ReportBuilder for OccupantReport {
    fn report_type(&self) -> ReportType {
        ReportType::Occupant
    }

    async fn build(
        &self,
        pool: &PgPool,
        config: &ReportConfig,
        progress: &ProgressSender,
    ) -> Result<ReportArtifacts> {
        progress.update(10, "Fetching occupants");
        let result = db::execute_query(
            pool,
            &query(config.row_cap),
            db::occupant_from_row,
            &config.retry,
        )
        .await?;
        progress.update(40, format!("Computing metrics for {} occupants", result.count));
        let (metrics, sections) = assemble(&result.data);
        progress.update(60, "Assembling sections");
        Ok(ReportArtifacts {
            metrics,
            sections,
            raw_rows: rows_to_json(&result.data)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn occupant(department: Option<&str>, room: Option<&str>) -> OccupantRecord {
        OccupantRecord {
            id: Uuid::new_v4(),
            full_name: "Mori Tanaka".to_string(),
            email: None,
            department: department.map(str::to_string),
            status: Some("active".to_string()),
            room: room.map(str::to_string),
            building: Some("North Annex".to_string()),
        }
    }

    #[test]
    fn missing_departments_fold_into_the_explicit_bucket() {
        let rows = vec![
            occupant(Some("Facilities"), Some("101")),
            occupant(None, None),
        ];
        let (metrics, _) = assemble(&rows);
        assert_eq!(metrics.categories.get("Facilities"), Some(&1));
        assert_eq!(metrics.categories.get(NOT_SPECIFIED), Some(&1));
        assert_eq!(metrics.extras.get("without_room"), Some(&1.0));
    }

    #[test]
    fn zero_occupants_complete_with_a_no_data_section() {
        let (_, sections) = assemble(&[]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Executive Summary");
    }
}
