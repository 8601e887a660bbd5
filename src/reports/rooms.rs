use async_trait::async_trait;
use sqlx::PgPool;

use crate::config::ReportConfig;
use crate::db::{self, QuerySpec};
use crate::error::Result;
use crate::metrics::{count_by, ReportMetrics, NOT_SPECIFIED};
use crate::models::RoomRecord;
use crate::progress::ProgressSender;
use crate::section::{ContentBlock, Priority, ReportSection};

use super::{
    breakdown_table, no_data_sections, rows_to_json, ReportArtifacts, ReportBuilder, ReportType,
};

pub struct RoomReport;

fn query(row_cap: u32) -> QuerySpec {
    QuerySpec::new(
        "rooms",
        &["id", "name", "room_type", "capacity", "floor", "building"],
    )
    .order_by("building, floor, name")
    .limit(row_cap)
}

pub(crate) fn assemble(rows: &[RoomRecord]) -> (ReportMetrics, Vec<ReportSection>) {
    let by_building = count_by(rows, NOT_SPECIFIED, |row| row.building.as_deref());
    let rated: Vec<i64> = rows
        .iter()
        .filter_map(|row| row.capacity.map(i64::from))
        .collect();
    let total_capacity: i64 = rated.iter().sum();
    let unrated = rows.len() - rated.len();

    let mut extras = std::collections::BTreeMap::new();
    extras.insert("total_capacity".to_string(), total_capacity as f64);
    extras.insert("without_capacity".to_string(), unrated as f64);
    let metrics = ReportMetrics {
        total_records: rows.len(),
        categories: by_building.clone(),
        extras,
    };

    if rows.is_empty() {
        return (metrics, no_data_sections("room"));
    }

    let summary = ReportSection::new(
        "Executive Summary",
        Priority::High,
        vec![Some(ContentBlock::Paragraph(format!(
            "{} rooms across {} buildings with a combined capacity of {}. \
             {} rooms have no capacity on record.",
            rows.len(),
            by_building.len(),
            total_capacity,
            unrated
        )))],
    );

    let distributions = ReportSection::new(
        "Distributions",
        Priority::Medium,
        vec![
            Some(breakdown_table("Building", &by_building)),
            Some(breakdown_table(
                "Room Type",
                &count_by(rows, NOT_SPECIFIED, |row| row.room_type.as_deref()),
            )),
        ],
    );

    let details = ReportSection::new(
        "Room Details",
        Priority::Low,
        vec![Some(ContentBlock::Table {
            header: vec![
                "Room".to_string(),
                "Building".to_string(),
                "Floor".to_string(),
                "Type".to_string(),
                "Capacity".to_string(),
            ],
            body: rows
                .iter()
                .map(|row| {
                    vec![
                        row.name.clone(),
                        row.building.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.floor.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.room_type.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.capacity.map(|c| c.to_string()).unwrap_or_default(),
                    ]
                })
                .collect(),
        })],
    );

    (metrics, vec![summary, distributions, details])
}

#[async_trait]
impl ReportBuilder for RoomReport {
    fn report_type(&self) -> ReportType {
        ReportType::Room
    }

    async fn build(
        &self,
        pool: &PgPool,
        config: &ReportConfig,
        progress: &ProgressSender,
    ) -> Result<ReportArtifacts> {
        progress.update(10, "Fetching rooms");
        let result =
            db::execute_query(pool, &query(config.row_cap), db::room_from_row, &config.retry)
                .await?;
        progress.update(40, format!("Computing metrics for {} rooms", result.count));
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

    fn room(building: &str, capacity: Option<i32>) -> RoomRecord {
        RoomRecord {
            id: Uuid::new_v4(),
            name: "Conference A".to_string(),
            room_type: Some("meeting".to_string()),
            capacity,
            floor: Some("2".to_string()),
            building: Some(building.to_string()),
        }
    }

    #[test]
    fn capacity_totals_skip_unrated_rooms() {
        let rows = vec![
            room("North Annex", Some(12)),
            room("North Annex", Some(8)),
            room("South Hall", None),
        ];
        let (metrics, _) = assemble(&rows);
        assert_eq!(metrics.extras.get("total_capacity"), Some(&20.0));
        assert_eq!(metrics.extras.get("without_capacity"), Some(&1.0));
        assert_eq!(metrics.categories.get("North Annex"), Some(&2));
    }

    #[test]
    fn empty_rows_produce_the_no_data_section() {
        let (_, sections) = assemble(&[]);
        assert_eq!(sections.len(), 1);
    }
}
