use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::config::ReportConfig;
use crate::db::{self, QuerySpec};
use crate::error::Result;
use crate::metrics::{ReportMetrics, NOT_SPECIFIED};
use crate::models::{BuildingRecord, FloorRecord, RoomRecord};
use crate::progress::ProgressSender;
use crate::section::{ContentBlock, Priority, ReportSection};

use super::{no_data_sections, rows_to_json, ReportArtifacts, ReportBuilder, ReportType};

/// Building, floor, and room hierarchy. Three fixed queries instead of a
/// join so the column contracts stay one-table-per-spec like every other
/// report.
pub struct FloorplanReport;

fn buildings_query(row_cap: u32) -> QuerySpec {
    QuerySpec::new("buildings", &["id", "name", "address"])
        .order_by("name")
        .limit(row_cap)
}

fn floors_query(row_cap: u32) -> QuerySpec {
    QuerySpec::new("floors", &["id", "building", "level", "name"])
        .order_by("building, level")
        .limit(row_cap)
}

fn rooms_query(row_cap: u32) -> QuerySpec {
    QuerySpec::new("rooms", &["id", "name", "room_type", "capacity", "floor", "building"])
        .order_by("building, floor, name")
        .limit(row_cap)
}

pub(crate) fn assemble(
    buildings: &[BuildingRecord],
    floors: &[FloorRecord],
    rooms: &[RoomRecord],
) -> (ReportMetrics, Vec<ReportSection>) {
    let mut floors_per_building: BTreeMap<&str, usize> = BTreeMap::new();
    for floor in floors {
        *floors_per_building.entry(floor.building.as_str()).or_insert(0) += 1;
    }
    let mut rooms_per_building: BTreeMap<&str, usize> = BTreeMap::new();
    for room in rooms {
        let building = room.building.as_deref().unwrap_or(NOT_SPECIFIED);
        *rooms_per_building.entry(building).or_insert(0) += 1;
    }

    let categories = rooms_per_building
        .iter()
        .map(|(building, &count)| ((*building).to_string(), count))
        .collect();
    let mut extras = std::collections::BTreeMap::new();
    extras.insert("buildings".to_string(), buildings.len() as f64);
    extras.insert("floors".to_string(), floors.len() as f64);
    let metrics = ReportMetrics {
        total_records: rooms.len(),
        categories,
        extras,
    };

    if buildings.is_empty() && rooms.is_empty() {
        return (metrics, no_data_sections("floorplan"));
    }

    let summary = ReportSection::new(
        "Executive Summary",
        Priority::High,
        vec![Some(ContentBlock::Paragraph(format!(
            "{} buildings, {} floors, {} rooms on record.",
            buildings.len(),
            floors.len(),
            rooms.len()
        )))],
    );

    let overview = ReportSection::new(
        "Building Overview",
        Priority::Medium,
        vec![Some(ContentBlock::Table {
            header: vec![
                "Building".to_string(),
                "Address".to_string(),
                "Floors".to_string(),
                "Rooms".to_string(),
            ],
            body: buildings
                .iter()
                .map(|building| {
                    vec![
                        building.name.clone(),
                        building.address.clone().unwrap_or_default(),
                        floors_per_building
                            .get(building.name.as_str())
                            .copied()
                            .unwrap_or(0)
                            .to_string(),
                        rooms_per_building
                            .get(building.name.as_str())
                            .copied()
                            .unwrap_or(0)
                            .to_string(),
                    ]
                })
                .collect(),
        })],
    );

    let inventory = ReportSection::new(
        "Room Inventory",
        Priority::Low,
        vec![Some(ContentBlock::Table {
            header: vec![
                "Building".to_string(),
                "Floor".to_string(),
                "Room".to_string(),
                "Type".to_string(),
            ],
            body: rooms
                .iter()
                .map(|room| {
                    vec![
                        room.building.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        room.floor.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        room.name.clone(),
                        room.room_type.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                    ]
                })
                .collect(),
        })],
    );

    (metrics, vec![summary, overview, inventory])
}

#[async_trait]
impl ReportBuilder for FloorplanReport {
    fn report_type(&self) -> ReportType {
        ReportType::Floorplan
    }

    async fn build(
        &self,
        pool: &PgPool,
        config: &ReportConfig,
        progress: &ProgressSender,
    ) -> Result<ReportArtifacts> {
        progress.update(10, "Fetching buildings, floors, and rooms");
        let buildings = db::execute_query(
            pool,
            &buildings_query(config.row_cap),
            db::building_from_row,
            &config.retry,
        )
        .await?;
        let floors = db::execute_query(
            pool,
            &floors_query(config.row_cap),
            db::floor_from_row,
            &config.retry,
        )
        .await?;
        let rooms = db::execute_query(
            pool,
            &rooms_query(config.row_cap),
            db::room_from_row,
            &config.retry,
        )
        .await?;

        progress.update(40, format!("Computing metrics for {} rooms", rooms.count));
        let (metrics, sections) = assemble(&buildings.data, &floors.data, &rooms.data);
        progress.update(60, "Assembling sections");
        Ok(ReportArtifacts {
            metrics,
            sections,
            raw_rows: rows_to_json(&rooms.data)?,
        })
    }
}
