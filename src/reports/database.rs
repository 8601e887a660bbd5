use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::config::ReportConfig;
use crate::db::{self, QuerySpec};
use crate::error::Result;
use crate::metrics::ReportMetrics;
use crate::progress::ProgressSender;
use crate::section::{ContentBlock, Priority, ReportSection};

use super::{rows_to_json, ReportArtifacts, ReportBuilder, ReportType};

/// Full export of every facilities table. JSON is the primary format; the
/// PDF rendition is a per-table row-count summary rather than a dump.
pub struct DatabaseReport;

struct TableExport {
    table: &'static str,
    rows: Vec<Value>,
    truncated: bool,
}

async fn export_table<T, F>(
    pool: &PgPool,
    config: &ReportConfig,
    spec: QuerySpec,
    map_row: F,
) -> Result<TableExport>
where
    T: serde::Serialize,
    F: Fn(&sqlx::postgres::PgRow) -> Result<T>,
{
    let result = db::execute_query(pool, &spec, map_row, &config.retry).await?;
    Ok(TableExport {
        table: spec.table,
        rows: rows_to_json(&result.data)?,
        truncated: result.has_more,
    })
}

fn assemble(exports: &[TableExport]) -> (ReportMetrics, Vec<ReportSection>, Vec<Value>) {
    let total: usize = exports.iter().map(|e| e.rows.len()).sum();
    let categories = exports
        .iter()
        .map(|e| (e.table.to_string(), e.rows.len()))
        .collect();
    let metrics = ReportMetrics {
        total_records: total,
        categories,
        extras: Default::default(),
    };

    let body = exports
        .iter()
        .map(|e| {
            vec![
                e.table.to_string(),
                e.rows.len().to_string(),
                if e.truncated { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    let sections = vec![
        ReportSection::new(
            "Executive Summary",
            Priority::High,
            vec![Some(ContentBlock::Paragraph(format!(
                "{} rows exported across {} tables.",
                total,
                exports.len()
            )))],
        ),
        ReportSection::new(
            "Tables",
            Priority::Medium,
            vec![Some(ContentBlock::Table {
                header: vec![
                    "Table".to_string(),
                    "Rows".to_string(),
                    "Capped".to_string(),
                ],
                body,
            })],
        ),
    ];

    let raw_rows = exports
        .iter()
        .map(|e| json!({"table": e.table, "row_count": e.rows.len(), "rows": e.rows}))
        .collect();
    (metrics, sections, raw_rows)
}

#[async_trait]
impl ReportBuilder for DatabaseReport {
    fn report_type(&self) -> ReportType {
        ReportType::Database
    }

    async fn build(
        &self,
        pool: &PgPool,
        config: &ReportConfig,
        progress: &ProgressSender,
    ) -> Result<ReportArtifacts> {
        let cap = config.row_cap;
        progress.update(10, "Exporting all facilities tables");

        let exports = vec![
            export_table(
                pool,
                config,
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
                .limit(cap),
                db::issue_from_row,
            )
            .await?,
            export_table(
                pool,
                config,
                QuerySpec::new(
                    "lighting_fixtures",
                    &["id", "label", "technology", "status", "wattage", "room", "installed_at"],
                )
                .limit(cap),
                db::fixture_from_row,
            )
            .await?,
            export_table(
                pool,
                config,
                QuerySpec::new(
                    "occupants",
                    &["id", "full_name", "email", "department", "status", "room", "building"],
                )
                .limit(cap),
                db::occupant_from_row,
            )
            .await?,
            export_table(
                pool,
                config,
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
                .limit(cap),
                db::key_from_row,
            )
            .await?,
            export_table(
                pool,
                config,
                QuerySpec::new(
                    "rooms",
                    &["id", "name", "room_type", "capacity", "floor", "building"],
                )
                .limit(cap),
                db::room_from_row,
            )
            .await?,
            export_table(
                pool,
                config,
                QuerySpec::new("buildings", &["id", "name", "address"]).limit(cap),
                db::building_from_row,
            )
            .await?,
            export_table(
                pool,
                config,
                QuerySpec::new("floors", &["id", "building", "level", "name"]).limit(cap),
                db::floor_from_row,
            )
            .await?,
        ];

        progress.update(40, "Summarizing export");
        let (metrics, sections, raw_rows) = assemble(&exports);
        progress.update(60, "Assembling sections");
        Ok(ReportArtifacts {
            metrics,
            sections,
            raw_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_rows_across_tables() {
        let exports = vec![
            TableExport {
                table: "issues",
                rows: vec![json!({"id": 1}), json!({"id": 2})],
                truncated: false,
            },
            TableExport {
                table: "rooms",
                rows: vec![json!({"id": 3})],
                truncated: true,
            },
        ];
        let (metrics, sections, raw_rows) = assemble(&exports);
        assert_eq!(metrics.total_records, 3);
        assert_eq!(metrics.categories.get("issues"), Some(&2));
        assert_eq!(raw_rows.len(), 2);
        assert_eq!(raw_rows[1]["table"], "rooms");

        let ContentBlock::Table { body, .. } = &sections[1].blocks[0] else {
            panic!("expected a table");
        };
        assert_eq!(body[1], vec!["rooms", "1", "yes"]);
    }
}
