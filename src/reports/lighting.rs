use async_trait::async_trait;
use sqlx::PgPool;

use crate::config::ReportConfig;
use crate::db::{self, QuerySpec};
use crate::error::Result;
use crate::metrics::{count_by, evaluate_rules, percentage, ReportMetrics, NOT_SPECIFIED};
use crate::models::FixtureRecord;
use crate::progress::ProgressSender;
use crate::section::{ContentBlock, Priority, ReportSection};

use super::{
    breakdown_table, no_data_sections, recommendations_section, rows_to_json, ReportArtifacts,
    ReportBuilder, ReportType,
};

pub struct LightingReport;

fn query(row_cap: u32) -> QuerySpec {
    QuerySpec::new(
        "lighting_fixtures",
        &[
            "id",
            "label",
            "technology",
            "status",
            "wattage",
            "room",
            "installed_at",
        ],
    )
    // NULL status must survive the WHERE clause so it can fold into the
    // Not Specified bucket downstream.
    .filter("(status IS NULL OR status <> 'removed')")
    .order_by("room, label")
    .limit(row_cap)
}

#[derive(Debug)]
pub(crate) struct LightingFigures {
    pub total: usize,
    pub faulty: usize,
    pub legacy_share: f64,
    pub total_wattage: i64,
    pub avg_wattage: Option<f64>,
}

const RULES: &[(fn(&LightingFigures) -> bool, &'static str)] = &[
    (
        |f| f.faulty > 0,
        "Faulty fixtures were found. Schedule a maintenance pass.",
    ),
    (
        |f| f.legacy_share > 25.0,
        "Over a quarter of fixtures use legacy technology. Plan an LED retrofit.",
    ),
    (
        |f| matches!(f.avg_wattage, Some(watts) if watts > 60.0),
        "Average fixture wattage is high. Review energy usage by room.",
    ),
];

fn is_legacy(technology: Option<&str>) -> bool {
    matches!(
        technology,
        Some(t) if t.eq_ignore_ascii_case("fluorescent")
            || t.eq_ignore_ascii_case("incandescent")
            || t.eq_ignore_ascii_case("halogen")
    )
}

fn is_faulty(status: Option<&str>) -> bool {
    matches!(
        status,
        Some(s) if s.eq_ignore_ascii_case("non_functional") || s.eq_ignore_ascii_case("flickering")
    )
}

pub(crate) fn derive_figures(rows: &[FixtureRecord]) -> LightingFigures {
    let faulty = rows.iter().filter(|row| is_faulty(row.status.as_deref())).count();
    let legacy = rows
        .iter()
        .filter(|row| is_legacy(row.technology.as_deref()))
        .count();
    let rated: Vec<i64> = rows
        .iter()
        .filter_map(|row| row.wattage.map(i64::from))
        .collect();
    let total_wattage: i64 = rated.iter().sum();
    let avg_wattage = if rated.is_empty() {
        None
    } else {
        Some(total_wattage as f64 / rated.len() as f64)
    };

    LightingFigures {
        total: rows.len(),
        faulty,
        legacy_share: percentage(legacy, rows.len()),
        total_wattage,
        avg_wattage,
    }
}

pub(crate) fn assemble(rows: &[FixtureRecord]) -> (ReportMetrics, Vec<ReportSection>) {
    let by_technology = count_by(rows, NOT_SPECIFIED, |row| row.technology.as_deref());
    let figures = derive_figures(rows);

    let mut extras = std::collections::BTreeMap::new();
    extras.insert("faulty".to_string(), figures.faulty as f64);
    extras.insert("legacy_share".to_string(), figures.legacy_share);
    extras.insert("total_wattage".to_string(), figures.total_wattage as f64);
    let metrics = ReportMetrics {
        total_records: rows.len(),
        categories: by_technology.clone(),
        extras,
    };

    if rows.is_empty() {
        return (metrics, no_data_sections("lighting fixture"));
    }

    let wattage_line = match figures.avg_wattage {
        Some(watts) => format!(
            "Combined rated load is {} W, averaging {watts:.0} W per rated fixture.",
            figures.total_wattage
        ),
        None => "No fixtures carry a wattage rating.".to_string(),
    };
    let summary = ReportSection::new(
        "Executive Summary",
        Priority::High,
        vec![
            Some(ContentBlock::Paragraph(format!(
                "{} fixtures on record, {} of them faulty. {:.1}% use legacy technology.",
                figures.total, figures.faulty, figures.legacy_share
            ))),
            Some(ContentBlock::Paragraph(wattage_line)),
        ],
    );

    let distributions = ReportSection::new(
        "Distributions",
        Priority::Medium,
        vec![
            Some(breakdown_table("Technology", &by_technology)),
            Some(breakdown_table(
                "Status",
                &count_by(rows, NOT_SPECIFIED, |row| row.status.as_deref()),
            )),
        ],
    );

    let details = ReportSection::new(
        "Fixture Details",
        Priority::Low,
        vec![Some(ContentBlock::Table {
            header: vec![
                "Fixture".to_string(),
                "Room".to_string(),
                "Technology".to_string(),
                "Status".to_string(),
                "Wattage".to_string(),
            ],
            body: rows
                .iter()
                .map(|row| {
                    vec![
                        row.label.clone(),
                        row.room.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.technology.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.status.clone().unwrap_or_else(|| NOT_SPECIFIED.into()),
                        row.wattage.map(|w| w.to_string()).unwrap_or_default(),
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
impl ReportBuilder for LightingReport {
    fn report_type(&self) -> ReportType {
        ReportType::Lighting
    }

    async fn build(
        &self,
        pool: &PgPool,
        config: &ReportConfig,
        progress: &ProgressSender,
    ) -> Result<ReportArtifacts> {
        progress.update(10, "Fetching lighting fixtures");
        let result = db::execute_query(
            pool,
            &query(config.row_cap),
            db::fixture_from_row,
            &config.retry,
        )
        .await?;
        progress.update(40, format!("Computing metrics for {} fixtures", result.count));
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

    fn fixture(technology: &str, status: &str, wattage: Option<i32>) -> FixtureRecord {
        FixtureRecord {
            id: Uuid::new_v4(),
            label: "Bay 4 tube".to_string(),
            technology: Some(technology.to_string()),
            status: Some(status.to_string()),
            wattage,
            room: Some("Workshop".to_string()),
            installed_at: None,
        }
    }

    #[test]
    fn legacy_share_uses_the_report_row_count() {
        let rows = vec![
            fixture("LED", "functional", Some(12)),
            fixture("fluorescent", "functional", Some(32)),
            fixture("fluorescent", "flickering", Some(32)),
            fixture("LED", "functional", None),
        ];
        let figures = derive_figures(&rows);
        assert!((figures.legacy_share - 50.0).abs() < 1e-9);
        assert_eq!(figures.faulty, 1);
    }

    #[test]
    fn wattage_average_only_counts_rated_fixtures() {
        let rows = vec![
            fixture("LED", "functional", Some(10)),
            fixture("LED", "functional", Some(20)),
            fixture("LED", "functional", None),
        ];
        let figures = derive_figures(&rows);
        assert_eq!(figures.total_wattage, 30);
        assert!((figures.avg_wattage.unwrap() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn retrofit_recommendation_requires_a_quarter_legacy() {
        let mostly_led: Vec<FixtureRecord> = (0..9)
            .map(|_| fixture("LED", "functional", Some(12)))
            .chain(std::iter::once(fixture("halogen", "functional", Some(50))))
            .collect();
        let recommendations = evaluate_rules(&derive_figures(&mostly_led), RULES);
        assert!(!recommendations.iter().any(|r| r.contains("retrofit")));

        let legacy_heavy = vec![
            fixture("incandescent", "functional", Some(60)),
            fixture("LED", "functional", Some(12)),
        ];
        let recommendations = evaluate_rules(&derive_figures(&legacy_heavy), RULES);
        assert!(recommendations.iter().any(|r| r.contains("retrofit")));
    }

    #[test]
    fn query_keeps_fixtures_with_a_null_status() {
        // `status <> 'removed'` alone is NULL for NULL statuses under SQL
        // three-valued logic, which would drop those rows server-side.
        let sql = query(100).to_sql();
        assert!(sql.contains("WHERE (status IS NULL OR status <> 'removed')"));
    }

    #[test]
    fn empty_rows_short_circuit_to_the_no_data_section() {
        let (metrics, sections) = assemble(&[]);
        assert_eq!(metrics.total_records, 0);
        assert_eq!(sections.len(), 1);
    }
}
