use serde::Serialize;

/// Above this many body rows a table is truncated to head + ellipsis + tail.
pub const MAX_TABLE_ROWS: usize = 100;
pub const TABLE_HEAD_ROWS: usize = 49;
pub const TABLE_TAIL_ROWS: usize = 10;

pub const INVALID_TABLE_PLACEHOLDER: &str = "[Invalid table data]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// A typed unit of document structure. Renderers decide the visual form;
/// assembly only decides content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ContentBlock {
    Heading(String),
    Paragraph(String),
    Table {
        header: Vec<String>,
        body: Vec<Vec<String>>,
    },
    List(Vec<String>),
}

/// Named, independently-validated chunk of a report. Builders hand over
/// optional blocks; absent ones are dropped silently.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    pub title: String,
    pub priority: Priority,
    pub blocks: Vec<ContentBlock>,
}

impl ReportSection {
    pub fn new(
        title: impl Into<String>,
        priority: Priority,
        blocks: Vec<Option<ContentBlock>>,
    ) -> Self {
        Self {
            title: title.into(),
            priority,
            blocks: blocks.into_iter().flatten().collect(),
        }
    }
}

/// Validation pass run once before rendering: repairs malformed tables,
/// truncates oversized ones, and orders sections by priority (stable, so
/// assembly order breaks ties).
pub fn validate_sections(sections: Vec<ReportSection>) -> Vec<ReportSection> {
    let mut sections: Vec<ReportSection> = sections
        .into_iter()
        .map(|mut section| {
            section.blocks = section.blocks.into_iter().map(validate_block).collect();
            section
        })
        .collect();
    sections.sort_by_key(|section| section.priority);
    sections
}

fn validate_block(block: ContentBlock) -> ContentBlock {
    match block {
        ContentBlock::Table { header, body } => {
            if header.is_empty() || body.iter().any(|row| row.len() != header.len()) {
                return ContentBlock::Paragraph(INVALID_TABLE_PLACEHOLDER.to_string());
            }
            ContentBlock::Table {
                header,
                body: truncate_body(body),
            }
        }
        other => other,
    }
}

/// Head + ellipsis separator + tail, preserving both ends of a long table.
fn truncate_body(body: Vec<Vec<String>>) -> Vec<Vec<String>> {
    if body.len() <= MAX_TABLE_ROWS {
        return body;
    }
    let width = body.first().map(Vec::len).unwrap_or(0);
    let mut out = Vec::with_capacity(TABLE_HEAD_ROWS + 1 + TABLE_TAIL_ROWS);
    out.extend(body[..TABLE_HEAD_ROWS].iter().cloned());
    out.push(vec!["...".to_string(); width]);
    out.extend(body[body.len() - TABLE_TAIL_ROWS..].iter().cloned());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: usize) -> ContentBlock {
        ContentBlock::Table {
            header: vec!["id".to_string(), "value".to_string()],
            body: (0..rows)
                .map(|i| vec![i.to_string(), format!("row {i}")])
                .collect(),
        }
    }

    #[test]
    fn absent_blocks_are_dropped_silently() {
        let section = ReportSection::new(
            "Summary",
            Priority::High,
            vec![
                Some(ContentBlock::Paragraph("kept".into())),
                None,
                Some(ContentBlock::Heading("also kept".into())),
                None,
            ],
        );
        assert_eq!(section.blocks.len(), 2);
    }

    #[test]
    fn oversized_tables_keep_head_and_tail() {
        let validated = validate_sections(vec![ReportSection::new(
            "Details",
            Priority::Low,
            vec![Some(table(149))],
        )]);
        let ContentBlock::Table { body, .. } = &validated[0].blocks[0] else {
            panic!("expected a table");
        };
        assert_eq!(body.len(), TABLE_HEAD_ROWS + 1 + TABLE_TAIL_ROWS);
        assert_eq!(body[0][0], "0");
        assert_eq!(body[48][0], "48");
        assert_eq!(body[49], vec!["...".to_string(), "...".to_string()]);
        assert_eq!(body[50][0], "139");
        assert_eq!(body[59][0], "148");
    }

    #[test]
    fn tables_at_the_cap_are_left_alone() {
        let validated = validate_sections(vec![ReportSection::new(
            "Details",
            Priority::Low,
            vec![Some(table(100))],
        )]);
        let ContentBlock::Table { body, .. } = &validated[0].blocks[0] else {
            panic!("expected a table");
        };
        assert_eq!(body.len(), 100);
    }

    #[test]
    fn ragged_tables_become_a_placeholder_not_a_failure() {
        let block = ContentBlock::Table {
            header: vec!["a".to_string(), "b".to_string()],
            body: vec![vec!["only one cell".to_string()]],
        };
        let validated = validate_sections(vec![ReportSection::new(
            "Broken",
            Priority::Medium,
            vec![Some(block)],
        )]);
        assert_eq!(
            validated[0].blocks[0],
            ContentBlock::Paragraph(INVALID_TABLE_PLACEHOLDER.to_string())
        );
    }

    #[test]
    fn sections_sort_high_to_low_and_stay_stable_within_a_tier() {
        let sections = vec![
            ReportSection::new("Details", Priority::Low, vec![]),
            ReportSection::new("Status", Priority::Medium, vec![]),
            ReportSection::new("Summary", Priority::High, vec![]),
            ReportSection::new("Trend", Priority::Medium, vec![]),
        ];
        let titles: Vec<String> = validate_sections(sections)
            .into_iter()
            .map(|section| section.title)
            .collect();
        assert_eq!(titles, vec!["Summary", "Status", "Trend", "Details"]);
    }
}
