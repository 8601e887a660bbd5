use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::{ReportError, Result};
use crate::section::{ContentBlock, ReportSection};

// US Letter, points.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 54.0;

const TITLE_SIZE: f32 = 20.0;
const HEADING_SIZE: f32 = 13.0;
const BODY_SIZE: f32 = 10.0;
const FOOTER_SIZE: f32 = 8.0;
const LINE_GAP: f32 = 4.0;

// Helvetica has no fixed advance; 0.55em is a serviceable average for
// wrapping and clipping without embedding font metrics.
const CHAR_WIDTH_EM: f32 = 0.55;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

/// Lays out the validated sections onto Letter pages: title block, one
/// section per page (page break forced before every section except the
/// first), ruled tables, bullet lists, and a page-number footer.
pub fn render(title: &str, subtitle: Option<&str>, sections: &[ReportSection]) -> Result<Vec<u8>> {
    let mut writer = PageWriter::new();

    writer.line(title, BOLD, TITLE_SIZE);
    if let Some(subtitle) = subtitle {
        writer.line(subtitle, REGULAR, BODY_SIZE);
    }
    writer.space(BODY_SIZE);

    if sections.is_empty() {
        writer.line("No data found for this report.", REGULAR, BODY_SIZE);
    }
    for (index, section) in sections.iter().enumerate() {
        if index > 0 {
            writer.page_break();
        }
        writer.section(section);
    }

    writer.finish()
}

struct PageWriter {
    done: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    cursor_y: f32,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            done: Vec::new(),
            current: Vec::new(),
            cursor_y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn page_break(&mut self) {
        self.done.push(std::mem::take(&mut self.current));
        self.cursor_y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_room(&mut self, needed: f32) {
        if self.cursor_y - needed < MARGIN {
            self.page_break();
        }
    }

    fn space(&mut self, points: f32) {
        self.cursor_y -= points;
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        &mut self.current
    }

    fn section(&mut self, section: &ReportSection) {
        self.line(&section.title, BOLD, HEADING_SIZE);
        self.space(LINE_GAP);
        for block in &section.blocks {
            match block {
                ContentBlock::Heading(text) => {
                    self.space(LINE_GAP);
                    self.line(text, BOLD, BODY_SIZE + 1.0);
                }
                ContentBlock::Paragraph(text) => self.paragraph(text),
                ContentBlock::Table { header, body } => self.table(header, body),
                ContentBlock::List(items) => {
                    for item in items {
                        self.paragraph(&format!("- {item}"));
                    }
                }
            }
            self.space(LINE_GAP * 2.0);
        }
    }

    fn paragraph(&mut self, text: &str) {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        for wrapped in wrap(text, BODY_SIZE, usable) {
            self.line(&wrapped, REGULAR, BODY_SIZE);
        }
    }

    fn table(&mut self, header: &[String], body: &[Vec<String>]) {
        if header.is_empty() {
            return;
        }
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        let column_width = usable / header.len() as f32;
        let max_chars = ((column_width / (BODY_SIZE * CHAR_WIDTH_EM)) as usize).saturating_sub(1);

        self.row(header, BOLD, column_width, max_chars);
        self.rule();
        for row in body {
            self.row(row, REGULAR, column_width, max_chars);
        }
        self.rule();
    }

    fn row(&mut self, cells: &[String], font: &'static str, column_width: f32, max_chars: usize) {
        self.ensure_room(BODY_SIZE + LINE_GAP);
        self.cursor_y -= BODY_SIZE;
        let baseline = self.cursor_y;
        for (index, cell) in cells.iter().enumerate() {
            let x = MARGIN + column_width * index as f32;
            self.text_at(x, baseline, &clip(cell, max_chars), font, BODY_SIZE);
        }
        self.cursor_y -= LINE_GAP;
    }

    fn rule(&mut self) {
        self.ensure_room(LINE_GAP);
        let y = self.cursor_y;
        let ops = self.ops();
        ops.push(Operation::new("w", vec![0.5_f32.into()]));
        ops.push(Operation::new("m", vec![MARGIN.into(), y.into()]));
        ops.push(Operation::new("l", vec![(PAGE_WIDTH - MARGIN).into(), y.into()]));
        ops.push(Operation::new("S", vec![]));
        self.cursor_y -= LINE_GAP;
    }

    fn line(&mut self, text: &str, font: &'static str, size: f32) {
        self.ensure_room(size + LINE_GAP);
        self.cursor_y -= size;
        let y = self.cursor_y;
        self.text_at(MARGIN, y, text, font, size);
        self.cursor_y -= LINE_GAP;
    }

    fn text_at(&mut self, x: f32, y: f32, text: &str, font: &'static str, size: f32) {
        let sanitized = sanitize(text);
        let ops = self.ops();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
        ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(sanitized)]));
        ops.push(Operation::new("ET", vec![]));
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                REGULAR => regular_id,
                BOLD => bold_id,
            },
        });

        let mut pages = self.done;
        pages.push(self.current);

        let total = pages.len();
        let mut kids = Vec::with_capacity(total);
        for (index, mut operations) in pages.into_iter().enumerate() {
            operations.extend(footer(index + 1, total));
            let content = Content { operations };
            let encoded = content
                .encode()
                .map_err(|err| ReportError::Generation(err.to_string()))?;
            let stream_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => stream_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|err| ReportError::Generation(err.to_string()))?;
        Ok(buffer)
    }
}

fn footer(page: usize, total: usize) -> Vec<Operation> {
    let text = format!("Page {page} of {total}");
    let x = (PAGE_WIDTH - text.len() as f32 * FOOTER_SIZE * CHAR_WIDTH_EM) / 2.0;
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![REGULAR.into(), FOOTER_SIZE.into()]),
        Operation::new("Td", vec![x.into(), (MARGIN / 2.0).into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Greedy word wrap against the estimated glyph width.
fn wrap(text: &str, size: f32, width: f32) -> Vec<String> {
    let max_chars = ((width / (size * CHAR_WIDTH_EM)) as usize).max(8);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn clip(text: &str, max_chars: usize) -> String {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return sanitize(text);
    }
    let clipped: String = text.chars().take(max_chars.saturating_sub(2)).collect();
    sanitize(&format!("{clipped}.."))
}

/// The base-14 Helvetica encoding cannot show arbitrary Unicode; anything
/// outside printable ASCII becomes '?'.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}
