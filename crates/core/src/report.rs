//! PDF rendering of an inspection snapshot.
//!
//! Produces a plain, text-only PDF 1.4 document (A4, built-in Helvetica) so
//! rendering has no font or system dependencies. Output is a pure function
//! of the snapshot: the same version always renders the same bytes.

use std::fmt::Write as _;

use crate::inspection::{Inspection, Item, Section};
use crate::types::Timestamp;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;

/// Characters per line before wrapping body text.
const WRAP_COLUMNS: usize = 90;

/// One laid-out line of text.
#[derive(Debug, Clone, PartialEq)]
struct Line {
    size: f32,
    indent: f32,
    text: String,
}

impl Line {
    fn new(size: f32, indent: f32, text: impl Into<String>) -> Self {
        Self {
            size,
            indent,
            text: text.into(),
        }
    }

    fn height(&self) -> f32 {
        self.size * 1.4
    }
}

/// Render `inspection` as PDF bytes.
pub fn render_pdf(inspection: &Inspection) -> Vec<u8> {
    let pages = paginate(layout(inspection));
    write_document(&pages)
}

/// Object-storage path for a rendered report artifact.
pub fn report_object_path(inspection: &Inspection) -> String {
    format!("reports/{}/v{}.pdf", inspection.id, inspection.version)
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

fn layout(inspection: &Inspection) -> Vec<Line> {
    let mut lines = vec![
        Line::new(18.0, 0.0, "VEHICLE INSPECTION REPORT"),
        Line::new(10.0, 0.0, ""),
        Line::new(10.0, 0.0, format!("Inspection: {}", inspection.id)),
        Line::new(10.0, 0.0, format!("Vehicle: {}", inspection.vehicle_id)),
        Line::new(10.0, 0.0, format!("Inspector: {}", inspection.inspector_id)),
        Line::new(
            10.0,
            0.0,
            format!(
                "Type: {}    Status: {}    Version: {}",
                inspection.kind.as_str(),
                inspection.status.as_str(),
                inspection.version
            ),
        ),
        Line::new(10.0, 0.0, format!("Started: {}", format_ts(&inspection.started_at))),
    ];
    if let Some(completed_at) = &inspection.completed_at {
        lines.push(Line::new(10.0, 0.0, format!("Completed: {}", format_ts(completed_at))));
    }
    if inspection.can_edit() {
        lines.push(Line::new(10.0, 0.0, "DRAFT - subject to change"));
    }

    if !inspection.summary.is_empty() {
        lines.push(Line::new(10.0, 0.0, ""));
        lines.push(Line::new(14.0, 0.0, "Summary"));
        push_wrapped(&mut lines, 10.0, 12.0, &inspection.summary);
    }

    for (name, section) in &inspection.sections {
        lines.push(Line::new(10.0, 0.0, ""));
        layout_section(&mut lines, name, section);
    }
    lines
}

fn layout_section(lines: &mut Vec<Line>, name: &str, section: &Section) {
    let heading = match &section.completed_at {
        Some(at) => format!("{} (completed {})", name.to_uppercase(), format_ts(at)),
        None => name.to_uppercase(),
    };
    lines.push(Line::new(14.0, 0.0, heading));

    for (field, value) in &section.fields {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        push_wrapped(lines, 10.0, 12.0, &format!("{field}: {rendered}"));
    }
    for item in &section.items {
        layout_item(lines, item);
    }
    if !section.notes.is_empty() {
        push_wrapped(lines, 10.0, 12.0, &format!("Notes: {}", section.notes));
    }
}

fn layout_item(lines: &mut Vec<Line>, item: &Item) {
    let title = if item.name.is_empty() {
        item.id.as_str()
    } else {
        item.name.as_str()
    };
    let mut text = format!("[{}] {title}", item.status.label());
    if let Some(value) = &item.value {
        let _ = write!(text, " = {value}");
    }
    if !item.photos.is_empty() {
        let _ = write!(text, " ({} photo(s))", item.photos.len());
    }
    push_wrapped(lines, 10.0, 12.0, &text);
    if !item.notes.is_empty() {
        push_wrapped(lines, 9.0, 24.0, &item.notes);
    }
}

fn push_wrapped(lines: &mut Vec<Line>, size: f32, indent: f32, text: &str) {
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > WRAP_COLUMNS
        {
            lines.push(Line::new(size, indent, std::mem::take(&mut current)));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    lines.push(Line::new(size, indent, current));
}

fn paginate(lines: Vec<Line>) -> Vec<Vec<(f32, Line)>> {
    let mut pages = Vec::new();
    let mut page = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        if y - line.height() < MARGIN && !page.is_empty() {
            pages.push(std::mem::take(&mut page));
            y = PAGE_HEIGHT - MARGIN;
        }
        y -= line.height();
        page.push((y, line));
    }
    pages.push(page);
    pages
}

fn format_ts(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

// ---------------------------------------------------------------------------
// PDF serialization
// ---------------------------------------------------------------------------

/// Escape text for a PDF literal string in WinAnsi encoding.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            _ => out.push('?'),
        }
    }
    out
}

fn content_stream(page: &[(f32, Line)]) -> String {
    let mut stream = String::new();
    for (y, line) in page {
        if line.text.is_empty() {
            continue;
        }
        let _ = writeln!(
            stream,
            "BT /F1 {:.1} Tf {:.1} {:.1} Td ({}) Tj ET",
            line.size,
            MARGIN + line.indent,
            y,
            escape_text(&line.text)
        );
    }
    stream
}

fn write_document(pages: &[Vec<(f32, Line)>]) -> Vec<u8> {
    // Objects: 1 catalog, 2 page tree, 3 font, then (page, content) pairs.
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + i * 2).collect();
    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids
                .iter()
                .map(|id| format!("{id} 0 R"))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    for (page, page_id) in pages.iter().zip(&page_ids) {
        let content = content_stream(page);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            page_id + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}endstream",
            content.len()
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{body}\nendobj\n", index + 1);
    }

    let xref_offset = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = writeln!(out, "{offset:010} 00000 n ");
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    );
    out.into_bytes()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
