//! Minimal PDF 1.4 writer for trip reports.
//!
//! Uses the standard Helvetica fonts with WinAnsi encoding, so no font data
//! is embedded. Characters outside Latin-1 are replaced.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;

use super::report::{Report, Table, build_report};
use super::{ExportError, TripExporter};
use crate::db::{Booking, Trip};
use crate::i18n::Translator;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 72.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const TITLE_SIZE: f32 = 20.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 10.0;
const TABLE_SIZE: f32 = 8.0;
const ROW_HEIGHT: f32 = 14.0;

/// Map text to WinAnsi bytes and escape it for a PDF string literal.
fn encode_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '→' => out.push_str("->"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            '\n' | '\r' | '\t' => out.push(' '),
            c if (c as u32) < 0x20 => {}
            c if c.is_ascii() => out.push(c),
            // Latin-1 matches WinAnsi in this range
            c if (0xA0..=0xFF).contains(&(c as u32)) => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            _ => out.push('?'),
        }
    }
    out
}

/// Approximate Helvetica advance width, good enough for truncating cells.
fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5
}

fn truncate(text: &str, size: f32, width: f32) -> String {
    if text_width(text, size) <= width {
        return text.to_string();
    }
    let max_chars = ((width / (size * 0.5)) as usize).saturating_sub(3);
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Page-by-page content stream builder with a top-down cursor.
struct PdfDocument {
    pages: Vec<String>,
    current: String,
    y: f32,
}

impl PdfDocument {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: String::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn new_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    /// Start a new page unless `height` still fits above the bottom margin.
    fn ensure_space(&mut self, height: f32) {
        if self.y - height < MARGIN {
            self.new_page();
        }
    }

    fn text_at(&mut self, x: f32, y: f32, font: Font, size: f32, text: &str) {
        let _ = writeln!(
            self.current,
            "BT /{} {} Tf {:.2} {:.2} Td ({}) Tj ET",
            font.resource(),
            size,
            x,
            y,
            encode_text(text)
        );
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, gray: f32) {
        let _ = writeln!(
            self.current,
            "q {gray:.2} g {x:.2} {y:.2} {w:.2} {h:.2} re f Q"
        );
    }

    fn line(&mut self, font: Font, size: f32, text: &str) {
        let height = size * 1.4;
        self.ensure_space(height);
        self.y -= height;
        self.text_at(MARGIN, self.y, font, size, text);
    }

    /// Wrap a paragraph on word boundaries.
    fn paragraph(&mut self, font: Font, size: f32, text: &str) {
        let mut line = String::new();
        for word in text.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if text_width(&candidate, size) > CONTENT_WIDTH && !line.is_empty() {
                self.line(font, size, &line);
                line = word.to_string();
            } else {
                line = candidate;
            }
        }
        if !line.is_empty() {
            self.line(font, size, &line);
        }
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn table_row(&mut self, cells: &[String], widths: &[f32], font: Font, fill: Option<f32>) {
        self.ensure_space(ROW_HEIGHT);
        self.y -= ROW_HEIGHT;
        if let Some(gray) = fill {
            self.fill_rect(MARGIN, self.y - 3.0, CONTENT_WIDTH, ROW_HEIGHT, gray);
        }
        let mut x = MARGIN + 3.0;
        for (cell, width) in cells.iter().zip(widths) {
            let text = truncate(cell, TABLE_SIZE, width - 6.0);
            let y = self.y;
            self.text_at(x, y, font, TABLE_SIZE, &text);
            x += width;
        }
    }

    fn table(&mut self, table: &Table, widths: &[f32]) {
        self.table_row(&table.header, widths, Font::Bold, Some(0.85));
        for (i, row) in table.rows.iter().enumerate() {
            let fill = (i % 2 == 1).then_some(0.96);
            self.table_row(row, widths, Font::Regular, fill);
        }
        if let Some(total) = &table.total {
            self.table_row(total, widths, Font::Bold, Some(0.85));
        }
    }

    /// Serialize all pages into a complete PDF file.
    fn finish(mut self) -> Vec<u8> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.new_page();
        }

        let page_count = self.pages.len();
        let mut objects: Vec<String> = Vec::with_capacity(4 + 2 * page_count);

        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 5 + 2 * i)).collect();
        objects.push(format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            page_count
        ));
        objects.push(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        );
        objects.push(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
                .to_string(),
        );
        for (i, content) in self.pages.iter().enumerate() {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH,
                PAGE_HEIGHT,
                6 + 2 * i
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}endstream",
                content.len(),
                content
            ));
        }

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            // Content is ASCII after encoding, so byte and char offsets agree
            offsets.push(out.len());
            let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, body);
        }

        let xref_offset = out.len();
        let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = write!(out, "{:010} 00000 n \n", offset);
        }
        let _ = write!(
            out,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        );
        out.into_bytes()
    }
}

/// Lay out a report on A4 pages.
pub fn render_report(report: &Report) -> Vec<u8> {
    let mut doc = PdfDocument::new();

    doc.paragraph(Font::Bold, TITLE_SIZE, &report.title);
    doc.gap(12.0);

    let half = CONTENT_WIDTH / 2.0;
    doc.table(&report.details, &[half * 0.6, CONTENT_WIDTH - half * 0.6]);
    doc.gap(18.0);

    doc.line(Font::Bold, HEADING_SIZE, &report.bookings_heading);
    doc.gap(4.0);
    match &report.bookings {
        Some(table) => {
            // Type, Title, Date, Status, Location, Price, Confirmation
            let widths = [0.12, 0.20, 0.11, 0.11, 0.18, 0.13, 0.15].map(|w| w * CONTENT_WIDTH);
            doc.table(table, &widths);
        }
        None => doc.line(Font::Regular, BODY_SIZE, &report.no_bookings),
    }

    if let Some(stats) = &report.statistics {
        doc.gap(18.0);
        doc.line(Font::Bold, HEADING_SIZE, &report.statistics_heading);
        doc.gap(4.0);
        doc.table(stats, &[half, half]);
    }

    doc.gap(24.0);
    doc.line(Font::Regular, TABLE_SIZE, &report.footer);

    doc.finish()
}

/// Exports a trip as a PDF report.
pub struct PdfExporter {
    translator: Arc<Translator>,
}

impl PdfExporter {
    pub fn new(translator: Arc<Translator>) -> Self {
        Self { translator }
    }
}

impl TripExporter for PdfExporter {
    fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    fn file_extension(&self) -> &'static str {
        "pdf"
    }

    fn export(&self, trip: &Trip, bookings: &[Booking], language: &str) -> Result<Vec<u8>, ExportError> {
        if trip.fields.name.trim().is_empty() {
            return Err(ExportError::InvalidTrip("trip has no name".to_string()));
        }
        let now = Utc::now().naive_utc();
        let report = build_report(&self.translator, trip, bookings, language, &now);
        Ok(render_report(&report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::report::tests::{sample_booking, sample_trip};

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_encode_text() {
        assert_eq!(encode_text("JFK → CDG"), "JFK -> CDG");
        assert_eq!(encode_text("a (b) \\c"), "a \\(b\\) \\\\c");
        assert_eq!(encode_text("Título"), "T\\355tulo");
        assert_eq!(encode_text("東京"), "??");
    }

    #[test]
    fn test_pdf_structure() {
        let exporter = PdfExporter::new(Arc::new(Translator::new()));
        let bytes = exporter.export(&sample_trip(), &[], "en").unwrap();
        let text = as_text(&bytes);

        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("(Trip Report: Paris) Tj"));
        assert!(text.contains("(No bookings found for this trip.) Tj"));

        // startxref points at the xref table
        let start = text.rfind("startxref\n").unwrap() + "startxref\n".len();
        let offset: usize = text[start..].lines().next().unwrap().parse().unwrap();
        assert!(text[offset..].starts_with("xref\n"));

        // Each xref entry points at its object
        let entries: Vec<&str> = text[offset..].lines().skip(3).take(5).collect();
        for (i, entry) in entries.iter().enumerate() {
            let obj_offset: usize = entry[..10].parse().unwrap();
            assert!(text[obj_offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn test_long_report_spans_pages() {
        let bookings: Vec<Booking> = (0..120)
            .map(|i| {
                sample_booking(serde_json::json!({
                    "title": format!("Dinner {i}"),
                    "booking_type": "restaurant",
                    "start_date": "2024-06-02T20:00:00",
                    "price": 30.0,
                }))
            })
            .collect();
        let exporter = PdfExporter::new(Arc::new(Translator::new()));
        let text = as_text(&exporter.export(&sample_trip(), &bookings, "en").unwrap());

        let count_start = text.find("/Count ").unwrap() + "/Count ".len();
        let count: usize = text[count_start..]
            .split_whitespace()
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!(count > 1);
        assert_eq!(text.matches("/Type /Page ").count(), count);
        assert!(text.contains("(Dinner 119) Tj"));
    }

    #[test]
    fn test_spanish_labels() {
        let exporter = PdfExporter::new(Arc::new(Translator::new()));
        let bookings = vec![sample_booking(serde_json::json!({
            "title": "JFK → CDG",
            "booking_type": "flight",
            "start_date": "2024-06-01T08:00:00",
            "departure_location": "JFK",
            "arrival_location": "CDG",
        }))];
        let text = as_text(&exporter.export(&sample_trip(), &bookings, "es").unwrap());

        assert!(text.contains("(Informe del viaje: Paris) Tj"));
        assert!(text.contains("(Vuelo) Tj"));
        assert!(text.contains("(JFK -> CDG) Tj"));
        assert!(text.contains("(01/06/2024) Tj"));
    }
}
