//! Trip export formats.

mod pdf;
pub mod report;

pub use pdf::{PdfExporter, render_report};

use crate::db::{Booking, Trip};

#[derive(Debug)]
pub enum ExportError {
    InvalidTrip(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::InvalidTrip(msg) => write!(f, "Invalid trip: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {}

/// Renders a trip and its bookings into a downloadable document.
pub trait TripExporter: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn file_extension(&self) -> &'static str;
    fn export(&self, trip: &Trip, bookings: &[Booking], language: &str) -> Result<Vec<u8>, ExportError>;
}

/// Base letter of an accented Latin letter, so names like "Málaga" stay readable.
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ç' => 'c',
        'Ç' => 'C',
        other => other,
    }
}

/// Download name: `trip-{name with spaces as underscores}-{first 8 chars of id}.{ext}`.
/// The result is plain ASCII so it fits a header value; other characters are dropped.
pub fn export_filename(trip: &Trip, extension: &str) -> String {
    let name: String = trip
        .fields
        .name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { fold_accent(c) })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    let short_id: String = trip.uuid.chars().take(8).collect();
    format!("trip-{}-{}.{}", name, short_id, extension)
}
