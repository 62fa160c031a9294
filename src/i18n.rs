//! Interface and report translations.
//!
//! English strings are the catalog keys; a missing entry falls back to the key.

use std::collections::HashMap;

use axum::http::{HeaderMap, header};

use crate::auth::{LANG_COOKIE_NAME, get_cookie};

pub const DEFAULT_LANGUAGE: &str = "en";

pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "es"];

const SPANISH: &[(&str, &str)] = &[
    // Report headings and labels
    ("Trip Report", "Informe del viaje"),
    ("Trip Details", "Detalles del viaje"),
    ("Name", "Nombre"),
    ("Description", "Descripción"),
    ("Destination", "Destino"),
    ("All Destinations", "Todos los destinos"),
    ("Start Date", "Fecha de inicio"),
    ("End Date", "Fecha de fin"),
    ("Status", "Estado"),
    ("Budget", "Presupuesto"),
    ("Travelers", "Viajeros"),
    ("Notes", "Notas"),
    ("Bookings", "Reservas"),
    ("Type", "Tipo"),
    ("Title", "Título"),
    ("Date", "Fecha"),
    ("Location", "Ubicación"),
    ("Price", "Precio"),
    ("Confirmation", "Confirmación"),
    ("TOTAL", "TOTAL"),
    ("No bookings found for this trip.", "No hay reservas para este viaje."),
    ("Trip Statistics", "Estadísticas del viaje"),
    ("Total Bookings", "Total de reservas"),
    ("Total Cost", "Coste total"),
    ("Generated on", "Generado el"),
    ("N/A", "N/D"),
    // Trip statuses
    ("Planning", "Planificación"),
    ("Confirmed", "Confirmado"),
    ("In Progress", "En curso"),
    ("Completed", "Completado"),
    ("Cancelled", "Cancelado"),
    ("Pending", "Pendiente"),
    // Booking types
    ("Flight", "Vuelo"),
    ("Accommodation", "Alojamiento"),
    ("Car Rental", "Alquiler de coche"),
    ("Activity", "Actividad"),
    ("Restaurant", "Restaurante"),
    ("Other", "Otro"),
    // Messages
    ("Language updated", "Idioma actualizado"),
    ("Successfully logged out", "Sesión cerrada correctamente"),
    // Months
    ("January", "enero"),
    ("February", "febrero"),
    ("March", "marzo"),
    ("April", "abril"),
    ("May", "mayo"),
    ("June", "junio"),
    ("July", "julio"),
    ("August", "agosto"),
    ("September", "septiembre"),
    ("October", "octubre"),
    ("November", "noviembre"),
    ("December", "diciembre"),
];

/// Translation catalogs for every supported language.
pub struct Translator {
    catalogs: HashMap<&'static str, HashMap<&'static str, &'static str>>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    pub fn new() -> Self {
        let mut catalogs = HashMap::new();
        catalogs.insert("es", SPANISH.iter().copied().collect());
        Self { catalogs }
    }

    /// Translate `text` into `language`, falling back to `text` itself.
    pub fn translate<'a>(&self, text: &'a str, language: &str) -> &'a str {
        self.catalogs
            .get(language)
            .and_then(|catalog| catalog.get(text).copied())
            .unwrap_or(text)
    }
}

pub fn is_supported(language: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&language)
}

/// Human-readable language names.
pub fn language_name(language: &str) -> Option<&'static str> {
    match language {
        "en" => Some("English"),
        "es" => Some("Español"),
        _ => None,
    }
}

/// Pick the supported language with the highest `q` from an Accept-Language value.
/// Ties keep header order.
pub fn detect_language(accept_language: Option<&str>) -> &'static str {
    let Some(header) = accept_language else {
        return DEFAULT_LANGUAGE;
    };

    let mut best: Option<(&'static str, f32)> = None;
    for item in header.split(',') {
        let mut parts = item.trim().split(';');
        let tag = parts.next().unwrap_or("").trim().to_lowercase();
        let quality = parts
            .find_map(|p| p.trim().strip_prefix("q="))
            .and_then(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        // q=0 marks a language as not acceptable
        if quality <= 0.0 {
            continue;
        }

        let code: String = tag.chars().take(2).collect();
        let Some(supported) = SUPPORTED_LANGUAGES.iter().find(|l| **l == code).copied() else {
            continue;
        };
        if best.is_none_or(|(_, q)| quality > q) {
            best = Some((supported, quality));
        }
    }

    best.map(|(language, _)| language).unwrap_or(DEFAULT_LANGUAGE)
}

/// Language for a request: `lang` cookie, then Accept-Language, then English.
pub fn request_language(headers: &HeaderMap) -> &'static str {
    if let Some(lang) = get_cookie(headers, LANG_COOKIE_NAME) {
        if let Some(supported) = SUPPORTED_LANGUAGES.iter().find(|l| **l == lang).copied() {
            return supported;
        }
    }
    detect_language(
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok()),
    )
}

/// Preferred language from a provider locale such as `es-419` or `en_GB`.
pub fn language_from_locale(locale: Option<&str>) -> &'static str {
    let code: String = locale
        .unwrap_or("")
        .chars()
        .take(2)
        .collect::<String>()
        .to_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|l| **l == code)
        .copied()
        .unwrap_or(DEFAULT_LANGUAGE)
}
