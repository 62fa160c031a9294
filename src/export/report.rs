//! Localized trip report content, independent of the output format.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::api::DATETIME_FORMAT;
use crate::db::{Booking, BookingStatus, BookingType, Trip, TripStatus};
use crate::i18n::Translator;

/// A table with a header row, body rows and an optional highlighted total row.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub title: String,
    /// Two-column table: label, value
    pub details: Table,
    pub bookings_heading: String,
    /// `None` when the trip has no bookings
    pub bookings: Option<Table>,
    pub no_bookings: String,
    pub statistics_heading: String,
    pub statistics: Option<Table>,
    pub footer: String,
}

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub fn trip_status_label(status: TripStatus) -> &'static str {
    match status {
        TripStatus::Planning => "Planning",
        TripStatus::Confirmed => "Confirmed",
        TripStatus::InProgress => "In Progress",
        TripStatus::Completed => "Completed",
        TripStatus::Cancelled => "Cancelled",
    }
}

pub fn booking_status_label(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "Pending",
        BookingStatus::Confirmed => "Confirmed",
        BookingStatus::Cancelled => "Cancelled",
    }
}

pub fn booking_type_label(booking_type: BookingType) -> &'static str {
    match booking_type {
        BookingType::Flight => "Flight",
        BookingType::Accommodation => "Accommodation",
        BookingType::CarRental => "Car Rental",
        BookingType::Activity => "Activity",
        BookingType::Restaurant => "Restaurant",
        BookingType::Other => "Other",
    }
}

fn parse_stored(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// Print a stored value as-is when it is not in storage format.
fn long_date(t: &Translator, value: &str, lang: &str) -> String {
    match parse_stored(value) {
        Some(dt) => format_long_date(t, &dt, lang),
        None => value.to_string(),
    }
}

fn format_long_date(t: &Translator, dt: &NaiveDateTime, lang: &str) -> String {
    let month = t.translate(MONTHS[dt.month0() as usize], lang);
    match lang {
        "es" => format!("{:02} de {} de {}", dt.day(), month, dt.year()),
        _ => format!("{} {:02}, {}", month, dt.day(), dt.year()),
    }
}

fn short_date(value: &str, lang: &str) -> String {
    match parse_stored(value) {
        Some(dt) if lang == "es" => dt.format("%d/%m/%Y").to_string(),
        Some(dt) => dt.format("%m/%d/%Y").to_string(),
        None => value.to_string(),
    }
}

fn generated_line(t: &Translator, now: &NaiveDateTime, lang: &str) -> String {
    let date = format_long_date(t, now, lang);
    match lang {
        "es" => format!(
            "{} {} a las {:02}:{:02}",
            t.translate("Generated on", lang),
            date,
            now.hour(),
            now.minute()
        ),
        _ => {
            let (pm, hour) = now.hour12();
            format!(
                "{} {} at {:02}:{:02} {}",
                t.translate("Generated on", lang),
                date,
                hour,
                now.minute(),
                if pm { "PM" } else { "AM" }
            )
        }
    }
}

fn money(currency: &str, amount: f64) -> String {
    format!("{} {:.2}", currency, amount)
}

/// "dep → arr", either end alone, the address, or nothing.
pub fn booking_location(booking: &Booking) -> Option<String> {
    let d = &booking.fields.details;
    let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
    match (non_empty(&d.departure_location), non_empty(&d.arrival_location)) {
        (Some(dep), Some(arr)) => Some(format!("{} → {}", dep, arr)),
        (Some(dep), None) => Some(dep),
        (None, Some(arr)) => Some(arr),
        (None, None) => non_empty(&d.address),
    }
}

/// Sum of booking prices. Prices are added as-is, without currency conversion.
pub fn total_cost(bookings: &[Booking]) -> f64 {
    bookings
        .iter()
        .filter_map(|b| b.fields.details.price)
        .sum()
}

/// Build the report for a trip. `now` is the generation time shown in the footer.
pub fn build_report(
    t: &Translator,
    trip: &Trip,
    bookings: &[Booking],
    lang: &str,
    now: &NaiveDateTime,
) -> Report {
    let tr = |s: &str| t.translate(s, lang).to_string();
    let na = tr("N/A");
    let or_na = |v: &Option<String>| {
        v.as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
            .unwrap_or_else(|| na.clone())
    };
    let f = &trip.fields;

    let mut details = vec![
        vec![tr("Name"), f.name.clone()],
        vec![tr("Description"), or_na(&f.description)],
        vec![tr("Destination"), or_na(&f.primary_destination)],
        vec![tr("Start Date"), long_date(t, &f.start_date, lang)],
        vec![
            tr("End Date"),
            f.end_date
                .as_deref()
                .map(|d| long_date(t, d, lang))
                .unwrap_or_else(|| na.clone()),
        ],
        vec![tr("Status"), tr(trip_status_label(f.status))],
        vec![
            tr("Budget"),
            f.budget
                .filter(|b| *b != 0.0)
                .map(|b| money(&f.currency, b))
                .unwrap_or_else(|| na.clone()),
        ],
        vec![tr("Travelers"), f.traveler_count.to_string()],
    ];
    if let Some(destinations) = f.destinations.as_deref().filter(|s| !s.trim().is_empty()) {
        let joined: Vec<&str> = destinations
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        details.push(vec![tr("All Destinations"), joined.join(", ")]);
    }
    if let Some(notes) = f.notes.as_deref().filter(|s| !s.trim().is_empty()) {
        details.push(vec![tr("Notes"), notes.to_string()]);
    }

    let total = total_cost(bookings);

    let (booking_table, statistics) = if bookings.is_empty() {
        (None, None)
    } else {
        let rows = bookings
            .iter()
            .map(|b| {
                let d = &b.fields.details;
                vec![
                    tr(booking_type_label(b.fields.booking_type)),
                    b.fields.title.clone(),
                    short_date(&b.fields.start_date, lang),
                    tr(booking_status_label(b.fields.status)),
                    booking_location(b).unwrap_or_else(|| na.clone()),
                    d.price
                        .filter(|p| *p != 0.0)
                        .map(|p| money(&b.fields.currency, p))
                        .unwrap_or_else(|| na.clone()),
                    or_na(&d.confirmation_number),
                ]
            })
            .collect();

        let table = Table {
            header: ["Type", "Title", "Date", "Status", "Location", "Price", "Confirmation"]
                .iter()
                .map(|h| tr(h))
                .collect(),
            rows,
            total: Some(vec![
                tr("TOTAL"),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                money(&f.currency, total),
                String::new(),
            ]),
        };

        let count = |status: BookingStatus| {
            bookings
                .iter()
                .filter(|b| b.fields.status == status)
                .count()
                .to_string()
        };
        let mut stats = vec![
            vec![tr("Total Bookings"), bookings.len().to_string()],
            vec![tr("Confirmed"), count(BookingStatus::Confirmed)],
            vec![tr("Pending"), count(BookingStatus::Pending)],
            vec![tr("Cancelled"), count(BookingStatus::Cancelled)],
            vec![tr("Total Cost"), money(&f.currency, total)],
        ];
        for booking_type in BookingType::ALL {
            let n = bookings
                .iter()
                .filter(|b| b.fields.booking_type == booking_type)
                .count();
            if n > 0 {
                stats.push(vec![tr(booking_type_label(booking_type)), n.to_string()]);
            }
        }

        (
            Some(table),
            Some(Table {
                header: vec![tr("Trip Statistics"), String::new()],
                rows: stats,
                total: None,
            }),
        )
    };

    Report {
        title: format!("{}: {}", tr("Trip Report"), f.name),
        details: Table {
            header: vec![tr("Trip Details"), String::new()],
            rows: details,
            total: None,
        },
        bookings_heading: tr("Bookings"),
        bookings: booking_table,
        no_bookings: tr("No bookings found for this trip."),
        statistics_heading: tr("Trip Statistics"),
        statistics,
        footer: generated_line(t, now, lang),
    }
}
