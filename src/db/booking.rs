use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::Owner;

#[derive(Clone)]
pub struct BookingStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    Flight,
    Accommodation,
    CarRental,
    Activity,
    Restaurant,
    Other,
}

impl BookingType {
    pub const ALL: [BookingType; 6] = [
        BookingType::Flight,
        BookingType::Accommodation,
        BookingType::CarRental,
        BookingType::Activity,
        BookingType::Restaurant,
        BookingType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Flight => "flight",
            BookingType::Accommodation => "accommodation",
            BookingType::CarRental => "car_rental",
            BookingType::Activity => "activity",
            BookingType::Restaurant => "restaurant",
            BookingType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 3] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

/// Optional booking attributes, some only meaningful for one booking type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookingDetails {
    #[serde(default)]
    pub departure_location: Option<String>,
    #[serde(default)]
    pub arrival_location: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub confirmation_number: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    // Flight
    #[serde(default)]
    pub flight_number: Option<String>,
    #[serde(default)]
    pub airline: Option<String>,
    #[serde(default)]
    pub departure_terminal: Option<String>,
    #[serde(default)]
    pub arrival_terminal: Option<String>,
    #[serde(default)]
    pub seat_number: Option<String>,
    // Accommodation
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub guests_count: Option<i64>,
    #[serde(default)]
    pub check_in_time: Option<String>,
    #[serde(default)]
    pub check_out_time: Option<String>,
    // Car rental
    #[serde(default)]
    pub car_model: Option<String>,
    #[serde(default)]
    pub pickup_location: Option<String>,
    #[serde(default)]
    pub return_location: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// The caller-editable part of a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingFields {
    #[serde(default)]
    pub title: String,
    pub booking_type: BookingType,
    #[serde(default)]
    pub status: BookingStatus,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(flatten)]
    pub details: BookingDetails,
}

/// Title shown for a flight: "{departure} → {arrival}".
/// `None` unless the type is flight and both ends are non-empty.
pub fn flight_title(
    booking_type: BookingType,
    departure: Option<&str>,
    arrival: Option<&str>,
) -> Option<String> {
    if booking_type != BookingType::Flight {
        return None;
    }
    let departure = departure.map(str::trim).filter(|s| !s.is_empty())?;
    let arrival = arrival.map(str::trim).filter(|s| !s.is_empty())?;
    Some(format!("{departure} → {arrival}"))
}

impl BookingFields {
    /// Replace the title of a flight with its derived route title.
    pub fn apply_flight_title(&mut self) {
        if let Some(title) = flight_title(
            self.booking_type,
            self.details.departure_location.as_deref(),
            self.details.arrival_location.as_deref(),
        ) {
            self.title = title;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: String,
    #[serde(skip)]
    pub trip_id: i64,
    #[serde(rename = "trip_id")]
    pub trip_uuid: String,
    #[serde(flatten)]
    pub fields: BookingFields,
    pub booking_date: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    uuid: String,
    trip_id: i64,
    trip_uuid: String,
    title: String,
    booking_type: String,
    status: String,
    start_date: String,
    end_date: Option<String>,
    currency: String,
    #[sqlx(flatten)]
    details: BookingDetails,
    booking_date: String,
    created_at: String,
    updated_at: String,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            trip_id: row.trip_id,
            trip_uuid: row.trip_uuid,
            fields: BookingFields {
                title: row.title,
                booking_type: BookingType::parse(&row.booking_type).unwrap_or(BookingType::Other),
                status: BookingStatus::parse(&row.status).unwrap_or_default(),
                start_date: row.start_date,
                end_date: row.end_date,
                currency: row.currency,
                details: row.details,
            },
            booking_date: row.booking_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Optional filters for listing a caller's bookings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingFilter {
    pub booking_type: Option<BookingType>,
    pub status: Option<BookingStatus>,
}

const BOOKING_SELECT: &str =
    "SELECT b.*, t.uuid AS trip_uuid FROM bookings b JOIN trips t ON t.id = b.trip_id";

/// Editable columns, in the order `bind_fields!` binds them.
const FIELD_COLUMNS: [&str; 28] = [
    "title",
    "booking_type",
    "status",
    "start_date",
    "end_date",
    "currency",
    "departure_location",
    "arrival_location",
    "address",
    "price",
    "confirmation_number",
    "provider",
    "description",
    "notes",
    "contact_email",
    "contact_phone",
    "flight_number",
    "airline",
    "departure_terminal",
    "arrival_terminal",
    "seat_number",
    "room_type",
    "guests_count",
    "check_in_time",
    "check_out_time",
    "car_model",
    "pickup_location",
    "return_location",
];

macro_rules! bind_fields {
    ($query:expr, $fields:expr) => {{
        let f = $fields;
        let d = &f.details;
        $query
            .bind(&f.title)
            .bind(f.booking_type.as_str())
            .bind(f.status.as_str())
            .bind(&f.start_date)
            .bind(&f.end_date)
            .bind(&f.currency)
            .bind(&d.departure_location)
            .bind(&d.arrival_location)
            .bind(&d.address)
            .bind(d.price)
            .bind(&d.confirmation_number)
            .bind(&d.provider)
            .bind(&d.description)
            .bind(&d.notes)
            .bind(&d.contact_email)
            .bind(&d.contact_phone)
            .bind(&d.flight_number)
            .bind(&d.airline)
            .bind(&d.departure_terminal)
            .bind(&d.arrival_terminal)
            .bind(&d.seat_number)
            .bind(&d.room_type)
            .bind(d.guests_count)
            .bind(&d.check_in_time)
            .bind(&d.check_out_time)
            .bind(&d.car_model)
            .bind(&d.pickup_location)
            .bind(&d.return_location)
    }};
}

impl BookingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a booking in a trip.
    pub async fn create(&self, trip_id: i64, fields: &BookingFields) -> Result<Booking, sqlx::Error> {
        let sql = format!(
            "INSERT INTO bookings (uuid, trip_id, {}) VALUES (?, ?, {})",
            FIELD_COLUMNS.join(", "),
            ["?"; FIELD_COLUMNS.len()].join(", ")
        );
        let query = sqlx::query(sqlx::AssertSqlSafe(sql.as_str()))
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(trip_id);
        let result = bind_fields!(query, fields).execute(&self.pool).await?;

        let row: BookingRow = sqlx::query_as(sqlx::AssertSqlSafe(format!("{BOOKING_SELECT} WHERE b.id = ?")))
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    /// Get a booking by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Booking>, sqlx::Error> {
        let row: Option<BookingRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!("{BOOKING_SELECT} WHERE b.uuid = ?")))
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Booking::from))
    }

    /// List the bookings of one trip, in chronological order.
    pub async fn list_by_trip(&self, trip_id: i64) -> Result<Vec<Booking>, sqlx::Error> {
        let rows: Vec<BookingRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "{BOOKING_SELECT} WHERE b.trip_id = ? ORDER BY b.start_date, b.id"
        )))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }

    /// List bookings across every trip `owner` owns.
    pub async fn list_by_owner(
        &self,
        owner: &Owner,
        filter: BookingFilter,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Booking>, sqlx::Error> {
        let booking_type = filter.booking_type.map(|t| t.as_str());
        let status = filter.status.map(|s| s.as_str());
        let rows: Vec<BookingRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "{BOOKING_SELECT}
             WHERE (t.user_id = ? OR t.guest_session_id = ?)
               AND (? IS NULL OR b.booking_type = ?)
               AND (? IS NULL OR b.status = ?)
             ORDER BY b.start_date, b.id LIMIT ? OFFSET ?"
        )))
        .bind(owner.user_id())
        .bind(owner.guest_session_id())
        .bind(booking_type)
        .bind(booking_type)
        .bind(status)
        .bind(status)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }

    /// Overwrite the editable fields of a booking and its parent trip.
    pub async fn update(
        &self,
        id: i64,
        trip_id: i64,
        fields: &BookingFields,
    ) -> Result<bool, sqlx::Error> {
        let assignments: Vec<String> = FIELD_COLUMNS.iter().map(|c| format!("{c} = ?")).collect();
        let sql = format!(
            "UPDATE bookings SET trip_id = ?, {}, updated_at = datetime('now') WHERE id = ?",
            assignments.join(", ")
        );
        let query = sqlx::query(sqlx::AssertSqlSafe(sql.as_str())).bind(trip_id);
        let result = bind_fields!(query, fields)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a booking by ID.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
