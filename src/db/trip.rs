use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct TripStore {
    pool: SqlitePool,
}

/// Who owns a trip. Exactly one of a user or a guest session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    User(i64),
    Guest(String),
}

impl Owner {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Owner::User(id) => Some(*id),
            Owner::Guest(_) => None,
        }
    }

    pub fn guest_session_id(&self) -> Option<&str> {
        match self {
            Owner::User(_) => None,
            Owner::Guest(session_id) => Some(session_id),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    #[default]
    Planning,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub const ALL: [TripStatus; 5] = [
        TripStatus::Planning,
        TripStatus::Confirmed,
        TripStatus::InProgress,
        TripStatus::Completed,
        TripStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Planning => "planning",
            TripStatus::Confirmed => "confirmed",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_traveler_count() -> i64 {
    1
}

/// The caller-editable part of a trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripFields {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TripStatus,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub primary_destination: Option<String>,
    #[serde(default)]
    pub destinations: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_traveler_count")]
    pub traveler_count: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trip {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: String,
    #[serde(skip)]
    pub owner: Owner,
    /// Public UUID of the owning user; absent for guest trips.
    pub owner_id: Option<String>,
    #[serde(flatten)]
    pub fields: TripFields,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: i64,
    uuid: String,
    user_id: Option<i64>,
    guest_session_id: Option<String>,
    owner_uuid: Option<String>,
    name: String,
    description: Option<String>,
    status: String,
    start_date: String,
    end_date: Option<String>,
    primary_destination: Option<String>,
    destinations: Option<String>,
    budget: Option<f64>,
    currency: String,
    traveler_count: i64,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TripRow> for Trip {
    type Error = sqlx::Error;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        let owner = match (row.user_id, row.guest_session_id) {
            (Some(user_id), None) => Owner::User(user_id),
            (None, Some(session_id)) => Owner::Guest(session_id),
            _ => {
                return Err(sqlx::Error::Decode(
                    format!("trip {} must have exactly one owner", row.uuid).into(),
                ));
            }
        };
        Ok(Self {
            id: row.id,
            uuid: row.uuid,
            owner,
            owner_id: row.owner_uuid,
            fields: TripFields {
                name: row.name,
                description: row.description,
                status: TripStatus::parse(&row.status).unwrap_or_default(),
                start_date: row.start_date,
                end_date: row.end_date,
                primary_destination: row.primary_destination,
                destinations: row.destinations,
                budget: row.budget,
                currency: row.currency,
                traveler_count: row.traveler_count,
                notes: row.notes,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn collect(rows: Vec<TripRow>) -> Result<Vec<Trip>, sqlx::Error> {
    rows.into_iter().map(Trip::try_from).collect()
}

const TRIP_SELECT: &str = "SELECT t.id, t.uuid, t.user_id, t.guest_session_id, u.uuid AS owner_uuid,
        t.name, t.description, t.status, t.start_date, t.end_date, t.primary_destination,
        t.destinations, t.budget, t.currency, t.traveler_count, t.notes, t.created_at, t.updated_at
     FROM trips t LEFT JOIN users u ON u.id = t.user_id";

impl TripStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a trip owned by `owner`.
    pub async fn create(&self, owner: &Owner, fields: &TripFields) -> Result<Trip, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO trips (uuid, user_id, guest_session_id, name, description, status,
                start_date, end_date, primary_destination, destinations, budget, currency,
                traveler_count, notes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(owner.user_id())
        .bind(owner.guest_session_id())
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.status.as_str())
        .bind(&fields.start_date)
        .bind(&fields.end_date)
        .bind(&fields.primary_destination)
        .bind(&fields.destinations)
        .bind(fields.budget)
        .bind(&fields.currency)
        .bind(fields.traveler_count)
        .bind(&fields.notes)
        .execute(&self.pool)
        .await?;

        let row: TripRow = sqlx::query_as(sqlx::AssertSqlSafe(format!("{TRIP_SELECT} WHERE t.id = ?")))
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    /// Get a trip by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Trip>, sqlx::Error> {
        let row: Option<TripRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!("{TRIP_SELECT} WHERE t.id = ?")))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Trip::try_from).transpose()
    }

    /// Get a trip by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Trip>, sqlx::Error> {
        let row: Option<TripRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!("{TRIP_SELECT} WHERE t.uuid = ?")))
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Trip::try_from).transpose()
    }

    /// List trips owned by `owner`, newest first.
    pub async fn list_by_owner(
        &self,
        owner: &Owner,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Trip>, sqlx::Error> {
        let rows: Vec<TripRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "{TRIP_SELECT} WHERE t.user_id = ? OR t.guest_session_id = ?
             ORDER BY t.created_at DESC, t.id DESC LIMIT ? OFFSET ?"
        )))
        .bind(owner.user_id())
        .bind(owner.guest_session_id())
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    /// List trips shared with an email address, newest first.
    /// The email must already be normalized.
    pub async fn list_shared_with(&self, email: &str) -> Result<Vec<Trip>, sqlx::Error> {
        let rows: Vec<TripRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "{TRIP_SELECT} JOIN shared_trips s ON s.trip_id = t.id
             WHERE s.email = ? ORDER BY t.created_at DESC, t.id DESC"
        )))
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    /// Overwrite the editable fields of a trip.
    pub async fn update(&self, id: i64, fields: &TripFields) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE trips SET name = ?, description = ?, status = ?, start_date = ?, end_date = ?,
                primary_destination = ?, destinations = ?, budget = ?, currency = ?,
                traveler_count = ?, notes = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.status.as_str())
        .bind(&fields.start_date)
        .bind(&fields.end_date)
        .bind(&fields.primary_destination)
        .bind(&fields.destinations)
        .bind(fields.budget)
        .bind(&fields.currency)
        .bind(fields.traveler_count)
        .bind(&fields.notes)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_status(&self, id: i64, status: TripStatus) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE trips SET status = ?, updated_at = datetime('now') WHERE id = ?")
                .bind(status.as_str())
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a trip together with its bookings, todos and share grants.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for table in ["bookings", "todos", "shared_trips"] {
            sqlx::query(sqlx::AssertSqlSafe(format!("DELETE FROM {table} WHERE trip_id = ?")))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        let result = sqlx::query("DELETE FROM trips WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, NewUser};

    use super::*;

    fn fields(name: &str) -> TripFields {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "start_date": "2024-06-01T00:00:00",
        }))
        .unwrap()
    }

    #[test]
    fn test_fields_defaults() {
        let f = fields("Paris");
        assert_eq!(f.status, TripStatus::Planning);
        assert_eq!(f.currency, "USD");
        assert_eq!(f.traveler_count, 1);
        assert!(f.budget.is_none());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(TripStatus::parse("in_progress"), Some(TripStatus::InProgress));
        assert_eq!(TripStatus::parse("cancelled"), Some(TripStatus::Cancelled));
        assert_eq!(TripStatus::parse("archived"), None);
        for status in TripStatus::ALL {
            assert_eq!(TripStatus::parse(status.as_str()), Some(status));
        }
    }

    #[tokio::test]
    async fn test_create_sets_exactly_one_owner() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .upsert(&NewUser::new("g-1", "alice@example.com", "Alice"))
            .await
            .unwrap();

        let user_trip = db
            .trips()
            .create(&Owner::User(user.id), &fields("Rome"))
            .await
            .unwrap();
        assert_eq!(user_trip.owner, Owner::User(user.id));
        assert_eq!(user_trip.owner_id.as_deref(), Some(user.uuid.as_str()));

        let guest_trip = db
            .trips()
            .create(&Owner::Guest("session-a".to_string()), &fields("Paris"))
            .await
            .unwrap();
        assert_eq!(guest_trip.owner, Owner::Guest("session-a".to_string()));
        assert!(guest_trip.owner_id.is_none());

        let (bad,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM trips WHERE (user_id IS NULL) = (guest_session_id IS NULL)",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(bad, 0);
    }

    #[tokio::test]
    async fn test_list_by_owner_is_scoped_and_newest_first() {
        let db = Database::open(":memory:").await.unwrap();
        let trips = db.trips();
        let a = Owner::Guest("session-a".to_string());
        let b = Owner::Guest("session-b".to_string());

        trips.create(&a, &fields("First")).await.unwrap();
        trips.create(&a, &fields("Second")).await.unwrap();
        trips.create(&b, &fields("Other")).await.unwrap();

        let listed = trips.list_by_owner(&a, 0, 100).await.unwrap();
        let names: Vec<_> = listed.iter().map(|t| t.fields.name.as_str()).collect();
        assert_eq!(names, vec!["Second", "First"]);

        let page = trips.list_by_owner(&a, 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].fields.name, "First");

        let none = trips
            .list_by_owner(&Owner::Guest("session-c".to_string()), 0, 100)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_status() {
        let db = Database::open(":memory:").await.unwrap();
        let trips = db.trips();
        let trip = trips
            .create(&Owner::Guest("s".to_string()), &fields("Lisbon"))
            .await
            .unwrap();

        let mut changed = trip.fields.clone();
        changed.budget = Some(1500.0);
        changed.primary_destination = Some("Lisbon".to_string());
        assert!(trips.update(trip.id, &changed).await.unwrap());

        assert!(trips.set_status(trip.id, TripStatus::Completed).await.unwrap());
        // Any status can follow any other
        assert!(trips.set_status(trip.id, TripStatus::Planning).await.unwrap());

        let stored = trips.get_by_uuid(&trip.uuid).await.unwrap().unwrap();
        assert_eq!(stored.fields.budget, Some(1500.0));
        assert_eq!(stored.fields.status, TripStatus::Planning);
    }

    #[tokio::test]
    async fn test_delete_removes_grants() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .upsert(&NewUser::new("g-1", "alice@example.com", "Alice"))
            .await
            .unwrap();
        let trip = db
            .trips()
            .create(&Owner::User(user.id), &fields("Oslo"))
            .await
            .unwrap();
        db.shares()
            .create(trip.id, "bob@example.com", &user.email)
            .await
            .unwrap();

        assert!(db.trips().delete(trip.id).await.unwrap());
        assert!(db.trips().get_by_id(trip.id).await.unwrap().is_none());
        let (grants,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shared_trips")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(grants, 0);
        assert!(!db.trips().delete(trip.id).await.unwrap());
    }
}
