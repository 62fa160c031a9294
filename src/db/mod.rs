mod allowlist;
mod booking;
mod share;
mod todo;
mod trip;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use allowlist::AllowlistStore;
pub use booking::{
    Booking, BookingDetails, BookingFields, BookingFilter, BookingStatus, BookingStore,
    BookingType, flight_title,
};
pub use share::{ShareGrant, ShareStore, normalize_email};
pub use todo::{Todo, TodoCategory, TodoFields, TodoStore, completion_timestamp};
pub use trip::{Owner, Trip, TripFields, TripStatus, TripStore};
pub use user::{NewUser, User, UserStore};

/// Largest page size accepted by list endpoints.
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        if version < 2 {
            self.migrate_v2().await?;
        }

        if version < 3 {
            self.migrate_v3().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    google_id TEXT UNIQUE NOT NULL,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    name TEXT NOT NULL,
                    given_name TEXT,
                    family_name TEXT,
                    picture TEXT,
                    preferred_language TEXT NOT NULL DEFAULT 'en',
                    preferred_currency TEXT NOT NULL DEFAULT 'USD',
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    last_login TEXT
                )",
                "CREATE INDEX idx_users_uuid ON users(uuid)",
                "CREATE INDEX idx_users_google_id ON users(google_id)",
                // A trip belongs to exactly one of a user or a guest session.
                "CREATE TABLE trips (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT,
                    status TEXT NOT NULL DEFAULT 'planning',
                    user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                    guest_session_id TEXT,
                    start_date TEXT NOT NULL,
                    end_date TEXT,
                    primary_destination TEXT,
                    destinations TEXT,
                    budget REAL,
                    currency TEXT NOT NULL DEFAULT 'USD',
                    traveler_count INTEGER NOT NULL DEFAULT 1,
                    notes TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    CHECK ((user_id IS NULL) <> (guest_session_id IS NULL))
                )",
                "CREATE INDEX idx_trips_uuid ON trips(uuid)",
                "CREATE INDEX idx_trips_user_id ON trips(user_id)",
                "CREATE INDEX idx_trips_guest_session_id ON trips(guest_session_id)",
                "CREATE TABLE bookings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    trip_id INTEGER NOT NULL REFERENCES trips(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    booking_type TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending',
                    booking_date TEXT NOT NULL DEFAULT (datetime('now')),
                    start_date TEXT NOT NULL,
                    end_date TEXT,
                    departure_location TEXT,
                    arrival_location TEXT,
                    address TEXT,
                    price REAL,
                    currency TEXT NOT NULL DEFAULT 'USD',
                    confirmation_number TEXT,
                    provider TEXT,
                    description TEXT,
                    notes TEXT,
                    contact_email TEXT,
                    contact_phone TEXT,
                    flight_number TEXT,
                    airline TEXT,
                    departure_terminal TEXT,
                    arrival_terminal TEXT,
                    seat_number TEXT,
                    room_type TEXT,
                    guests_count INTEGER,
                    check_in_time TEXT,
                    check_out_time TEXT,
                    car_model TEXT,
                    pickup_location TEXT,
                    return_location TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_bookings_uuid ON bookings(uuid)",
                "CREATE INDEX idx_bookings_trip_id ON bookings(trip_id)",
                "CREATE TABLE todos (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    trip_id INTEGER NOT NULL REFERENCES trips(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    description TEXT,
                    category TEXT NOT NULL DEFAULT 'other',
                    completed INTEGER NOT NULL DEFAULT 0,
                    completed_at TEXT,
                    priority INTEGER NOT NULL DEFAULT 2,
                    due_date TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_todos_uuid ON todos(uuid)",
                "CREATE INDEX idx_todos_trip_id ON todos(trip_id)",
            ],
        )
        .await
    }

    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            2,
            &[
                // Login allowlist: an entry matches either one email or a whole domain
                "CREATE TABLE allowed_accounts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT UNIQUE COLLATE NOCASE,
                    domain TEXT COLLATE NOCASE,
                    active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    CHECK (email IS NOT NULL OR domain IS NOT NULL)
                )",
                "CREATE INDEX idx_allowed_accounts_domain ON allowed_accounts(domain)",
            ],
        )
        .await
    }

    async fn migrate_v3(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            3,
            &[
                // Emails are stored trimmed and lowercased
                "CREATE TABLE shared_trips (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    trip_id INTEGER NOT NULL REFERENCES trips(id) ON DELETE CASCADE,
                    email TEXT NOT NULL,
                    invited_by TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE UNIQUE INDEX idx_shared_trips_trip_email ON shared_trips(trip_id, email)",
                "CREATE INDEX idx_shared_trips_email ON shared_trips(email)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the trip store.
    pub fn trips(&self) -> TripStore {
        TripStore::new(self.pool.clone())
    }

    /// Get the booking store.
    pub fn bookings(&self) -> BookingStore {
        BookingStore::new(self.pool.clone())
    }

    /// Get the todo store.
    pub fn todos(&self) -> TodoStore {
        TodoStore::new(self.pool.clone())
    }

    /// Get the share grant store.
    pub fn shares(&self) -> ShareStore {
        ShareStore::new(self.pool.clone())
    }

    /// Get the login allowlist store.
    pub fn allowlist(&self) -> AllowlistStore {
        AllowlistStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Returns true if the error is a UNIQUE constraint violation.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Clamp user-supplied pagination into a valid (offset, limit) pair.
pub fn page(skip: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let skip = skip.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(MAX_PAGE_SIZE).clamp(0, MAX_PAGE_SIZE);
    (skip, limit)
}
