use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// A user who signed in through the identity provider.
/// Serialized with the public UUID as `id`; the row id stays internal.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: String,
    #[serde(skip)]
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
    pub preferred_language: String,
    pub preferred_currency: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub last_login: Option<String>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    google_id: String,
    email: String,
    name: String,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
    preferred_language: String,
    preferred_currency: String,
    is_active: i32,
    created_at: String,
    updated_at: String,
    last_login: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            google_id: row.google_id,
            email: row.email,
            name: row.name,
            given_name: row.given_name,
            family_name: row.family_name,
            picture: row.picture,
            preferred_language: row.preferred_language,
            preferred_currency: row.preferred_currency,
            is_active: row.is_active != 0,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login: row.last_login,
        }
    }
}

const USER_COLUMNS: &str = "id, uuid, google_id, email, name, given_name, family_name, picture, \
     preferred_language, preferred_currency, is_active, created_at, updated_at, last_login";

/// Profile data from a successful provider login.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
    /// Only used when the user is first created.
    pub preferred_language: String,
}

impl NewUser {
    pub fn new(google_id: &str, email: &str, name: &str) -> Self {
        Self {
            google_id: google_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            given_name: None,
            family_name: None,
            picture: None,
            preferred_language: "en".to_string(),
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the user on first login, or refresh the profile fields and
    /// `last_login` of an existing one. Preferences are kept on refresh.
    pub async fn upsert(&self, new: &NewUser) -> Result<User, sqlx::Error> {
        let updated = sqlx::query(
            "UPDATE users SET email = ?, name = ?, given_name = ?, family_name = ?, picture = ?,
                last_login = datetime('now'), updated_at = datetime('now')
             WHERE google_id = ?",
        )
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.given_name)
        .bind(&new.family_name)
        .bind(&new.picture)
        .bind(&new.google_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO users (uuid, google_id, email, name, given_name, family_name, picture,
                    preferred_language, last_login)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&new.google_id)
            .bind(&new.email)
            .bind(&new.name)
            .bind(&new.given_name)
            .bind(&new.family_name)
            .bind(&new.picture)
            .bind(&new.preferred_language)
            .execute(&self.pool)
            .await?;
        }

        let row: UserRow = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE google_id = ?"
        )))
        .bind(&new.google_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(sqlx::AssertSqlSafe(format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?")))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(sqlx::AssertSqlSafe(format!("SELECT {USER_COLUMNS} FROM users WHERE uuid = ?")))
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Update the editable profile fields. `None` leaves a field unchanged.
    pub async fn update_preferences(
        &self,
        id: i64,
        name: Option<&str>,
        language: Option<&str>,
        currency: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET
                name = COALESCE(?, name),
                preferred_language = COALESCE(?, preferred_language),
                preferred_currency = COALESCE(?, preferred_currency),
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(name)
        .bind(language)
        .bind(currency)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Enable or disable a user. Inactive users cannot authenticate.
    pub async fn set_active(&self, id: i64, active: bool) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET is_active = ?, updated_at = datetime('now') WHERE id = ?")
                .bind(active as i32)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
