use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::is_unique_violation;

#[derive(Clone)]
pub struct ShareStore {
    pool: SqlitePool,
}

/// Read-only access to a trip for whoever signs in with `email`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShareGrant {
    pub email: String,
    pub invited_by: Option<String>,
    pub created_at: String,
}

/// Grant emails are compared trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl ShareStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a grant. Returns `None` if the trip is already shared with
    /// this email, leaving the existing grant untouched.
    pub async fn create(
        &self,
        trip_id: i64,
        email: &str,
        invited_by: &str,
    ) -> Result<Option<ShareGrant>, sqlx::Error> {
        let email = normalize_email(email);
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM shared_trips WHERE trip_id = ? AND email = ?")
                .bind(trip_id)
                .bind(&email)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Ok(None);
        }

        let inserted = sqlx::query(
            "INSERT INTO shared_trips (trip_id, email, invited_by) VALUES (?, ?, ?)",
        )
        .bind(trip_id)
        .bind(&email)
        .bind(invited_by)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            // Lost a race with an identical request
            Err(e) if is_unique_violation(&e) => return Ok(None),
            Err(e) => return Err(e),
        }

        let grant: ShareGrant = sqlx::query_as(
            "SELECT email, invited_by, created_at FROM shared_trips WHERE trip_id = ? AND email = ?",
        )
        .bind(trip_id)
        .bind(&email)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(grant))
    }

    /// Check whether a trip is shared with an email.
    pub async fn exists(&self, trip_id: i64, email: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM shared_trips WHERE trip_id = ? AND email = ?")
                .bind(trip_id)
                .bind(normalize_email(email))
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// List the grants of a trip in creation order.
    pub async fn list(&self, trip_id: i64) -> Result<Vec<ShareGrant>, sqlx::Error> {
        sqlx::query_as(
            "SELECT email, invited_by, created_at FROM shared_trips WHERE trip_id = ? ORDER BY id",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Remove a grant. Returns false if there was none.
    pub async fn delete(&self, trip_id: i64, email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM shared_trips WHERE trip_id = ? AND email = ?")
            .bind(trip_id)
            .bind(normalize_email(email))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, NewUser, Owner, TripFields};

    use super::*;

    async fn setup() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let owner = db
            .users()
            .upsert(&NewUser::new("g-owner", "owner@example.com", "Owner"))
            .await
            .unwrap();
        let fields: TripFields = serde_json::from_value(serde_json::json!({
            "name": "Paris",
            "start_date": "2024-06-01T00:00:00",
        }))
        .unwrap();
        let trip = db
            .trips()
            .create(&Owner::User(owner.id), &fields)
            .await
            .unwrap();
        (db, trip.id)
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Bob@Example.COM "), "bob@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_grant_is_rejected() {
        let (db, trip_id) = setup().await;
        let shares = db.shares();

        let grant = shares
            .create(trip_id, "Bob@Example.com", "owner@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grant.email, "bob@example.com");
        assert_eq!(grant.invited_by.as_deref(), Some("owner@example.com"));

        // Same address with different case and whitespace
        let dup = shares
            .create(trip_id, " BOB@example.com ", "owner@example.com")
            .await
            .unwrap();
        assert!(dup.is_none());

        let grants = shares.list(trip_id).await.unwrap();
        assert_eq!(grants.len(), 1);
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let (db, trip_id) = setup().await;
        let shares = db.shares();
        shares
            .create(trip_id, "bob@example.com", "owner@example.com")
            .await
            .unwrap();

        assert!(shares.exists(trip_id, "BOB@example.com").await.unwrap());
        assert!(!shares.exists(trip_id, "carol@example.com").await.unwrap());

        assert!(shares.delete(trip_id, " Bob@Example.com").await.unwrap());
        assert!(!shares.delete(trip_id, "bob@example.com").await.unwrap());
        assert!(shares.list(trip_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_shared_with() {
        let (db, trip_id) = setup().await;
        db.shares()
            .create(trip_id, "bob@example.com", "owner@example.com")
            .await
            .unwrap();

        let shared = db.trips().list_shared_with("bob@example.com").await.unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].id, trip_id);
        assert!(
            db.trips()
                .list_shared_with("carol@example.com")
                .await
                .unwrap()
                .is_empty()
        );
    }
}
