use sqlx::sqlite::SqlitePool;

use super::normalize_email;

/// Accounts allowed to sign in through the identity provider.
#[derive(Clone)]
pub struct AllowlistStore {
    pool: SqlitePool,
}

impl AllowlistStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Allow one exact email address. Re-activates an existing entry.
    pub async fn add_email(&self, email: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO allowed_accounts (email) VALUES (?)
             ON CONFLICT(email) DO UPDATE SET active = 1, updated_at = datetime('now')",
        )
        .bind(normalize_email(email))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Allow every address of a domain.
    pub async fn add_domain(&self, domain: &str) -> Result<(), sqlx::Error> {
        let domain = normalize_domain(domain);
        let updated = sqlx::query(
            "UPDATE allowed_accounts SET active = 1, updated_at = datetime('now')
             WHERE email IS NULL AND domain = ?",
        )
        .bind(&domain)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            sqlx::query("INSERT INTO allowed_accounts (domain) VALUES (?)")
                .bind(&domain)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Check whether an email, or its domain, has an active entry.
    pub async fn is_allowed(&self, email: &str) -> Result<bool, sqlx::Error> {
        let email = normalize_email(email);
        let domain = email.rsplit_once('@').map(|(_, d)| d.to_string());
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM allowed_accounts
             WHERE active = 1 AND (email = ? OR (email IS NULL AND domain = ?))
             LIMIT 1",
        )
        .bind(&email)
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('@').to_lowercase()
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn test_email_entry() {
        let db = Database::open(":memory:").await.unwrap();
        let allowlist = db.allowlist();
        assert!(!allowlist.is_allowed("alice@example.com").await.unwrap());

        allowlist.add_email("Alice@Example.com").await.unwrap();
        assert!(allowlist.is_allowed("alice@example.com").await.unwrap());
        assert!(!allowlist.is_allowed("bob@example.com").await.unwrap());

        // Adding twice is harmless
        allowlist.add_email("alice@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_domain_entry() {
        let db = Database::open(":memory:").await.unwrap();
        let allowlist = db.allowlist();
        allowlist.add_domain("@Example.org").await.unwrap();

        assert!(allowlist.is_allowed("anyone@example.org").await.unwrap());
        assert!(!allowlist.is_allowed("anyone@example.com").await.unwrap());
        assert!(!allowlist.is_allowed("not-an-email").await.unwrap());
    }
}
