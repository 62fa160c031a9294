use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct TodoStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoCategory {
    Flight,
    Accommodation,
    Transport,
    Activity,
    Documents,
    Packing,
    #[default]
    Other,
}

impl TodoCategory {
    pub const ALL: [TodoCategory; 7] = [
        TodoCategory::Flight,
        TodoCategory::Accommodation,
        TodoCategory::Transport,
        TodoCategory::Activity,
        TodoCategory::Documents,
        TodoCategory::Packing,
        TodoCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TodoCategory::Flight => "flight",
            TodoCategory::Accommodation => "accommodation",
            TodoCategory::Transport => "transport",
            TodoCategory::Activity => "activity",
            TodoCategory::Documents => "documents",
            TodoCategory::Packing => "packing",
            TodoCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

fn default_priority() -> i64 {
    2
}

/// The caller-editable part of a todo. Priority is 1 (high) to 3 (low).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoFields {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: TodoCategory,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Todo {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: String,
    #[serde(skip)]
    pub trip_id: i64,
    #[serde(rename = "trip_id")]
    pub trip_uuid: String,
    #[serde(flatten)]
    pub fields: TodoFields,
    pub completed: bool,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct TodoRow {
    id: i64,
    uuid: String,
    trip_id: i64,
    trip_uuid: String,
    title: String,
    description: Option<String>,
    category: String,
    priority: i64,
    due_date: Option<String>,
    completed: i32,
    completed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<TodoRow> for Todo {
    fn from(row: TodoRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            trip_id: row.trip_id,
            trip_uuid: row.trip_uuid,
            fields: TodoFields {
                title: row.title,
                description: row.description,
                category: TodoCategory::parse(&row.category).unwrap_or_default(),
                priority: row.priority,
                due_date: row.due_date,
            },
            completed: row.completed != 0,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// The `completed_at` value after setting the completion flag.
/// Completing keeps an existing stamp; reopening always clears it.
pub fn completion_timestamp(completed: bool, current: Option<String>, now: &str) -> Option<String> {
    if completed {
        current.or_else(|| Some(now.to_string()))
    } else {
        None
    }
}

const TODO_SELECT: &str = "SELECT d.id, d.uuid, d.trip_id, t.uuid AS trip_uuid, d.title,
        d.description, d.category, d.priority, d.due_date, d.completed, d.completed_at,
        d.created_at, d.updated_at
     FROM todos d JOIN trips t ON t.id = d.trip_id";

impl TodoStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an open todo in a trip.
    pub async fn create(&self, trip_id: i64, fields: &TodoFields) -> Result<Todo, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO todos (uuid, trip_id, title, description, category, priority, due_date)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(trip_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.category.as_str())
        .bind(fields.priority)
        .bind(&fields.due_date)
        .execute(&self.pool)
        .await?;

        let row: TodoRow = sqlx::query_as(sqlx::AssertSqlSafe(format!("{TODO_SELECT} WHERE d.id = ?")))
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    /// Get a todo by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Todo>, sqlx::Error> {
        let row: Option<TodoRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!("{TODO_SELECT} WHERE d.uuid = ?")))
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Todo::from))
    }

    /// List the todos of a trip, highest priority first, then oldest first.
    pub async fn list_by_trip(&self, trip_id: i64) -> Result<Vec<Todo>, sqlx::Error> {
        let rows: Vec<TodoRow> = sqlx::query_as(sqlx::AssertSqlSafe(format!(
            "{TODO_SELECT} WHERE d.trip_id = ? ORDER BY d.priority, d.created_at, d.id"
        )))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Todo::from).collect())
    }

    /// Overwrite the editable fields and completion state of a todo.
    pub async fn update(
        &self,
        id: i64,
        fields: &TodoFields,
        completed: bool,
        completed_at: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE todos SET title = ?, description = ?, category = ?, priority = ?, due_date = ?,
                completed = ?, completed_at = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.category.as_str())
        .bind(fields.priority)
        .bind(&fields.due_date)
        .bind(completed as i32)
        .bind(completed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a todo by ID.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, Owner, TripFields};

    use super::*;

    fn todo(value: serde_json::Value) -> TodoFields {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_completion_timestamp() {
        let now = "2024-06-01 10:00:00";
        let first = completion_timestamp(true, None, now);
        assert_eq!(first.as_deref(), Some(now));

        // Completing again keeps the original stamp
        let again = completion_timestamp(true, first.clone(), "2024-06-02 11:00:00");
        assert_eq!(again, first);

        assert_eq!(completion_timestamp(false, again, now), None);
        assert_eq!(completion_timestamp(false, None, now), None);
    }

    #[test]
    fn test_fields_defaults() {
        let fields = todo(serde_json::json!({ "title": "Passport" }));
        assert_eq!(fields.category, TodoCategory::Other);
        assert_eq!(fields.priority, 2);
    }

    #[tokio::test]
    async fn test_list_orders_by_priority_then_creation() {
        let db = Database::open(":memory:").await.unwrap();
        let trip_fields: TripFields = serde_json::from_value(serde_json::json!({
            "name": "Trip",
            "start_date": "2024-06-01T00:00:00",
        }))
        .unwrap();
        let trip = db
            .trips()
            .create(&Owner::Guest("s".to_string()), &trip_fields)
            .await
            .unwrap();
        let store = db.todos();

        store
            .create(trip.id, &todo(serde_json::json!({ "title": "Low", "priority": 3 })))
            .await
            .unwrap();
        store
            .create(trip.id, &todo(serde_json::json!({ "title": "High", "priority": 1 })))
            .await
            .unwrap();
        store
            .create(trip.id, &todo(serde_json::json!({ "title": "Medium A" })))
            .await
            .unwrap();
        store
            .create(trip.id, &todo(serde_json::json!({ "title": "Medium B" })))
            .await
            .unwrap();

        let listed = store.list_by_trip(trip.id).await.unwrap();
        let titles: Vec<_> = listed.iter().map(|t| t.fields.title.as_str()).collect();
        assert_eq!(titles, vec!["High", "Medium A", "Medium B", "Low"]);
        assert_eq!(listed[0].trip_uuid, trip.uuid);
    }

    #[tokio::test]
    async fn test_update_completion() {
        let db = Database::open(":memory:").await.unwrap();
        let trip_fields: TripFields = serde_json::from_value(serde_json::json!({
            "name": "Trip",
            "start_date": "2024-06-01T00:00:00",
        }))
        .unwrap();
        let trip = db
            .trips()
            .create(&Owner::Guest("s".to_string()), &trip_fields)
            .await
            .unwrap();
        let store = db.todos();
        let created = store
            .create(trip.id, &todo(serde_json::json!({ "title": "Visa" })))
            .await
            .unwrap();
        assert!(!created.completed);
        assert!(created.completed_at.is_none());

        store
            .update(created.id, &created.fields, true, Some("2024-06-01 10:00:00"))
            .await
            .unwrap();
        let done = store.get_by_uuid(&created.uuid).await.unwrap().unwrap();
        assert!(done.completed);
        assert_eq!(done.completed_at.as_deref(), Some("2024-06-01 10:00:00"));

        assert!(store.delete(created.id).await.unwrap());
        assert!(store.get_by_uuid(&created.uuid).await.unwrap().is_none());
    }
}
