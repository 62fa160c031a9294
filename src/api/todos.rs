//! Todo update and delete. Todos are created and listed under their trip.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::put,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::error::{
    ApiError, DATETIME_FORMAT, ResultExt, normalize_optional_datetime, validate_required,
};
use super::patch::apply_patch;
use crate::access::{Action, authorize_todo};
use crate::auth::{MaybeIdentity, ServerSettings};
use crate::db::{Database, Todo, TodoFields, completion_timestamp};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// State for todo endpoints.
#[derive(Clone)]
pub struct TodosState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub settings: ServerSettings,
}

impl_has_auth_backend!(TodosState);

pub fn router(state: TodosState) -> Router {
    Router::new()
        .route("/{id}", put(update_todo).delete(delete_todo))
        .with_state(state)
}

/// Normalize the due date and check title and priority.
pub(super) fn validate_todo(fields: &mut TodoFields) -> Result<(), ApiError> {
    validate_required("title", &fields.title)?;
    if !(1..=3).contains(&fields.priority) {
        return Err(ApiError::bad_request("priority must be between 1 and 3"));
    }
    normalize_optional_datetime("due_date", &mut fields.due_date)
}

/// Store new fields for a todo, toggling completion when `completed` is given.
pub(super) async fn save_todo(
    db: &Database,
    todo: Todo,
    fields: TodoFields,
    completed: Option<&Value>,
) -> Result<Todo, ApiError> {
    let completed = match completed {
        Some(value) => value
            .as_bool()
            .ok_or_else(|| ApiError::unprocessable("completed must be a boolean"))?,
        None => todo.completed,
    };
    let now = Utc::now().format(DATETIME_FORMAT).to_string();
    let completed_at = completion_timestamp(completed, todo.completed_at, &now);

    let todos = db.todos();
    todos
        .update(todo.id, &fields, completed, completed_at.as_deref())
        .await
        .db_err("Failed to update todo")?;

    todos
        .get_by_uuid(&todo.uuid)
        .await
        .db_err("Failed to load todo")?
        .ok_or_else(|| ApiError::not_found("Todo not found"))
}

async fn update_todo(
    State(state): State<TodosState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
    Json(mut patch): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = authorize_todo(&state.db, &identity, &id, Action::Edit)
        .await
        .db_err("Failed to load todo")?
        .require("Todo")?
        .resource;

    let completed = patch.remove("completed");
    let mut fields = apply_patch(&todo.fields, &patch)?;
    validate_todo(&mut fields)?;

    let todo = save_todo(&state.db, todo, fields, completed.as_ref()).await?;
    Ok(Json(todo))
}

async fn delete_todo(
    State(state): State<TodosState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = authorize_todo(&state.db, &identity, &id, Action::Edit)
        .await
        .db_err("Failed to load todo")?
        .require("Todo")?
        .resource;

    state
        .db
        .todos()
        .delete(todo.id)
        .await
        .db_err("Failed to delete todo")?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(value: Value) -> TodoFields {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_validate_todo() {
        let mut ok = fields(serde_json::json!({ "title": "Passport", "due_date": "2024-05-30" }));
        validate_todo(&mut ok).unwrap();
        assert_eq!(ok.priority, 2);
        assert_eq!(ok.due_date.as_deref(), Some("2024-05-30T00:00:00"));

        let mut urgent = fields(serde_json::json!({ "title": "Visa", "priority": 0 }));
        assert!(matches!(validate_todo(&mut urgent), Err(ApiError::BadRequest(_))));

        let mut untitled = fields(serde_json::json!({ "title": "" }));
        assert!(validate_todo(&mut untitled).is_err());
    }
}
