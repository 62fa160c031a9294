//! Trips API, including sharing, trip-scoped bookings and todos, and export.
//!
//! Listing and creating work for anonymous callers by starting a guest
//! session. Every other endpoint goes through the access policy.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::PageQuery;
use super::error::{
    ApiError, ResultExt, normalize_datetime, normalize_optional_datetime, validate_date_range,
    validate_required,
};
use super::patch::apply_patch;
use super::todos::{save_todo, validate_todo};
use crate::access::{Action, authorize_trip};
use crate::auth::{Caller, CurrentUser, MaybeIdentity, ServerSettings};
use crate::db::{Database, ShareGrant, TodoFields, Trip, TripFields, TripStatus, normalize_email, page};
use crate::export::{TripExporter, export_filename};
use crate::i18n::request_language;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// State for trip endpoints.
#[derive(Clone)]
pub struct TripsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub settings: ServerSettings,
    pub exporter: Arc<dyn TripExporter>,
}

impl_has_auth_backend!(TripsState);

pub fn router(state: TripsState) -> Router {
    Router::new()
        .route("/", get(list_trips).post(create_trip))
        .route("/shared", get(list_shared_trips))
        .route("/{id}", get(get_trip).put(update_trip).delete(delete_trip))
        .route("/{id}/status", put(update_status))
        .route("/{id}/bookings", get(list_trip_bookings))
        .route("/{id}/todos", get(list_trip_todos).post(create_todo))
        .route("/{id}/export/pdf", get(export_trip))
        .route("/{id}/share", post(share_trip))
        .route("/{id}/share/{email}", delete(unshare_trip))
        .route("/{id}/shared-users", get(list_shared_users))
        .with_state(state)
}

// --- Request/Response types ---

/// A trip together with whether the caller may change it.
#[derive(Serialize)]
struct TripView {
    #[serde(flatten)]
    trip: Trip,
    can_edit: bool,
}

#[derive(Deserialize)]
struct StatusQuery {
    status: String,
}

#[derive(Deserialize)]
struct ShareRequest {
    email: String,
}

#[derive(Serialize)]
struct ShareResponse {
    trip_id: String,
    #[serde(flatten)]
    grant: ShareGrant,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

// --- Helpers ---

/// Normalize dates and check the invariants of trip fields.
fn validate_trip(fields: &mut TripFields) -> Result<(), ApiError> {
    validate_required("name", &fields.name)?;
    fields.start_date = normalize_datetime("start_date", &fields.start_date)?;
    normalize_optional_datetime("end_date", &mut fields.end_date)?;
    validate_date_range(&fields.start_date, fields.end_date.as_deref())?;
    if fields.traveler_count < 1 {
        return Err(ApiError::bad_request("traveler_count must be at least 1"));
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

// --- Handlers ---

async fn list_trips(
    State(state): State<TripsState>,
    caller: Caller,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (skip, limit) = page(query.skip, query.limit);
    let trips = state
        .db
        .trips()
        .list_by_owner(&caller.owner, skip, limit)
        .await
        .db_err("Failed to list trips")?;
    Ok(Json(trips))
}

async fn create_trip(
    State(state): State<TripsState>,
    caller: Caller,
    Json(mut fields): Json<TripFields>,
) -> Result<impl IntoResponse, ApiError> {
    validate_trip(&mut fields)?;

    let trip = state
        .db
        .trips()
        .create(&caller.owner, &fields)
        .await
        .db_err("Failed to create trip")?;

    tracing::info!(trip = %trip.uuid, "Created trip");
    Ok((StatusCode::CREATED, Json(TripView { trip, can_edit: true })))
}

async fn list_shared_trips(
    State(state): State<TripsState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let trips = state
        .db
        .trips()
        .list_shared_with(&normalize_email(&user.email))
        .await
        .db_err("Failed to list shared trips")?;
    Ok(Json(trips))
}

async fn get_trip(
    State(state): State<TripsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = authorize_trip(&state.db, &identity, &id, Action::View)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?;
    Ok(Json(TripView {
        trip: scope.resource,
        can_edit: scope.can_edit,
    }))
}

async fn update_trip(
    State(state): State<TripsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let trip = authorize_trip(&state.db, &identity, &id, Action::Edit)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?
        .resource;

    let mut fields = apply_patch(&trip.fields, &patch)?;
    validate_trip(&mut fields)?;

    state
        .db
        .trips()
        .update(trip.id, &fields)
        .await
        .db_err("Failed to update trip")?;

    let trip = state
        .db
        .trips()
        .get_by_id(trip.id)
        .await
        .db_err("Failed to load trip")?
        .ok_or_else(|| ApiError::not_found("Trip not found"))?;
    Ok(Json(TripView { trip, can_edit: true }))
}

async fn delete_trip(
    State(state): State<TripsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let trip = authorize_trip(&state.db, &identity, &id, Action::Edit)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?
        .resource;

    state
        .db
        .trips()
        .delete(trip.id)
        .await
        .db_err("Failed to delete trip")?;

    tracing::info!(trip = %trip.uuid, "Deleted trip");
    Ok(Json(MessageResponse {
        message: "Trip deleted successfully",
    }))
}

async fn update_status(
    State(state): State<TripsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let trip = authorize_trip(&state.db, &identity, &id, Action::Edit)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?
        .resource;

    let status =
        TripStatus::parse(&query.status).ok_or_else(|| ApiError::bad_request("Invalid status"))?;

    state
        .db
        .trips()
        .set_status(trip.id, status)
        .await
        .db_err("Failed to update trip status")?;

    let trip = state
        .db
        .trips()
        .get_by_id(trip.id)
        .await
        .db_err("Failed to load trip")?
        .ok_or_else(|| ApiError::not_found("Trip not found"))?;
    Ok(Json(TripView { trip, can_edit: true }))
}

async fn list_trip_bookings(
    State(state): State<TripsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let trip = authorize_trip(&state.db, &identity, &id, Action::View)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?
        .resource;

    let bookings = state
        .db
        .bookings()
        .list_by_trip(trip.id)
        .await
        .db_err("Failed to list bookings")?;
    Ok(Json(bookings))
}

async fn list_trip_todos(
    State(state): State<TripsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let trip = authorize_trip(&state.db, &identity, &id, Action::View)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?
        .resource;

    let todos = state
        .db
        .todos()
        .list_by_trip(trip.id)
        .await
        .db_err("Failed to list todos")?;
    Ok(Json(todos))
}

async fn create_todo(
    State(state): State<TripsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
    Json(mut body): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let trip = authorize_trip(&state.db, &identity, &id, Action::Edit)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?
        .resource;

    let completed = body.remove("completed");
    let mut fields: TodoFields = serde_json::from_value(Value::Object(body))
        .map_err(|e| ApiError::unprocessable(format!("Invalid todo: {}", e)))?;
    validate_todo(&mut fields)?;

    let todos = state.db.todos();
    let todo = todos
        .create(trip.id, &fields)
        .await
        .db_err("Failed to create todo")?;

    // A todo may be created already completed
    let todo = match completed {
        Some(value) => {
            let fields = todo.fields.clone();
            save_todo(&state.db, todo, fields, Some(&value)).await?
        }
        None => todo,
    };
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn export_trip(
    State(state): State<TripsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let trip = authorize_trip(&state.db, &identity, &id, Action::View)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?
        .resource;

    let bookings = state
        .db
        .bookings()
        .list_by_trip(trip.id)
        .await
        .db_err("Failed to list bookings")?;

    let language = request_language(&headers);
    let document = state
        .exporter
        .export(&trip, &bookings, language)
        .map_err(|e| {
            tracing::error!(trip = %trip.uuid, "Export failed: {}", e);
            ApiError::internal("Failed to export trip")
        })?;

    let filename = export_filename(&trip, state.exporter.file_extension());
    let disposition = HeaderValue::from_str(&format!("attachment; filename={}", filename))
        .map_err(|_| ApiError::internal("Invalid export filename"))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(state.exporter.content_type()),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document,
    ))
}

async fn share_trip(
    State(state): State<TripsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
    Json(payload): Json<ShareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let trip = authorize_trip(&state.db, &identity, &id, Action::Share)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?
        .resource;

    let email = normalize_email(&payload.email);
    if !is_plausible_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    // Share is only allowed for signed-in owners
    let inviter = identity.user().map(|u| u.email.as_str()).unwrap_or_default();

    let grant = state
        .db
        .shares()
        .create(trip.id, &email, inviter)
        .await
        .db_err("Failed to share trip")?
        .ok_or_else(|| ApiError::conflict("Trip already shared with this email"))?;

    tracing::info!(trip = %trip.uuid, "Shared trip");
    Ok((
        StatusCode::CREATED,
        Json(ShareResponse {
            trip_id: trip.uuid,
            grant,
        }),
    ))
}

async fn list_shared_users(
    State(state): State<TripsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let trip = authorize_trip(&state.db, &identity, &id, Action::Share)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?
        .resource;

    let emails: Vec<String> = state
        .db
        .shares()
        .list(trip.id)
        .await
        .db_err("Failed to list shared users")?
        .into_iter()
        .map(|grant| grant.email)
        .collect();
    Ok(Json(emails))
}

async fn unshare_trip(
    State(state): State<TripsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path((id, email)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let trip = authorize_trip(&state.db, &identity, &id, Action::Share)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?
        .resource;

    let removed = state
        .db
        .shares()
        .delete(trip.id, &email)
        .await
        .db_err("Failed to remove shared user")?;

    if !removed {
        return Err(ApiError::not_found("Shared user not found for this trip"));
    }
    Ok(StatusCode::NO_CONTENT)
}
