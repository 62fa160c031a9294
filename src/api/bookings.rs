//! Bookings API.
//!
//! A booking is visible and editable exactly when its trip is.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::PageQuery;
use super::error::{
    ApiError, ResultExt, normalize_datetime, normalize_optional_datetime, validate_date_range,
    validate_required,
};
use super::patch::apply_patch;
use crate::access::{Action, authorize_booking, authorize_trip};
use crate::auth::{Caller, MaybeIdentity, ServerSettings};
use crate::db::{Booking, BookingFields, BookingFilter, BookingStatus, BookingType, Database, page};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// State for booking endpoints.
#[derive(Clone)]
pub struct BookingsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub settings: ServerSettings,
}

impl_has_auth_backend!(BookingsState);

pub fn router(state: BookingsState) -> Router {
    Router::new()
        .route("/", get(list_bookings).post(create_booking))
        .route("/type/{booking_type}", get(list_by_type))
        .route("/status/{status}", get(list_by_status))
        .route(
            "/{id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateBookingRequest {
    trip_id: String,
    #[serde(flatten)]
    fields: BookingFields,
}

/// Normalize dates, derive the flight title and check required fields.
fn validate_booking(fields: &mut BookingFields) -> Result<(), ApiError> {
    fields.start_date = normalize_datetime("start_date", &fields.start_date)?;
    normalize_optional_datetime("end_date", &mut fields.end_date)?;
    validate_date_range(&fields.start_date, fields.end_date.as_deref())?;
    fields.apply_flight_title();
    validate_required("title", &fields.title)
}

async fn list_owned(
    state: &BookingsState,
    caller: &Caller,
    filter: BookingFilter,
    query: PageQuery,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let (skip, limit) = page(query.skip, query.limit);
    let bookings = state
        .db
        .bookings()
        .list_by_owner(&caller.owner, filter, skip, limit)
        .await
        .db_err("Failed to list bookings")?;
    Ok(Json(bookings))
}

async fn list_bookings(
    State(state): State<BookingsState>,
    caller: Caller,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    list_owned(&state, &caller, BookingFilter::default(), query).await
}

async fn list_by_type(
    State(state): State<BookingsState>,
    caller: Caller,
    Path(booking_type): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let booking_type = BookingType::parse(&booking_type)
        .ok_or_else(|| ApiError::bad_request("Invalid booking type"))?;
    let filter = BookingFilter {
        booking_type: Some(booking_type),
        ..Default::default()
    };
    list_owned(&state, &caller, filter, query).await
}

async fn list_by_status(
    State(state): State<BookingsState>,
    caller: Caller,
    Path(status): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = BookingStatus::parse(&status)
        .ok_or_else(|| ApiError::bad_request("Invalid booking status"))?;
    let filter = BookingFilter {
        status: Some(status),
        ..Default::default()
    };
    list_owned(&state, &caller, filter, query).await
}

async fn create_booking(
    State(state): State<BookingsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let trip = authorize_trip(&state.db, &identity, &payload.trip_id, Action::Edit)
        .await
        .db_err("Failed to load trip")?
        .require("Trip")?
        .resource;

    let mut fields = payload.fields;
    validate_booking(&mut fields)?;

    let booking = state
        .db
        .bookings()
        .create(trip.id, &fields)
        .await
        .db_err("Failed to create booking")?;

    tracing::info!(booking = %booking.uuid, trip = %trip.uuid, "Created booking");
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn get_booking(
    State(state): State<BookingsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = authorize_booking(&state.db, &identity, &id, Action::View)
        .await
        .db_err("Failed to load booking")?
        .require("Booking")?
        .resource;
    Ok(Json(booking))
}

async fn update_booking(
    State(state): State<BookingsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
    Json(mut patch): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = authorize_booking(&state.db, &identity, &id, Action::Edit)
        .await
        .db_err("Failed to load booking")?
        .require("Booking")?
        .resource;

    // Moving a booking needs edit access to the destination trip as well
    let trip_id = match patch.remove("trip_id") {
        Some(Value::String(target)) if target != booking.trip_uuid => {
            authorize_trip(&state.db, &identity, &target, Action::Edit)
                .await
                .db_err("Failed to load trip")?
                .require("Trip")?
                .resource
                .id
        }
        Some(Value::String(_)) | None => booking.trip_id,
        Some(_) => return Err(ApiError::unprocessable("trip_id must be a string")),
    };

    let mut fields = apply_patch(&booking.fields, &patch)?;
    validate_booking(&mut fields)?;

    let bookings = state.db.bookings();
    bookings
        .update(booking.id, trip_id, &fields)
        .await
        .db_err("Failed to update booking")?;

    let booking = bookings
        .get_by_uuid(&booking.uuid)
        .await
        .db_err("Failed to load booking")?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;
    Ok(Json(booking))
}

async fn delete_booking(
    State(state): State<BookingsState>,
    MaybeIdentity(identity): MaybeIdentity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = authorize_booking(&state.db, &identity, &id, Action::Edit)
        .await
        .db_err("Failed to load booking")?
        .require("Booking")?
        .resource;

    state
        .db
        .bookings()
        .delete(booking.id)
        .await
        .db_err("Failed to delete booking")?;
    Ok(StatusCode::NO_CONTENT)
}
