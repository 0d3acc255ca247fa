// libs/agenda-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{AgendaError, AppointmentStatus};
use crate::services::clock;
use crate::services::conflict::ConflictService;
use crate::services::grid;
use crate::services::hours::{HoursCache, HoursService};
use crate::services::lifecycle::StatusService;

/// Shared agenda state: the config plus the process-wide hours cache,
/// created once when the router is wired up.
pub struct AgendaState {
    pub config: AppConfig,
    pub hours_cache: Arc<HoursCache>,
}

impl AgendaState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            hours_cache: Arc::new(HoursCache::new()),
        }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct HoursQueryParams {
    pub clinic_id: Uuid,
    pub professional_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DayViewQueryParams {
    pub clinic_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub clinic_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct InvalidateHoursRequest {
    pub clinic_id: Uuid,
    pub professional_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionStatusRequest {
    pub clinic_id: Uuid,
    pub status: AppointmentStatus,
    pub actor_id: Uuid,
}

// ==============================================================================
// HANDLERS
// ==============================================================================

/// Resolved week hours for a clinic or one of its professionals.
#[axum::debug_handler]
pub async fn get_week_hours(
    State(state): State<Arc<AgendaState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<HoursQueryParams>,
) -> Result<Json<Value>, AppError> {
    let hours_service = HoursService::new(&state.config, Arc::clone(&state.hours_cache));
    let hours = hours_service
        .resolve(params.clinic_id, params.professional_id, auth.token())
        .await;

    Ok(Json(json!({ "days": hours.days })))
}

/// Drop cached hours after a hours edit.
#[axum::debug_handler]
pub async fn invalidate_hours(
    State(state): State<Arc<AgendaState>>,
    Json(request): Json<InvalidateHoursRequest>,
) -> Result<Json<Value>, AppError> {
    let hours_service = HoursService::new(&state.config, Arc::clone(&state.hours_cache));
    hours_service.invalidate(request.clinic_id, request.professional_id);

    Ok(Json(json!({ "success": true })))
}

/// The day view: resolve hours, fetch the day's appointments and build
/// the slot grid in order.
#[axum::debug_handler]
pub async fn get_day_grid(
    State(state): State<Arc<AgendaState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<DayViewQueryParams>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let hours_service = HoursService::new(&state.config, Arc::clone(&state.hours_cache));
    let hours = hours_service
        .resolve(params.clinic_id, params.professional_id, token)
        .await;
    let day = hours.for_date(params.date);

    let appointments = if day.is_open() {
        ConflictService::new(&state.config)
            .appointments_for_day(params.date, params.clinic_id, None, token)
            .await
            .map_err(map_agenda_error)?
    } else {
        Vec::new()
    };

    let slots = grid::generate_slots(day, &appointments, day.slot_minutes).map_err(|e| {
        // Only malformed stored times can fail here; that is a
        // data-integrity bug upstream of this core.
        error!("Day grid generation failed for clinic {}: {}", params.clinic_id, e);
        map_agenda_error(e)
    })?;

    Ok(Json(json!({
        "date": params.date.format("%Y-%m-%d").to_string(),
        "open": day.is_open(),
        "slot_minutes": day.slot_minutes,
        "slots": slots,
    })))
}

/// Advisory conflict check for a candidate interval. The caller may
/// force-book after showing the returned conflict to the user.
#[axum::debug_handler]
pub async fn check_conflict(
    State(state): State<Arc<AgendaState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<ConflictCheckQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_store_configured(&state.config)?;

    let start = clock::to_minutes(&params.start_time).map_err(map_agenda_error)?;
    let end = clock::to_minutes(&params.end_time).map_err(map_agenda_error)?;

    if start >= end {
        return Err(AppError::ValidationError(
            "start time must be before end time".to_string(),
        ));
    }

    let conflict = ConflictService::new(&state.config)
        .find_conflict(
            params.date,
            start,
            end,
            params.clinic_id,
            params.exclude_appointment_id,
            auth.token(),
        )
        .await
        .map_err(map_agenda_error)?;

    Ok(Json(json!({
        "has_conflict": conflict.is_some(),
        "conflict": conflict,
    })))
}

/// Move an appointment through the status state machine.
#[axum::debug_handler]
pub async fn transition_status(
    State(state): State<Arc<AgendaState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<TransitionStatusRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_store_configured(&state.config)?;

    let updated = StatusService::new(&state.config)
        .transition(
            appointment_id,
            request.clinic_id,
            request.status,
            request.actor_id,
            auth.token(),
        )
        .await
        .map_err(map_agenda_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
    })))
}

// The hours path degrades to a closed week when the store is out of
// reach; conflict checks and status writes must not guess, so they
// refuse instead.
fn ensure_store_configured(config: &AppConfig) -> Result<(), AppError> {
    if config.is_configured() {
        return Ok(());
    }
    Err(map_agenda_error(AgendaError::ConfigUnavailable(
        "supabase connection is not configured".to_string(),
    )))
}

fn map_agenda_error(e: AgendaError) -> AppError {
    match e {
        AgendaError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AgendaError::IllegalTransition { .. } => AppError::ValidationError(e.to_string()),
        AgendaError::Conflict(msg) => AppError::Conflict(msg),
        AgendaError::InvalidFormat(_) => AppError::BadRequest(e.to_string()),
        AgendaError::ConfigUnavailable(msg) => AppError::Internal(msg),
        AgendaError::Database(msg) => AppError::Database(msg),
    }
}
