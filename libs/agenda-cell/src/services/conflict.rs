// libs/agenda-cell/src/services/conflict.rs
//
// Interval-overlap conflict detection against the day's booked
// appointments, run before every insert and edit. The check is
// advisory: the caller may force-book once the user has acknowledged
// the warning. Across concurrent booking requests it is best-effort;
// two requests passing the check simultaneously can still double-book,
// and that is accepted rather than serialized in-process.
use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AgendaError, Appointment, ConflictInfo, TimePoint};
use crate::services::clock;

pub struct ConflictService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    /// Find the earliest non-cancelled appointment overlapping the
    /// candidate `[start, end)` interval on the given day, or `None`.
    /// Overlap is half-open: a slot touching another's boundary does
    /// not conflict.
    pub async fn find_conflict(
        &self,
        date: NaiveDate,
        start: TimePoint,
        end: TimePoint,
        clinic_id: Uuid,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<ConflictInfo>, AgendaError> {
        debug!(
            "Checking conflicts for clinic {} on {} between {} and {}",
            clinic_id,
            date,
            clock::format_minutes(start),
            clock::format_minutes(end)
        );

        let mut appointments = self
            .appointments_for_day(date, clinic_id, exclude_appointment_id, auth_token)
            .await?;

        // Deterministic winner: earliest-starting conflict.
        let mut parsed = Vec::with_capacity(appointments.len());
        for appointment in appointments.drain(..) {
            let appt_start = parse_stored_time(&appointment.start_time)?;
            let appt_end = parse_stored_time(&appointment.end_time)?;
            parsed.push((appt_start, appt_end, appointment));
        }
        parsed.sort_by_key(|(appt_start, _, _)| *appt_start);

        for (appt_start, appt_end, appointment) in parsed {
            if appt_start < end && appt_end > start {
                warn!(
                    "Conflict detected for clinic {} on {}: appointment {} ({})",
                    clinic_id, date, appointment.id, appointment.patient_name
                );
                return Ok(Some(ConflictInfo {
                    appointment_id: appointment.id,
                    patient_name: appointment.patient_name,
                    starts_at: clock::format_minutes(appt_start),
                    ends_at: clock::format_minutes(appt_end),
                }));
            }
        }

        Ok(None)
    }

    /// The day's bookable appointments for a clinic: everything except
    /// cancelled and no-show rows, ordered by start time.
    pub async fn appointments_for_day(
        &self,
        date: NaiveDate,
        clinic_id: Uuid,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AgendaError> {
        let mut query_parts = vec![
            format!("clinic_id=eq.{}", clinic_id),
            format!("date=eq.{}", date),
            "status=not.in.(canceled,no_show)".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=start_time.asc",
            query_parts.join("&")
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AgendaError::Database(e.to_string()))?;

        let appointments: Vec<Appointment> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AgendaError::Database(format!("Failed to parse appointments: {}", e)))?;

        Ok(appointments)
    }
}

// A malformed stored time means the row was written without going
// through validation; log loudly before surfacing.
fn parse_stored_time(time: &str) -> Result<TimePoint, AgendaError> {
    clock::to_minutes(time).map_err(|e| {
        error!("Malformed appointment time {:?} in store", time);
        e
    })
}
