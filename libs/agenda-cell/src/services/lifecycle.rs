// libs/agenda-cell/src/services/lifecycle.rs
//
// The appointment status state machine. Transitions are validated
// against a fixed table and applied with a compare-and-swap on the
// status column, so two actors racing to move the same appointment
// cannot both win. Every successful transition is audited best-effort.
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AgendaError, Appointment, AppointmentStatus, StatusAuditRecord};

/// Legal next statuses for each current status. Fixed, global data:
/// `done` is terminal, `canceled` and `no_show` can be put back on the
/// schedule, and a transition to the same status is never legal.
pub fn allowed_transitions(status: AppointmentStatus) -> &'static [AppointmentStatus] {
    match status {
        AppointmentStatus::Scheduled => &[
            AppointmentStatus::Confirmed,
            AppointmentStatus::Canceled,
            AppointmentStatus::NoShow,
        ],
        AppointmentStatus::Confirmed => &[
            AppointmentStatus::InProgress,
            AppointmentStatus::Canceled,
            AppointmentStatus::NoShow,
        ],
        AppointmentStatus::InProgress => &[
            AppointmentStatus::Done,
            AppointmentStatus::Canceled,
        ],
        AppointmentStatus::Done => &[],
        AppointmentStatus::Canceled => &[AppointmentStatus::Scheduled],
        AppointmentStatus::NoShow => &[AppointmentStatus::Scheduled],
    }
}

pub struct StatusService {
    supabase: Arc<SupabaseClient>,
}

impl StatusService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    /// Move an appointment to `target`, guarded by the transition table
    /// and by optimistic concurrency: the update only applies while the
    /// stored status still equals the value read here. A lost race
    /// surfaces as `Conflict` and the caller should re-fetch before
    /// retrying.
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        clinic_id: Uuid,
        target: AppointmentStatus,
        actor_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AgendaError> {
        debug!(
            "Status transition requested for appointment {} to {}",
            appointment_id, target
        );

        let current = self
            .load_appointment(appointment_id, clinic_id, auth_token)
            .await?;

        if !allowed_transitions(current.status).contains(&target) {
            warn!(
                "Illegal status transition attempted on appointment {}: {} -> {}",
                appointment_id, current.status, target
            );
            return Err(AgendaError::IllegalTransition {
                from: current.status,
                to: target,
            });
        }

        // Compare-and-swap: the filter on the previously read status is
        // what rejects a concurrent transition, not the id alone.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&clinic_id=eq.{}&status=eq.{}",
            appointment_id, clinic_id, current.status
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let update_data = json!({
            "status": target.to_string(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(update_data),
                Some(headers),
            )
            .await
            .map_err(|e| AgendaError::Database(e.to_string()))?;

        if result.is_empty() {
            warn!(
                "Status transition lost a race on appointment {}: stored status no longer {}",
                appointment_id, current.status
            );
            return Err(AgendaError::Conflict(
                "status was changed by another user, refresh and retry".to_string(),
            ));
        }

        let updated: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| AgendaError::Database(format!("Failed to parse updated appointment: {}", e)))?;

        info!(
            "Appointment {} moved from {} to {} by {}",
            appointment_id, current.status, target, actor_id
        );

        self.append_audit(appointment_id, current.status, target, actor_id, auth_token)
            .await;

        Ok(updated)
    }

    async fn load_appointment(
        &self,
        appointment_id: Uuid,
        clinic_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AgendaError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&clinic_id=eq.{}",
            appointment_id, clinic_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AgendaError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(AgendaError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AgendaError::Database(format!("Failed to parse appointment: {}", e)))
    }

    // The state change is the source of truth; the audit trail is
    // best-effort and never rolls back a committed transition.
    async fn append_audit(
        &self,
        appointment_id: Uuid,
        from_status: AppointmentStatus,
        to_status: AppointmentStatus,
        actor_id: Uuid,
        auth_token: &str,
    ) {
        let record = StatusAuditRecord {
            appointment_id,
            from_status,
            to_status,
            actor_id,
            changed_at: Utc::now().to_rfc3339(),
        };
        let body = match serde_json::to_value(&record) {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    "Audit record for appointment {} could not be serialized: {}",
                    appointment_id, e
                );
                return;
            }
        };

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        if let Err(e) = self
            .supabase
            .request_with_headers::<Vec<Value>>(
                Method::POST,
                "/rest/v1/appointment_status_audit",
                Some(auth_token),
                Some(body),
                Some(headers),
            )
            .await
        {
            warn!(
                "Audit write failed for appointment {} ({} -> {}): {}",
                appointment_id, from_status, to_status, e
            );
        }
    }
}
