// libs/agenda-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::NaiveDate;
use std::fmt;

use crate::services::clock;

/// Minutes since local midnight, range [0, 1440).
pub type TimePoint = u16;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

pub const DEFAULT_SLOT_MINUTES: u16 = 30;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub status: AppointmentStatus,
    pub patient_id: Uuid,
    pub patient_name: String,
}

impl Appointment {
    /// Scheduled start as minutes since midnight.
    pub fn start_minutes(&self) -> Result<TimePoint, AgendaError> {
        clock::to_minutes(&self.start_time)
    }

    /// Scheduled end as minutes since midnight.
    pub fn end_minutes(&self) -> Result<TimePoint, AgendaError> {
        clock::to_minutes(&self.end_time)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Done,
    Canceled,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Done => write!(f, "done"),
            AppointmentStatus::Canceled => write!(f, "canceled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

// ==============================================================================
// BUSINESS HOURS MODELS
// ==============================================================================

/// Effective opening hours for one weekday. Absent open/close means the
/// day is not worked. A break is applied only when both bounds are set.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayHours {
    #[serde(serialize_with = "clock::serialize_opt_minutes")]
    pub opens_at: Option<TimePoint>,
    #[serde(serialize_with = "clock::serialize_opt_minutes")]
    pub closes_at: Option<TimePoint>,
    #[serde(serialize_with = "clock::serialize_opt_minutes")]
    pub break_start: Option<TimePoint>,
    #[serde(serialize_with = "clock::serialize_opt_minutes")]
    pub break_end: Option<TimePoint>,
    pub slot_minutes: u16,
}

impl Default for DayHours {
    fn default() -> Self {
        Self {
            opens_at: None,
            closes_at: None,
            break_start: None,
            break_end: None,
            slot_minutes: DEFAULT_SLOT_MINUTES,
        }
    }
}

impl DayHours {
    pub fn is_open(&self) -> bool {
        self.opens_at.is_some() && self.closes_at.is_some()
    }
}

/// Resolved hours for a whole week, indexed 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WeekHours {
    pub days: [DayHours; 7],
}

impl WeekHours {
    pub fn for_date(&self, date: NaiveDate) -> &DayHours {
        &self.days[clock::weekday_index(date)]
    }
}

// ==============================================================================
// SLOT GRID MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Available,
    Occupied,
    Continuation,
    Break,
}

/// One step of the day grid. Ephemeral: recomputed on every request,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSlot {
    #[serde(serialize_with = "clock::serialize_minutes")]
    pub start: TimePoint,
    #[serde(serialize_with = "clock::serialize_minutes")]
    pub end: TimePoint,
    pub kind: SlotKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment: Option<Appointment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_count: Option<u32>,
}

// ==============================================================================
// CONFLICT DETECTION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ConflictInfo {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub starts_at: String,
    pub ends_at: String,
}

// ==============================================================================
// AUDIT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StatusAuditRecord {
    pub appointment_id: Uuid,
    pub from_status: AppointmentStatus,
    pub to_status: AppointmentStatus,
    pub actor_id: Uuid,
    pub changed_at: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgendaError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Status change from {from} to {to} is not allowed")]
    IllegalTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Hours configuration unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}
