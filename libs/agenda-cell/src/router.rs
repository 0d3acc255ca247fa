// libs/agenda-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{self, AgendaState};

pub fn agenda_routes(state: Arc<AgendaState>) -> Router {
    Router::new()
        // Business hours
        .route("/hours", get(handlers::get_week_hours))
        .route("/hours/invalidate", post(handlers::invalidate_hours))
        // Day view
        .route("/day", get(handlers::get_day_grid))
        // Booking support
        .route("/conflicts/check", get(handlers::check_conflict))
        .route("/appointments/{appointment_id}/status", post(handlers::transition_status))
        .with_state(state)
}
