use std::sync::Arc;

use axum::{
    routing::get,
    Router,
};

use agenda_cell::handlers::AgendaState;
use agenda_cell::router::agenda_routes;

pub fn create_router(state: Arc<AgendaState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic agenda API is running!" }))
        .nest("/agenda", agenda_routes(state))
}
