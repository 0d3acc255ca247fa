pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::*;

// Re-export the scheduling surface other cells consume
pub use services::clock::{to_minutes, format_minutes, week_range, WeekRange};
pub use services::grid::generate_slots;
pub use services::hours::{HoursCache, HoursService};
pub use services::conflict::ConflictService;
pub use services::lifecycle::StatusService;
