pub mod clock;
pub mod hours;
pub mod grid;
pub mod conflict;
pub mod lifecycle;
