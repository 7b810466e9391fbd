pub mod calendar;
pub mod inventory;
pub mod plan;
