pub mod holdings;
pub mod setup;
pub mod ui;
