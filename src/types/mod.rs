pub mod config;
pub mod display;
pub mod raw;
pub mod state;
