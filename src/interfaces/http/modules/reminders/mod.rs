//! Reminders module: manual reminder run

pub mod handlers;

pub use handlers::*;
