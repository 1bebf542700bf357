pub mod auth;
pub mod branches;
pub mod health;
pub mod metrics;
pub mod reminders;
pub mod request_id;
pub mod students;
pub mod users;
