//! Membership-expiry reminders

pub mod mailer;
pub mod service;

pub use mailer::{EmailMessage, MailError, Mailer};
pub use service::{start_reminder_task, ReminderRun, ReminderService};
