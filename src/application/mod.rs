//! Application layer: use-case orchestration over the domain ports

pub mod identity;
pub mod photos;
pub mod reminders;
pub mod session_sweeper;

pub use identity::{LoginResult, UserService};
pub use photos::{HostedImage, ImageHost, ImageHostError, ImageUpload, PhotoError, PhotoService};
pub use reminders::{start_reminder_task, Mailer, ReminderRun, ReminderService};
pub use session_sweeper::{start_session_sweep_task, sweep_sessions};
