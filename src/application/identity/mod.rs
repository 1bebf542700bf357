//! Identity module: authentication and user management
//!
//! Contains the `UserService` which orchestrates all user-related
//! use-cases: login, logout, account administration, password changes.

pub mod service;

pub use service::{LoginResult, UserService};
