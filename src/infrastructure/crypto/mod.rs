//! Password hashing and session token helpers

pub mod password;
pub mod session_token;
