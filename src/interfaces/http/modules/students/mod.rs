//! Students module: memberships, photos and the expiry report

pub mod dto;
pub mod handlers;
pub mod photo;

pub use dto::*;
pub use handlers::*;
pub use photo::*;
