//! HTTP REST API interfaces
//!
//! - `cookies`: session cookie attributes
//! - `middleware`: session authentication
//! - `permissions`: per-route permission guards
//! - `modules`: request handlers per resource
//! - `router`: API router with Swagger documentation

pub mod common;
pub mod cookies;
pub mod middleware;
pub mod modules;
pub mod permissions;
pub mod router;

pub use router::{create_api_router, ApiContext};
