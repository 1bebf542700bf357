//! Login session aggregate

pub mod model;
pub mod store;

pub use model::{IssuedSession, SessionData};
pub use store::SessionStore;
