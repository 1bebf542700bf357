//! Library student aggregate

pub mod model;
pub mod repository;

pub use model::{NewStudent, Student, StudentChanges, StudentFilter};
pub use repository::StudentRepository;
