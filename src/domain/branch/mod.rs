//! Library branch aggregate

pub mod model;
pub mod repository;

pub use model::{Branch, BranchChanges, NewBranch};
pub use repository::BranchRepository;
