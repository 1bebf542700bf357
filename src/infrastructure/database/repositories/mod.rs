//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod branch_repository;
pub mod repository_provider;
pub mod session_repository;
pub mod student_repository;
pub mod user_repository;

pub use branch_repository::SeaOrmBranchRepository;
pub use repository_provider::SeaOrmRepositoryProvider;
pub use session_repository::SeaOrmSessionStore;
pub use student_repository::SeaOrmStudentRepository;
pub use user_repository::SeaOrmUserRepository;
