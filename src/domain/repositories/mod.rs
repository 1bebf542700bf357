//! Repository provider for the domain layer

use super::branch::BranchRepository;
use super::session::SessionStore;
use super::student::StudentRepository;
use super::user::UserRepositoryInterface;

/// Provides access to all domain repositories.
///
/// Consumers request only the repository they need:
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let branch = repos.branches().find_by_id(1).await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn users(&self) -> &dyn UserRepositoryInterface;
    fn branches(&self) -> &dyn BranchRepository;
    fn students(&self) -> &dyn StudentRepository;
    fn sessions(&self) -> &dyn SessionStore;
}
