use async_trait::async_trait;

use super::{Branch, BranchChanges, NewBranch};
use crate::shared::{DomainResult, PageRequest, PaginatedResult};

#[async_trait]
pub trait BranchRepository: Send + Sync {
    async fn create(&self, branch: NewBranch) -> DomainResult<Branch>;
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Branch>>;
    async fn list(&self, page: PageRequest) -> DomainResult<PaginatedResult<Branch>>;
    async fn update(&self, id: i32, changes: BranchChanges) -> DomainResult<Option<Branch>>;
    async fn delete(&self, id: i32) -> DomainResult<()>;
}
