use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{NewStudent, Student, StudentChanges, StudentFilter};
use crate::shared::{DomainResult, PageRequest, PaginatedResult};

#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn create(&self, student: NewStudent) -> DomainResult<Student>;
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Student>>;
    async fn list(
        &self,
        filter: StudentFilter,
        page: PageRequest,
    ) -> DomainResult<PaginatedResult<Student>>;
    async fn update(&self, id: i32, changes: StudentChanges) -> DomainResult<Option<Student>>;
    async fn delete(&self, id: i32) -> DomainResult<()>;

    /// Students whose membership ends in `[from, until]`
    async fn find_ending_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> DomainResult<Vec<Student>>;
    /// Like `find_ending_between`, limited to students not reminded yet
    async fn find_expiring(&self, from: NaiveDate, until: NaiveDate) -> DomainResult<Vec<Student>>;
    async fn mark_reminded(&self, id: i32, at: DateTime<Utc>) -> DomainResult<()>;
    async fn set_photo_url(&self, id: i32, url: &str) -> DomainResult<Student>;
}
