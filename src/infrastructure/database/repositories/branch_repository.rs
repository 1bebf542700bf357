use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect,
    Set,
};

use crate::domain::{Branch, BranchChanges, BranchRepository, NewBranch};
use crate::infrastructure::database::entities::branch;
use crate::shared::{DomainError, DomainResult, PageRequest, PaginatedResult};

pub struct SeaOrmBranchRepository {
    db: DatabaseConnection,
}

impl SeaOrmBranchRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_domain(m: branch::Model) -> Branch {
    Branch {
        id: m.id,
        name: m.name,
        address: m.address,
        phone: m.phone,
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}

fn conflict_on_name(e: sea_orm::DbErr) -> DomainError {
    match DomainError::from(e) {
        DomainError::Conflict(_) => DomainError::Conflict("Branch name already exists".into()),
        other => other,
    }
}

#[async_trait]
impl BranchRepository for SeaOrmBranchRepository {
    async fn create(&self, b: NewBranch) -> DomainResult<Branch> {
        let now = Utc::now();
        let model = branch::ActiveModel {
            name: Set(b.name),
            address: Set(b.address),
            phone: Set(b.phone),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(conflict_on_name)?;

        Ok(to_domain(model))
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Branch>> {
        let model = branch::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(to_domain))
    }

    async fn list(&self, page: PageRequest) -> DomainResult<PaginatedResult<Branch>> {
        let query = branch::Entity::find().order_by_asc(branch::Column::Name);
        let total = query.clone().count(&self.db).await?;
        let models = query
            .offset(page.offset())
            .limit(u64::from(page.limit))
            .all(&self.db)
            .await?;

        Ok(PaginatedResult::new(
            models.into_iter().map(to_domain).collect(),
            total,
            page.page,
            page.limit,
        ))
    }

    async fn update(&self, id: i32, changes: BranchChanges) -> DomainResult<Option<Branch>> {
        let Some(existing) = branch::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut active: branch::ActiveModel = existing.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(address) = changes.address {
            active.address = Set(Some(address));
        }
        if let Some(phone) = changes.phone {
            active.phone = Set(Some(phone));
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(conflict_on_name)?;
        Ok(Some(to_domain(model)))
    }

    async fn delete(&self, id: i32) -> DomainResult<()> {
        let result = branch::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(DomainError::not_found("Branch", "id", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::test_support::migrated_db;

    fn new_branch(name: &str) -> NewBranch {
        NewBranch {
            name: name.to_string(),
            address: Some("12 MG Road".into()),
            phone: None,
        }
    }

    #[tokio::test]
    async fn crud_roundtrip() {
        let repo = SeaOrmBranchRepository::new(migrated_db().await);

        let created = repo.create(new_branch("Central")).await.unwrap();
        assert_eq!(created.name, "Central");

        let updated = repo
            .update(
                created.id,
                BranchChanges {
                    phone: Some("555-0101".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("555-0101"));
        assert_eq!(updated.address.as_deref(), Some("12 MG Road"));

        repo.delete(created.id).await.unwrap();
        assert!(repo.find_by_id(created.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(created.id).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_name_is_a_conflict() {
        let repo = SeaOrmBranchRepository::new(migrated_db().await);
        repo.create(new_branch("Central")).await.unwrap();
        assert!(matches!(
            repo.create(new_branch("Central")).await,
            Err(DomainError::Conflict(_))
        ));
    }
}
