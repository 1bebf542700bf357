use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::domain::{NewStudent, Student, StudentChanges, StudentFilter, StudentRepository};
use crate::infrastructure::database::entities::{branch, student};
use crate::shared::{DomainError, DomainResult, PageRequest, PaginatedResult};

pub struct SeaOrmStudentRepository {
    db: DatabaseConnection,
}

impl SeaOrmStudentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn ensure_branch(&self, branch_id: i32) -> DomainResult<()> {
        let exists = branch::Entity::find_by_id(branch_id)
            .count(&self.db)
            .await?
            > 0;
        if !exists {
            return Err(DomainError::not_found("Branch", "id", branch_id));
        }
        Ok(())
    }
}

fn to_domain(m: student::Model) -> Student {
    Student {
        id: m.id,
        branch_id: m.branch_id,
        full_name: m.full_name,
        email: m.email,
        phone: m.phone,
        seat_number: m.seat_number,
        membership_start: m.membership_start,
        membership_end: m.membership_end,
        reminder_sent_at: m.reminder_sent_at,
        photo_url: m.photo_url,
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}

fn check_period(start: NaiveDate, end: NaiveDate) -> DomainResult<()> {
    if end < start {
        return Err(DomainError::Validation(
            "Membership end must not be before its start".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl StudentRepository for SeaOrmStudentRepository {
    async fn create(&self, s: NewStudent) -> DomainResult<Student> {
        check_period(s.membership_start, s.membership_end)?;
        self.ensure_branch(s.branch_id).await?;

        let now = Utc::now();
        let model = student::ActiveModel {
            branch_id: Set(s.branch_id),
            full_name: Set(s.full_name),
            email: Set(s.email),
            phone: Set(s.phone),
            seat_number: Set(s.seat_number),
            membership_start: Set(s.membership_start),
            membership_end: Set(s.membership_end),
            reminder_sent_at: Set(None),
            photo_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(to_domain(model))
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Student>> {
        let model = student::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(to_domain))
    }

    async fn list(
        &self,
        filter: StudentFilter,
        page: PageRequest,
    ) -> DomainResult<PaginatedResult<Student>> {
        let mut query = student::Entity::find();

        if let Some(branch_id) = filter.branch_id {
            query = query.filter(student::Column::BranchId.eq(branch_id));
        }
        if let Some(ref search) = filter.search {
            query = query.filter(
                Condition::any()
                    .add(student::Column::FullName.contains(search))
                    .add(student::Column::Email.contains(search))
                    .add(student::Column::SeatNumber.contains(search)),
            );
        }

        let total = query.clone().count(&self.db).await?;
        let models = query
            .order_by_asc(student::Column::FullName)
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

    async fn update(&self, id: i32, changes: StudentChanges) -> DomainResult<Option<Student>> {
        let Some(existing) = student::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let start = changes.membership_start.unwrap_or(existing.membership_start);
        let end = changes.membership_end.unwrap_or(existing.membership_end);
        check_period(start, end)?;

        if let Some(branch_id) = changes.branch_id {
            self.ensure_branch(branch_id).await?;
        }

        let end_changed = end != existing.membership_end;
        let mut active: student::ActiveModel = existing.into();

        if let Some(branch_id) = changes.branch_id {
            active.branch_id = Set(branch_id);
        }
        if let Some(full_name) = changes.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(phone) = changes.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(seat_number) = changes.seat_number {
            active.seat_number = Set(Some(seat_number));
        }
        active.membership_start = Set(start);
        active.membership_end = Set(end);
        if end_changed {
            active.reminder_sent_at = Set(None);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Some(to_domain(model)))
    }

    async fn delete(&self, id: i32) -> DomainResult<()> {
        let result = student::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(DomainError::not_found("Student", "id", id));
        }
        Ok(())
    }

    async fn find_ending_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> DomainResult<Vec<Student>> {
        let models = student::Entity::find()
            .filter(student::Column::MembershipEnd.between(from, until))
            .order_by_asc(student::Column::MembershipEnd)
            .order_by_asc(student::Column::Id)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn find_expiring(&self, from: NaiveDate, until: NaiveDate) -> DomainResult<Vec<Student>> {
        let models = student::Entity::find()
            .filter(student::Column::MembershipEnd.between(from, until))
            .filter(student::Column::ReminderSentAt.is_null())
            .order_by_asc(student::Column::MembershipEnd)
            .order_by_asc(student::Column::Id)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn set_photo_url(&self, id: i32, url: &str) -> DomainResult<Student> {
        let Some(existing) = student::Entity::find_by_id(id).one(&self.db).await? else {
            return Err(DomainError::not_found("Student", "id", id));
        };
        let mut active: student::ActiveModel = existing.into();
        active.photo_url = Set(Some(url.to_string()));
        active.updated_at = Set(Utc::now());
        Ok(to_domain(active.update(&self.db).await?))
    }

    async fn mark_reminded(&self, id: i32, at: DateTime<Utc>) -> DomainResult<()> {
        let result = student::Entity::update_many()
            .col_expr(student::Column::ReminderSentAt, Expr::value(at))
            .filter(student::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(DomainError::not_found("Student", "id", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BranchRepository, NewBranch};
    use crate::infrastructure::database::repositories::SeaOrmBranchRepository;
    use crate::infrastructure::database::test_support::migrated_db;
    use chrono::Duration;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() + Duration::days(offset)
    }

    async fn setup() -> (DatabaseConnection, i32) {
        let db = migrated_db().await;
        let branch = SeaOrmBranchRepository::new(db.clone())
            .create(NewBranch {
                name: "Central".into(),
                address: None,
                phone: None,
            })
            .await
            .unwrap();
        (db, branch.id)
    }

    fn new_student(branch_id: i32, name: &str, end: NaiveDate) -> NewStudent {
        NewStudent {
            branch_id,
            full_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            seat_number: None,
            membership_start: end - Duration::days(30),
            membership_end: end,
        }
    }

    #[tokio::test]
    async fn create_rejects_unknown_branch_and_inverted_period() {
        let (db, branch_id) = setup().await;
        let repo = SeaOrmStudentRepository::new(db);

        let err = repo.create(new_student(branch_id + 100, "Asha", day(5))).await;
        assert!(matches!(err, Err(DomainError::NotFound { .. })));

        let mut inverted = new_student(branch_id, "Asha", day(5));
        inverted.membership_start = day(10);
        assert!(matches!(
            repo.create(inverted).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn find_expiring_honours_window_and_reminder_flag() {
        let (db, branch_id) = setup().await;
        let repo = SeaOrmStudentRepository::new(db);

        let soon = repo.create(new_student(branch_id, "Asha", day(2))).await.unwrap();
        let edge = repo.create(new_student(branch_id, "Bina", day(3))).await.unwrap();
        repo.create(new_student(branch_id, "Chetan", day(4))).await.unwrap();
        repo.create(new_student(branch_id, "Dev", day(-1))).await.unwrap();

        let expiring = repo.find_expiring(day(0), day(3)).await.unwrap();
        let ids: Vec<i32> = expiring.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![soon.id, edge.id]);

        repo.mark_reminded(soon.id, Utc::now()).await.unwrap();
        let expiring = repo.find_expiring(day(0), day(3)).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].id, edge.id);

        let ending = repo.find_ending_between(day(0), day(3)).await.unwrap();
        assert_eq!(ending.len(), 2);
    }

    #[tokio::test]
    async fn moving_the_end_date_rearms_the_reminder() {
        let (db, branch_id) = setup().await;
        let repo = SeaOrmStudentRepository::new(db);

        let s = repo.create(new_student(branch_id, "Asha", day(2))).await.unwrap();
        repo.mark_reminded(s.id, Utc::now()).await.unwrap();

        let renamed = repo
            .update(
                s.id,
                StudentChanges {
                    seat_number: Some("B-4".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(renamed.reminder_sent_at.is_some());

        let renewed = repo
            .update(
                s.id,
                StudentChanges {
                    membership_end: Some(day(60)),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renewed.membership_end, day(60));
        assert!(renewed.reminder_sent_at.is_none());
    }

    #[tokio::test]
    async fn photo_url_is_stored_and_kept_on_update() {
        let (db, branch_id) = setup().await;
        let repo = SeaOrmStudentRepository::new(db);

        let s = repo.create(new_student(branch_id, "Asha", day(20))).await.unwrap();
        assert!(s.photo_url.is_none());

        let with_photo = repo
            .set_photo_url(s.id, "https://img.example.com/asha.jpg")
            .await
            .unwrap();
        assert_eq!(
            with_photo.photo_url.as_deref(),
            Some("https://img.example.com/asha.jpg")
        );

        let updated = repo
            .update(
                s.id,
                StudentChanges {
                    seat_number: Some("C-2".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.photo_url, with_photo.photo_url);

        assert!(matches!(
            repo.set_photo_url(s.id + 100, "https://img.example.com/x.jpg").await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_filters_by_branch_and_search() {
        let (db, branch_id) = setup().await;
        let other = SeaOrmBranchRepository::new(db.clone())
            .create(NewBranch {
                name: "North".into(),
                address: None,
                phone: None,
            })
            .await
            .unwrap();
        let repo = SeaOrmStudentRepository::new(db);

        repo.create(new_student(branch_id, "Asha", day(10))).await.unwrap();
        repo.create(new_student(branch_id, "Bina", day(10))).await.unwrap();
        repo.create(new_student(other.id, "Asif", day(10))).await.unwrap();

        let page = repo
            .list(
                StudentFilter {
                    branch_id: Some(branch_id),
                    search: Some("As".into()),
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].full_name, "Asha");
    }
}
