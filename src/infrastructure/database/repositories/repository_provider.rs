//! Unified repository provider backed by SeaORM

use sea_orm::DatabaseConnection;

use super::branch_repository::SeaOrmBranchRepository;
use super::session_repository::SeaOrmSessionStore;
use super::student_repository::SeaOrmStudentRepository;
use super::user_repository::SeaOrmUserRepository;
use crate::domain::{
    BranchRepository, RepositoryProvider, SessionStore, StudentRepository,
    UserRepositoryInterface,
};

/// All repositories over one shared connection pool
pub struct SeaOrmRepositoryProvider {
    users: SeaOrmUserRepository,
    branches: SeaOrmBranchRepository,
    students: SeaOrmStudentRepository,
    sessions: SeaOrmSessionStore,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            users: SeaOrmUserRepository::new(db.clone()),
            branches: SeaOrmBranchRepository::new(db.clone()),
            students: SeaOrmStudentRepository::new(db.clone()),
            sessions: SeaOrmSessionStore::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn users(&self) -> &dyn UserRepositoryInterface {
        &self.users
    }

    fn branches(&self) -> &dyn BranchRepository {
        &self.branches
    }

    fn students(&self) -> &dyn StudentRepository {
        &self.students
    }

    fn sessions(&self) -> &dyn SessionStore {
        &self.sessions
    }
}
