//! Backend selection.

use staffrep_core::error::StaffResult;
use staffrep_core::models::user::{LeaderboardField, UserMutation, UserRecord, UserUpdate};
use staffrep_core::repository::UserRepository;
use surrealdb::engine::remote::ws::Client;

use crate::connection::{Backend, DbConfig, DbManager};
use crate::error::DbError;
use crate::repository::{SqliteUserRepository, SurrealUserRepository};
use crate::schema::run_migrations;

/// The configured user record store.
#[derive(Clone)]
pub enum UserStore {
    Surreal(SurrealUserRepository<Client>),
    Sqlite(SqliteUserRepository),
}

/// Connect the backend named by `config` and bring its schema up to
/// date.
pub async fn open_store(config: &DbConfig) -> Result<UserStore, DbError> {
    match config.backend {
        Backend::Surreal => {
            let manager = DbManager::connect(config).await?;
            run_migrations(manager.client()).await?;
            Ok(UserStore::Surreal(SurrealUserRepository::new(
                manager.client().clone(),
            )))
        }
        Backend::Sqlite => {
            let path = config
                .sqlite_path
                .as_deref()
                .ok_or_else(|| DbError::Config("SQLITE_PATH is not set".into()))?;
            Ok(UserStore::Sqlite(SqliteUserRepository::open(path)?))
        }
    }
}

impl UserRepository for UserStore {
    async fn get_user(&self, user_id: &str) -> StaffResult<UserRecord> {
        match self {
            UserStore::Surreal(repo) => repo.get_user(user_id).await,
            UserStore::Sqlite(repo) => repo.get_user(user_id).await,
        }
    }

    async fn get_or_create_user(&self, user_id: &str) -> StaffResult<UserRecord> {
        match self {
            UserStore::Surreal(repo) => repo.get_or_create_user(user_id).await,
            UserStore::Sqlite(repo) => repo.get_or_create_user(user_id).await,
        }
    }

    async fn update_user(&self, user_id: &str, update: UserUpdate) -> StaffResult<UserRecord> {
        match self {
            UserStore::Surreal(repo) => repo.update_user(user_id, update).await,
            UserStore::Sqlite(repo) => repo.update_user(user_id, update).await,
        }
    }

    async fn leaderboard(
        &self,
        field: LeaderboardField,
        limit: usize,
    ) -> StaffResult<Vec<UserRecord>> {
        match self {
            UserStore::Surreal(repo) => repo.leaderboard(field, limit).await,
            UserStore::Sqlite(repo) => repo.leaderboard(field, limit).await,
        }
    }

    async fn transaction(
        &self,
        user_id: &str,
        mutations: Vec<UserMutation>,
    ) -> StaffResult<UserRecord> {
        match self {
            UserStore::Surreal(repo) => repo.transaction(user_id, mutations).await,
            UserStore::Sqlite(repo) => repo.transaction(user_id, mutations).await,
        }
    }
}
