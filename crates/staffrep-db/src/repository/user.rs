//! SurrealDB implementation of [`UserRepository`].
//!
//! Each user is one `staff_user` document keyed by the platform user id.
//! Read-modify-write cycles are serialized through a per-repository
//! write lock and committed with a single UPSERT inside a transaction
//! block, so readers never see a half-applied change. The lock only
//! covers this process; one writer process per database is assumed.

use std::sync::Arc;

use staffrep_core::error::StaffResult;
use staffrep_core::models::reputation::{ReputationAction, ReputationLogEntry};
use staffrep_core::models::user::{
    LeaderboardField, LoaStatus, UserMutation, UserRecord, UserUpdate,
};
use staffrep_core::repository::UserRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::DbError;

#[derive(Debug, Clone, SurrealValue)]
struct LogRow {
    timestamp: i64,
    moderator_id: String,
    action: String,
    amount: i64,
    reason: String,
}

#[derive(Debug, Clone, SurrealValue)]
struct LoaRow {
    is_active: bool,
    since: Option<i64>,
    reason: Option<String>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    schema_version: u32,
    positive_rep: u32,
    negative_rep: u32,
    reputation_history: Vec<LogRow>,
    loa_status: LoaRow,
}

impl LogRow {
    fn from_entry(entry: &ReputationLogEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            moderator_id: entry.moderator_id.clone(),
            action: entry.action.as_str().to_string(),
            amount: entry.amount,
            reason: entry.reason.clone(),
        }
    }

    fn try_into_entry(self) -> Result<ReputationLogEntry, DbError> {
        let action = ReputationAction::parse(&self.action)
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        Ok(ReputationLogEntry {
            timestamp: self.timestamp,
            moderator_id: self.moderator_id,
            action,
            amount: self.amount,
            reason: self.reason,
        })
    }
}

impl LoaRow {
    fn from_status(status: &LoaStatus) -> Self {
        Self {
            is_active: status.is_active,
            since: status.since,
            reason: status.reason.clone(),
        }
    }
}

impl UserRowWithId {
    fn try_into_record(self) -> Result<UserRecord, DbError> {
        let reputation_history = self
            .reputation_history
            .into_iter()
            .map(LogRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(UserRecord {
            user_id: self.record_id,
            schema_version: self.schema_version,
            positive_rep: self.positive_rep,
            negative_rep: self.negative_rep,
            reputation_history,
            loa_status: LoaStatus {
                is_active: self.loa_status.is_active,
                since: self.loa_status.since,
                reason: self.loa_status.reason,
            },
        })
    }
}

/// SurrealDB implementation of the user record store.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    write_lock: Arc<Mutex<()>>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn fetch(&self, user_id: &str) -> Result<Option<UserRecord>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM \
                 type::record('staff_user', $id)",
            )
            .bind(("id", user_id.to_string()))
            .await?;

        let rows: Vec<UserRowWithId> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(UserRowWithId::try_into_record)
            .transpose()
    }

    async fn store(&self, record: &UserRecord) -> Result<(), DbError> {
        let history: Vec<LogRow> = record
            .reputation_history
            .iter()
            .map(LogRow::from_entry)
            .collect();

        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 UPSERT type::record('staff_user', $id) SET \
                 schema_version = $schema_version, \
                 positive_rep = $positive_rep, \
                 negative_rep = $negative_rep, \
                 reputation_history = $reputation_history, \
                 loa_status = $loa_status, \
                 updated_at = time::now(); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", record.user_id.clone()))
            .bind(("schema_version", record.schema_version))
            .bind(("positive_rep", record.positive_rep))
            .bind(("negative_rep", record.negative_rep))
            .bind(("reputation_history", history))
            .bind(("loa_status", LoaRow::from_status(&record.loa_status)))
            .await?;

        result.check().map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }

    /// Read (or default), mutate and write back while holding the write
    /// lock.
    async fn modify(
        &self,
        user_id: &str,
        mutations: Vec<UserMutation>,
    ) -> Result<UserRecord, DbError> {
        let _guard = self.write_lock.lock().await;

        let mut record = match self.fetch(user_id).await? {
            Some(record) => record,
            None => UserRecord::new(user_id),
        };
        for mutation in mutations {
            record.apply_mutation(mutation);
        }

        self.store(&record).await?;
        debug!(user_id, "Committed staff user record");
        Ok(record)
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn get_user(&self, user_id: &str) -> StaffResult<UserRecord> {
        let record = self.fetch(user_id).await?;
        record.ok_or_else(|| {
            DbError::NotFound {
                entity: "staff_user".into(),
                id: user_id.to_string(),
            }
            .into()
        })
    }

    async fn get_or_create_user(&self, user_id: &str) -> StaffResult<UserRecord> {
        if let Some(record) = self.fetch(user_id).await? {
            return Ok(record);
        }

        let _guard = self.write_lock.lock().await;
        // Another task may have created it while we waited for the lock.
        if let Some(record) = self.fetch(user_id).await? {
            return Ok(record);
        }
        let record = UserRecord::new(user_id);
        self.store(&record).await?;
        debug!(user_id, "Created staff user record");
        Ok(record)
    }

    async fn update_user(&self, user_id: &str, update: UserUpdate) -> StaffResult<UserRecord> {
        Ok(self.modify(user_id, vec![UserMutation::Update(update)]).await?)
    }

    async fn leaderboard(
        &self,
        field: LeaderboardField,
        limit: usize,
    ) -> StaffResult<Vec<UserRecord>> {
        // The column comes from a closed enum, never from user input.
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM staff_user \
             ORDER BY {} DESC LIMIT $limit",
            field.column()
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("limit", limit as u64))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;

        let records = rows
            .into_iter()
            .map(UserRowWithId::try_into_record)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(records)
    }

    async fn transaction(
        &self,
        user_id: &str,
        mutations: Vec<UserMutation>,
    ) -> StaffResult<UserRecord> {
        Ok(self.modify(user_id, mutations).await?)
    }
}
