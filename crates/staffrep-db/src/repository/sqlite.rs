//! SQLite implementation of [`UserRepository`].
//!
//! Stores each record as a JSON document in `users.data`. Every write
//! runs inside an immediate transaction, so a multi-step mutation is
//! fully atomic on this backend.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use staffrep_core::error::StaffResult;
use staffrep_core::models::user::{LeaderboardField, UserMutation, UserRecord, UserUpdate};
use staffrep_core::repository::UserRepository;
use tracing::{debug, info};

use crate::error::DbError;
use crate::schema::run_sqlite_migrations;

/// SQLite implementation of the user record store.
#[derive(Clone)]
pub struct SqliteUserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserRepository {
    /// Open or create the database file and run pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening SQLite store");
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        run_sqlite_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let mut conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&mut conn)
    }

    fn modify(&self, user_id: &str, mutations: Vec<UserMutation>) -> Result<UserRecord, DbError> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut record = read_record(&tx, user_id)?.unwrap_or_else(|| UserRecord::new(user_id));
            for mutation in mutations {
                record.apply_mutation(mutation);
            }
            write_record(&tx, &record)?;
            tx.commit()?;
            debug!(user_id, "Committed staff user record");
            Ok(record)
        })
    }
}

fn read_record(conn: &Connection, user_id: &str) -> Result<Option<UserRecord>, DbError> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM users WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .optional()?;

    data.map(|json| parse_record(user_id, &json)).transpose()
}

fn parse_record(user_id: &str, json: &str) -> Result<UserRecord, DbError> {
    let mut record: UserRecord = serde_json::from_str(json)?;
    // The key column is authoritative.
    record.user_id = user_id.to_string();
    Ok(record)
}

fn write_record(conn: &Connection, record: &UserRecord) -> Result<(), DbError> {
    let json = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO users (user_id, data) VALUES (?1, ?2) \
         ON CONFLICT(user_id) DO UPDATE SET data = excluded.data",
        rusqlite::params![record.user_id, json],
    )?;
    Ok(())
}

impl UserRepository for SqliteUserRepository {
    async fn get_user(&self, user_id: &str) -> StaffResult<UserRecord> {
        let record = self.with_conn(|conn| read_record(conn, user_id))?;
        record.ok_or_else(|| {
            DbError::NotFound {
                entity: "user".into(),
                id: user_id.to_string(),
            }
            .into()
        })
    }

    async fn get_or_create_user(&self, user_id: &str) -> StaffResult<UserRecord> {
        let record = self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if let Some(existing) = read_record(&tx, user_id)? {
                return Ok(existing);
            }
            let record = UserRecord::new(user_id);
            write_record(&tx, &record)?;
            tx.commit()?;
            debug!(user_id, "Created staff user record");
            Ok(record)
        })?;
        Ok(record)
    }

    async fn update_user(&self, user_id: &str, update: UserUpdate) -> StaffResult<UserRecord> {
        Ok(self.modify(user_id, vec![UserMutation::Update(update)])?)
    }

    async fn leaderboard(
        &self,
        field: LeaderboardField,
        limit: usize,
    ) -> StaffResult<Vec<UserRecord>> {
        let mut records = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT user_id, data FROM users")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (user_id, json) = row?;
                records.push(parse_record(&user_id, &json)?);
            }
            Ok(records)
        })?;

        records.sort_by(|a, b| field.value(b).cmp(&field.value(a)));
        records.truncate(limit);
        Ok(records)
    }

    async fn transaction(
        &self,
        user_id: &str,
        mutations: Vec<UserMutation>,
    ) -> StaffResult<UserRecord> {
        Ok(self.modify(user_id, mutations)?)
    }
}
