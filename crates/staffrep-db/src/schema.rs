//! Schema definitions and migration runners.
//!
//! SurrealDB tables use SCHEMAFULL mode so a record can never gain an
//! undeclared field. The SQLite backend keeps one JSON document per row
//! and tracks its version in `PRAGMA user_version`.

use rusqlite::Connection;
use surrealdb::{Connection as SurrealConnection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "staff_user",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — staff user records
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
DEFINE TABLE staff_user SCHEMAFULL;
DEFINE FIELD schema_version ON TABLE staff_user TYPE int DEFAULT 1;
DEFINE FIELD positive_rep ON TABLE staff_user TYPE int DEFAULT 0 \
    ASSERT $value >= 0;
DEFINE FIELD negative_rep ON TABLE staff_user TYPE int DEFAULT 0 \
    ASSERT $value >= 0;

DEFINE FIELD reputation_history ON TABLE staff_user TYPE array<object> \
    DEFAULT [];
DEFINE FIELD reputation_history.*.timestamp ON TABLE staff_user TYPE int;
DEFINE FIELD reputation_history.*.moderator_id ON TABLE staff_user \
    TYPE string;
DEFINE FIELD reputation_history.*.action ON TABLE staff_user TYPE string \
    ASSERT $value IN ['ADD_POS', 'ADD_NEG', 'PROMOTE', 'DEMOTE', 'RESET'];
DEFINE FIELD reputation_history.*.amount ON TABLE staff_user TYPE int;
DEFINE FIELD reputation_history.*.reason ON TABLE staff_user TYPE string;

DEFINE FIELD loa_status ON TABLE staff_user TYPE object DEFAULT {};
DEFINE FIELD loa_status.is_active ON TABLE staff_user TYPE bool \
    DEFAULT false;
DEFINE FIELD loa_status.since ON TABLE staff_user TYPE option<int>;
DEFINE FIELD loa_status.reason ON TABLE staff_user TYPE option<string>;

DEFINE FIELD updated_at ON TABLE staff_user TYPE datetime \
    DEFAULT time::now();

DEFINE INDEX idx_staff_user_positive ON TABLE staff_user \
    COLUMNS positive_rep;
DEFINE INDEX idx_staff_user_negative ON TABLE staff_user \
    COLUMNS negative_rep;
";

/// Run all pending SurrealDB migrations.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: SurrealConnection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw SurrealDB schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

// -----------------------------------------------------------------------
// SQLite
// -----------------------------------------------------------------------

/// Current SQLite schema version.
pub(crate) const SQLITE_SCHEMA_VERSION: u32 = 1;

const SQLITE_SCHEMA_V1: &str = "\
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    data    TEXT NOT NULL
);
";

/// Bring a SQLite database up to [`SQLITE_SCHEMA_VERSION`].
pub(crate) fn run_sqlite_migrations(conn: &Connection) -> Result<(), DbError> {
    let current_version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current_version > SQLITE_SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database version {current_version} is newer than supported {SQLITE_SCHEMA_VERSION}"
        )));
    }

    if current_version == 0 {
        info!(version = SQLITE_SCHEMA_VERSION, "Initializing SQLite schema");
        conn.execute_batch(SQLITE_SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", SQLITE_SCHEMA_VERSION)?;
    }

    Ok(())
}
