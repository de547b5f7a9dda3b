//! Store configuration and SurrealDB connection management.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;

/// Which physical store backs the user records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// One SurrealDB document per user.
    Surreal,
    /// One SQLite row per user holding a JSON blob.
    Sqlite,
}

impl Backend {
    pub fn parse(s: &str) -> Result<Self, DbError> {
        match s.to_ascii_uppercase().as_str() {
            "SURREAL" | "SURREALDB" => Ok(Backend::Surreal),
            "SQLITE" => Ok(Backend::Sqlite),
            other => Err(DbError::Config(format!("unsupported DB_TYPE: {other}"))),
        }
    }
}

/// Configuration for the user record store.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub backend: Backend,
    /// WebSocket URL (e.g., `127.0.0.1:8000`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
    /// Database file for the SQLite backend.
    pub sqlite_path: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Surreal,
            url: "127.0.0.1:8000".into(),
            namespace: "staffrep".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
            sqlite_path: None,
        }
    }
}

impl DbConfig {
    /// Build a configuration from the process environment.
    ///
    /// `DB_TYPE` picks the backend; `SQLITE_PATH` is required for
    /// SQLite. SurrealDB settings fall back to the defaults.
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`DbConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DbError> {
        let defaults = Self::default();
        let backend = match lookup("DB_TYPE") {
            Some(value) => Backend::parse(&value)?,
            None => return Err(DbError::Config("DB_TYPE is not set".into())),
        };
        let sqlite_path = lookup("SQLITE_PATH");
        if backend == Backend::Sqlite && sqlite_path.is_none() {
            return Err(DbError::Config(
                "SQLITE_PATH is not set for DB_TYPE=SQLITE".into(),
            ));
        }

        Ok(Self {
            backend,
            url: lookup("SURREAL_URL").unwrap_or(defaults.url),
            namespace: lookup("SURREAL_NS").unwrap_or(defaults.namespace),
            database: lookup("SURREAL_DB").unwrap_or(defaults.database),
            username: lookup("SURREAL_USER").unwrap_or(defaults.username),
            password: lookup("SURREAL_PASS").unwrap_or(defaults.password),
            sqlite_path,
        })
    }
}

/// Manages a connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Connect to SurrealDB using the provided configuration.
    ///
    /// Authenticates as root, selects the configured namespace and
    /// database, and returns a ready-to-use manager.
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;

        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Successfully connected to SurrealDB");

        Ok(Self { db })
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
