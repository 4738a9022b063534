//! SurrealDB-backed record store.
//!
//! Each table is a SurrealDB table. A row is one record whose key is the
//! [`RowRef`] and whose columns live under a `fields` object, which keeps
//! them clear of SurrealDB's own `id`.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use ulid::{Generator, Ulid};

use crate::store::{
    Record, RecordError, RecordStore, Row, RowRef, StoreFuture, ensure_identifier, ensure_scalar,
};

/// Record store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Connection endpoint: "mem://", "rocksdb://path" or a remote address
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "kernel".to_string(),
            database: "records".to_string(),
            credentials: None,
        }
    }
}

impl StoreConfig {
    /// In-memory store, for tests and single-process use.
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

/// Stored shape of a row.
#[derive(Serialize)]
struct Document {
    fields: Record,
}

#[derive(Deserialize)]
struct StoredRow {
    row: String,
    #[serde(default)]
    fields: Record,
}

impl From<StoredRow> for Row {
    fn from(stored: StoredRow) -> Self {
        Row {
            row: RowRef(stored.row),
            record: stored.fields,
        }
    }
}

#[derive(Deserialize)]
struct Counted {
    count: i64,
}

/// A [`RecordStore`] over a SurrealDB connection.
///
/// Each store owns its connection; two stores opened on `mem://` share nothing.
pub struct SurrealRecordStore {
    db: Surreal<Any>,
    keys: Mutex<Generator>,
}

impl SurrealRecordStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, RecordError> {
        tracing::info!("Connecting to record store: {}", config.endpoint);

        let db = connect(&config.endpoint).await?;

        if let Some((username, password)) = &config.credentials {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(&config.namespace).use_db(&config.database).await?;

        tracing::info!(
            "Connected to record store: {}/{}",
            config.namespace,
            config.database
        );

        Ok(Self {
            db,
            keys: Mutex::new(Generator::new()),
        })
    }

    /// Open a fresh in-memory store.
    pub async fn memory() -> Result<Self, RecordError> {
        Self::connect(&StoreConfig::memory()).await
    }

    /// The underlying connection.
    pub fn database(&self) -> &Surreal<Any> {
        &self.db
    }

    /// Monotonic ULID keys, so key order is insertion order.
    fn next_key(&self) -> String {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.generate().unwrap_or_else(|_| Ulid::new()).to_string()
    }

    async fn exists(&self, table: &str, row: &RowRef) -> Result<bool, RecordError> {
        let mut response = self
            .db
            .query("SELECT meta::id(id) AS row, fields FROM type::thing($table, $key)")
            .bind(("table", table.to_string()))
            .bind(("key", row.0.clone()))
            .await?;
        let found: Vec<StoredRow> = response.take(0)?;
        Ok(!found.is_empty())
    }

    async fn select(
        &self,
        table: &str,
        conditions: Vec<String>,
        bindings: Vec<(String, Value)>,
    ) -> Result<Vec<Row>, RecordError> {
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let query = format!(
            "SELECT meta::id(id) AS row, fields FROM type::table($table) {} ORDER BY row ASC",
            where_clause
        );

        let mut result = self.db.query(&query).bind(("table", table.to_string()));
        for binding in bindings {
            result = result.bind(binding);
        }

        let mut response = result.await?;
        let rows: Vec<StoredRow> = response.take(0)?;

        Ok(rows.into_iter().map(Row::from).collect())
    }
}

impl std::fmt::Debug for SurrealRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealRecordStore").finish_non_exhaustive()
    }
}

impl RecordStore for SurrealRecordStore {
    fn find_all<'a>(&'a self, table: &'a str) -> StoreFuture<'a, Vec<Row>> {
        Box::pin(async move {
            ensure_identifier(table)?;
            self.select(table, Vec::new(), Vec::new()).await
        })
    }

    fn find_where<'a>(&'a self, table: &'a str, filter: &'a Record) -> StoreFuture<'a, Vec<Row>> {
        Box::pin(async move {
            ensure_identifier(table)?;
            let mut conditions = Vec::with_capacity(filter.len());
            let mut bindings = Vec::with_capacity(filter.len());
            for (i, (column, value)) in filter.iter().enumerate() {
                ensure_identifier(column)?;
                conditions.push(format!("fields.`{}` = $f{}", column, i));
                bindings.push((format!("f{}", i), value.clone()));
            }
            self.select(table, conditions, bindings).await
        })
    }

    fn insert<'a>(&'a self, table: &'a str, record: Record) -> StoreFuture<'a, RowRef> {
        Box::pin(async move {
            ensure_identifier(table)?;
            ensure_scalar(&record)?;
            let key = self.next_key();

            self.db
                .query("CREATE type::thing($table, $key) CONTENT $document RETURN NONE")
                .bind(("table", table.to_string()))
                .bind(("key", key.clone()))
                .bind(("document", Document { fields: record }))
                .await?
                .check()?;

            tracing::debug!("Inserted {}:{}", table, key);
            Ok(RowRef(key))
        })
    }

    fn update<'a>(
        &'a self,
        table: &'a str,
        row: &'a RowRef,
        partial: Record,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            ensure_identifier(table)?;
            ensure_scalar(&partial)?;
            if !self.exists(table, row).await? {
                return Err(RecordError::RowNotFound {
                    table: table.to_string(),
                    row: row.clone(),
                });
            }
            if partial.is_empty() {
                return Ok(());
            }

            let mut assignments = Vec::with_capacity(partial.len());
            let mut bindings = Vec::with_capacity(partial.len());
            for (i, (column, value)) in partial.into_iter().enumerate() {
                ensure_identifier(&column)?;
                assignments.push(format!("fields.`{}` = $c{}", column, i));
                bindings.push((format!("c{}", i), value));
            }
            let query = format!(
                "UPDATE type::thing($table, $key) SET {} RETURN NONE",
                assignments.join(", ")
            );

            let mut result = self
                .db
                .query(&query)
                .bind(("table", table.to_string()))
                .bind(("key", row.0.clone()));
            for binding in bindings {
                result = result.bind(binding);
            }
            result.await?.check()?;
            Ok(())
        })
    }

    fn remove<'a>(&'a self, table: &'a str, row: &'a RowRef) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            ensure_identifier(table)?;
            if !self.exists(table, row).await? {
                return Err(RecordError::RowNotFound {
                    table: table.to_string(),
                    row: row.clone(),
                });
            }

            self.db
                .query("DELETE type::thing($table, $key) RETURN NONE")
                .bind(("table", table.to_string()))
                .bind(("key", row.0.clone()))
                .await?
                .check()?;

            tracing::debug!("Removed {}:{}", table, row.0);
            Ok(())
        })
    }

    fn count<'a>(&'a self, table: &'a str) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            ensure_identifier(table)?;
            let mut response = self
                .db
                .query("SELECT count() AS count FROM type::table($table) GROUP ALL")
                .bind(("table", table.to_string()))
                .await?;
            let counts: Vec<Counted> = response.take(0)?;
            Ok(counts
                .first()
                .map_or(0, |c| usize::try_from(c.count).unwrap_or(0)))
        })
    }
}
