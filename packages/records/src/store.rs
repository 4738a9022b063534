//! The record store interface.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A row: column name to scalar value (string, number, bool or null).
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Future returned by [`RecordStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RecordError>> + Send + 'a>>;

/// Key of a row within its table. Stable until the row is removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowRef(pub String);

impl std::fmt::Display for RowRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}", self.0)
    }
}

/// A live row together with its reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub row: RowRef,
    pub record: Record,
}

/// Record store errors.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("{table}: {row} not found")]
    RowNotFound { table: String, row: RowRef },
    #[error("column {column} holds a non-scalar value")]
    NonScalar { column: String },
    #[error("invalid table or column name: {0:?}")]
    InvalidName(String),
    #[error("value does not serialize to a record")]
    NotARecord,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// CRUD over named tables of flat records.
///
/// Implementations are shared behind `Arc<dyn RecordStore>`, so operations
/// return boxed futures.
pub trait RecordStore: Send + Sync {
    /// Every live row of `table`, oldest first. Unknown tables are empty.
    fn find_all<'a>(&'a self, table: &'a str) -> StoreFuture<'a, Vec<Row>>;

    /// Rows whose columns equal every column in `filter`, oldest first.
    fn find_where<'a>(&'a self, table: &'a str, filter: &'a Record) -> StoreFuture<'a, Vec<Row>>;

    /// Append a row, creating the table on first use.
    fn insert<'a>(&'a self, table: &'a str, record: Record) -> StoreFuture<'a, RowRef>;

    /// Overwrite the given columns of a live row.
    fn update<'a>(&'a self, table: &'a str, row: &'a RowRef, partial: Record) -> StoreFuture<'a, ()>;

    /// Remove a row. Removed rows are no longer found or counted.
    fn remove<'a>(&'a self, table: &'a str, row: &'a RowRef) -> StoreFuture<'a, ()>;

    /// Number of live rows in `table`.
    fn count<'a>(&'a self, table: &'a str) -> StoreFuture<'a, usize>;
}

/// Reject nested values; the store is tabular.
pub(crate) fn ensure_scalar(record: &Record) -> Result<(), RecordError> {
    match record.iter().find(|(_, v)| v.is_object() || v.is_array()) {
        Some((column, _)) => Err(RecordError::NonScalar {
            column: column.clone(),
        }),
        None => Ok(()),
    }
}

/// Table and column names are spliced into queries, so only plain
/// identifiers are accepted.
pub(crate) fn ensure_identifier(name: &str) -> Result<(), RecordError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RecordError::InvalidName(name.to_string()))
    }
}
