//! Tabular persistence adapter for kernel snapshots.
//!
//! The kernel itself never touches storage. A worker layer that wants
//! durability saves job and session snapshots through a [`RecordStore`],
//! which models a table of rows, each a flat map of column name to scalar.
//!
//! # Backends
//!
//! - [`SurrealRecordStore`]: SurrealDB, in memory (`mem://`) by default

mod codec;
pub mod repositories;
mod store;
mod surreal;

pub use store::{Record, RecordError, RecordStore, Row, RowRef, StoreFuture};
pub use surreal::{StoreConfig, SurrealRecordStore};
