//! mysql-river
//!
//! A connector that periodically executes a fixed query against MySQL and
//! mirrors the resulting rows into a document index. Every run is a full
//! refresh: the query result replaces the index contents, and documents that
//! were not refreshed by the latest run are purged as stale.
//!
//! # Design
//!
//! - [`scheduler::Scheduler`] runs a cancellable background loop that invokes
//!   one sync cycle per interval (or exactly once when the interval is zero
//!   or negative).
//! - [`cycle::SyncCycle`] orchestrates one run: ensure the index exists, open
//!   a row stream, map rows to documents, upsert them in a batch tagged with
//!   one logical timestamp, then purge documents with an older tag.
//! - [`source::RowSource`] and [`sink::DocumentSink`] are the seams to the
//!   relational database and the document store; [`mysql`] and [`elastic`]
//!   provide the shipped implementations.
//!
//! # Usage
//!
//! ```bash
//! mysql-river \
//!   --hostname localhost --database shop \
//!   --username reader --password secret \
//!   --query "SELECT id, name, price FROM products" \
//!   --unique-id-field id \
//!   --index products --interval 600000
//! ```

pub mod config;
pub mod cycle;
pub mod document;
pub mod elastic;
pub mod error;
pub mod mysql;
pub mod purge;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod testing;
pub mod writer;

pub use config::{RiverConfig, RiverOpts};
pub use cycle::{AbortReason, CycleResult, SyncCycle};
pub use elastic::{ElasticOpts, ElasticSink};
pub use error::{ConfigError, SinkError, SourceError};
pub use mysql::MysqlSource;
pub use scheduler::Scheduler;
pub use sink::DocumentSink;
pub use source::{Row, RowSource, RowStream};
