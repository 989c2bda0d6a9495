//! Error types for the river.
//!
//! Only [`ConfigError`] is fatal to the component as a whole; it is surfaced
//! once, before the scheduler starts. Every other condition is contained
//! within a single sync cycle and reported through [`crate::cycle::CycleResult`].

use thiserror::Error;

/// A required setting is missing or unusable at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    MissingSetting(&'static str),
}

/// The relational source could not be reached or the query failed.
#[derive(Debug, Error)]
#[error("source unavailable: {0}")]
pub struct SourceError(#[from] anyhow::Error);

impl From<mysql_async::Error> for SourceError {
    fn from(e: mysql_async::Error) -> Self {
        SourceError(anyhow::Error::new(e))
    }
}

/// A document sink operation failed.
///
/// `IndexExists` and `MappingConflict` discriminate the provisioning outcomes
/// a cycle tolerates from the ones that skip it.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("index already exists")]
    IndexExists,
    #[error("mapping already exists and conflicts were ignored")]
    MappingConflict,
    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        SinkError::Request(anyhow::Error::new(e))
    }
}
