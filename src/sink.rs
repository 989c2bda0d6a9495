//! Document sink abstraction.
//!
//! The river writes through this trait so the sync engine compiles against a
//! single interface; the HTTP implementation lives in [`crate::elastic`] and
//! the test suite uses [`crate::testing::MemorySink`].

use crate::error::SinkError;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

/// Mapping body that enables timestamp tracking on a document type. Written
/// at provisioning time so every document carries queryable batch metadata.
pub fn timestamp_mapping(doc_type: &str) -> Value {
    json!({ doc_type: { "_timestamp": { "enabled": true } } })
}

/// Operations the river consumes from the document store.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Create the index with timestamp tracking enabled on `doc_type`.
    /// Fails with [`SinkError::IndexExists`] when the index is already there.
    async fn create_index(&self, index: &str, doc_type: &str) -> Result<(), SinkError>;

    /// Put the timestamp-tracking mapping onto an existing index, ignoring
    /// conflicts with a mapping that is already in place.
    async fn put_mapping(&self, index: &str, doc_type: &str) -> Result<(), SinkError>;

    /// Write one document, tagged with the batch timestamp (epoch seconds).
    /// With `id = None` the sink assigns an id.
    async fn upsert(
        &self,
        index: &str,
        doc_type: &str,
        id: Option<&str>,
        fields: &Map<String, Value>,
        timestamp: i64,
    ) -> Result<(), SinkError>;

    /// Bulk-delete every document of `doc_type` whose batch timestamp is
    /// strictly older than `threshold`. Returns the number of deleted
    /// documents when the sink reports one.
    async fn delete_older_than(
        &self,
        index: &str,
        doc_type: &str,
        threshold: i64,
    ) -> Result<u64, SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_enables_timestamp_tracking_for_the_type() {
        assert_eq!(
            timestamp_mapping("data"),
            json!({ "data": { "_timestamp": { "enabled": true } } })
        );
    }
}
