//! Stale document purge.

use crate::error::SinkError;
use crate::sink::DocumentSink;
use tracing::info;

/// Delete every document of the type whose batch timestamp is strictly older
/// than `threshold`, i.e. the documents the current cycle did not refresh.
///
/// Must only run after all writes of the cycle have completed, so no document
/// written moments earlier can still carry a previous cycle's timestamp.
pub async fn purge_stale(
    sink: &dyn DocumentSink,
    index: &str,
    doc_type: &str,
    threshold: i64,
) -> Result<u64, SinkError> {
    info!("Removing stale documents from {index}/{doc_type}");
    let deleted = sink.delete_older_than(index, doc_type, threshold).await?;
    info!("Removed {deleted} stale documents from {index}/{doc_type}");
    Ok(deleted)
}
