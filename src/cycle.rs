//! One end-to-end sync cycle: provision → read → write → purge.

use crate::config::RiverConfig;
use crate::document::{map_row, BatchContext};
use crate::error::SinkError;
use crate::purge::purge_stale;
use crate::sink::DocumentSink;
use crate::source::RowSource;
use crate::writer::BatchWriter;
use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why a cycle stopped short of a full refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbortReason {
    /// Index or mapping provisioning failed; retried from scratch next cycle.
    Provisioning,
    /// The source connection or query failed.
    SourceUnavailable,
    /// The query returned no rows; the index is left untouched.
    EmptyResult,
    /// Cancellation was observed mid-cycle.
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            AbortReason::Provisioning => "index provisioning failed",
            AbortReason::SourceUnavailable => "source unavailable",
            AbortReason::EmptyResult => "query returned no rows",
            AbortReason::Cancelled => "cancelled",
        };
        f.write_str(reason)
    }
}

/// Summary of one cycle, reported to the scheduler for logging.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleResult {
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_failed: u64,
    pub deleted_stale: u64,
    pub aborted: bool,
    pub abort_reason: Option<AbortReason>,
}

impl CycleResult {
    fn aborted(reason: AbortReason) -> Self {
        CycleResult {
            aborted: true,
            abort_reason: Some(reason),
            ..CycleResult::default()
        }
    }

    fn incomplete(self, reason: AbortReason) -> Self {
        CycleResult {
            aborted: true,
            abort_reason: Some(reason),
            ..self
        }
    }
}

/// Runs one full refresh of the index from the source query.
pub struct SyncCycle<'a> {
    config: &'a RiverConfig,
    source: &'a dyn RowSource,
    sink: &'a dyn DocumentSink,
}

impl<'a> SyncCycle<'a> {
    pub fn new(
        config: &'a RiverConfig,
        source: &'a dyn RowSource,
        sink: &'a dyn DocumentSink,
    ) -> Self {
        SyncCycle {
            config,
            source,
            sink,
        }
    }

    /// Run the cycle to completion or to an abort. Never returns an error:
    /// every failure is contained here and reported through the result, so
    /// the scheduler keeps running regardless of what one cycle did.
    pub async fn run(&self, cancel: &CancellationToken) -> CycleResult {
        let index = &self.config.index;
        let doc_type = &self.config.doc_type;

        // The batch timestamp is fixed before anything else happens; writes
        // and the purge threshold both use this one value.
        let timestamp = Utc::now().timestamp();

        if !self.provision(index, doc_type).await {
            return CycleResult::aborted(AbortReason::Provisioning);
        }

        let mut stream = match self.source.execute(&self.config.query).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("{e:#}; aborting this cycle");
                return CycleResult::aborted(AbortReason::SourceUnavailable);
            }
        };

        let total = stream.total_rows();
        match total {
            Some(total) => info!("Got {total} results from the source database"),
            None => debug!("Source did not report a row count"),
        }
        if total == Some(0) {
            warn!("Got 0 results from the source. Aborting before we remove still valid documents.");
            return CycleResult::aborted(AbortReason::EmptyResult);
        }

        let ctx = BatchContext {
            timestamp,
            total_rows: total,
        };
        let mut writer = BatchWriter::new(self.sink, index, doc_type, total);
        let mut rows_read = 0u64;
        let unique_id_field = self.config.unique_id_field.as_deref();

        let outcome = loop {
            if cancel.is_cancelled() {
                break Some(AbortReason::Cancelled);
            }
            match stream.next().await {
                None => break None,
                Some(Ok(row)) => {
                    rows_read += 1;
                    writer.write(map_row(row, unique_id_field, &ctx)).await;
                }
                Some(Err(e)) => {
                    error!("{e:#}; aborting this cycle");
                    break Some(AbortReason::SourceUnavailable);
                }
            }
        };

        let result = CycleResult {
            rows_read,
            rows_written: writer.written(),
            rows_failed: writer.failed(),
            deleted_stale: 0,
            aborted: false,
            abort_reason: None,
        };

        if let Some(reason) = outcome {
            // The refresh is incomplete; purging now would delete documents
            // that are still live in the source.
            info!("Cycle stopped after {rows_read} rows ({reason}); skipping the stale purge");
            return result.incomplete(reason);
        }

        if rows_read == 0 {
            // A source with no count probe can still come back empty.
            warn!("Got 0 results from the source. Aborting before we remove still valid documents.");
            return result.incomplete(AbortReason::EmptyResult);
        }

        info!(
            "Imported {} documents into {index}/{doc_type}",
            result.rows_written
        );

        let deleted_stale = if self.config.delete_old_entries {
            match purge_stale(self.sink, index, doc_type, timestamp).await {
                Ok(deleted) => deleted,
                Err(e) => {
                    // Best effort: the refresh itself is already complete.
                    warn!("Stale purge on {index}/{doc_type} failed: {e:#}");
                    0
                }
            }
        } else {
            info!("Not removing stale documents from {index}/{doc_type}");
            0
        };

        CycleResult {
            deleted_stale,
            ..result
        }
    }

    /// Ensure index and mapping exist with timestamp tracking. Tolerates both
    /// already-provisioned outcomes; any other failure skips this cycle only,
    /// and the scheduler retries from scratch at the next interval.
    async fn provision(&self, index: &str, doc_type: &str) -> bool {
        match self.sink.create_index(index, doc_type).await {
            Ok(()) => info!("Created index {index} with timestamp mapping for {doc_type}"),
            Err(SinkError::IndexExists) => {
                debug!("Not creating index {index} as it already exists")
            }
            Err(e) => {
                warn!("Failed to create index {index}: {e:#}; skipping this cycle");
                return false;
            }
        }

        match self.sink.put_mapping(index, doc_type).await {
            Ok(()) => true,
            Err(SinkError::MappingConflict) | Err(SinkError::IndexExists) => {
                debug!("Mapping already exists for index {index} and type {doc_type}");
                true
            }
            Err(e) => {
                warn!("Failed to put mapping {index}/{doc_type}: {e:#}; skipping this cycle");
                false
            }
        }
    }
}
