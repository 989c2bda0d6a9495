//! Batch document writes.

use crate::document::DocumentRecord;
use crate::sink::DocumentSink;
use tracing::{debug, warn};

/// Emit a progress report after every this many documents.
const PROGRESS_EVERY: u64 = 100;

/// Upserts the documents of one batch, independently of each other. A failed
/// write is logged and counted; one bad row must not block the rest.
pub struct BatchWriter<'a> {
    sink: &'a dyn DocumentSink,
    index: &'a str,
    doc_type: &'a str,
    total: Option<u64>,
    written: u64,
    failed: u64,
}

impl<'a> BatchWriter<'a> {
    pub fn new(
        sink: &'a dyn DocumentSink,
        index: &'a str,
        doc_type: &'a str,
        total: Option<u64>,
    ) -> Self {
        BatchWriter {
            sink,
            index,
            doc_type,
            total,
            written: 0,
            failed: 0,
        }
    }

    pub async fn write(&mut self, document: DocumentRecord) {
        let result = self
            .sink
            .upsert(
                self.index,
                self.doc_type,
                document.id.as_deref(),
                &document.fields,
                document.batch_timestamp,
            )
            .await;

        match result {
            Ok(()) => self.written += 1,
            Err(e) => {
                warn!(
                    "Failed to index document {:?} into {}/{}: {e:#}",
                    document.id, self.index, self.doc_type
                );
                self.failed += 1;
            }
        }

        let processed = self.written + self.failed;
        if processed % PROGRESS_EVERY == 0 {
            match self.total {
                Some(total) => debug!(
                    "Processed {processed} of {total} entries ({} percent done)",
                    percent_done(processed, total)
                ),
                None => debug!("Processed {processed} entries"),
            }
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }
}

fn percent_done(processed: u64, total: u64) -> u32 {
    (processed as f64 / total as f64 * 100.0).round() as u32
}
