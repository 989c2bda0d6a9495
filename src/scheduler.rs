//! The scheduling loop.
//!
//! One background worker runs cycles at the configured interval, sleeping in
//! one-second slices so a stop request is observed promptly between cycles.
//! A cycle already in progress is not interrupted mid-call; it observes the
//! same cancellation token between rows.

use crate::config::RiverConfig;
use crate::cycle::SyncCycle;
use crate::sink::DocumentSink;
use crate::source::RowSource;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SLEEP_SLICE: Duration = Duration::from_secs(1);

/// Drives [`SyncCycle`] on a background task. `start` and `stop` are
/// idempotent; a scheduler is single-use and cannot be restarted once
/// stopped.
pub struct Scheduler {
    config: Arc<RiverConfig>,
    source: Arc<dyn RowSource>,
    sink: Arc<dyn DocumentSink>,
    cancel: CancellationToken,
    finished: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        config: Arc<RiverConfig>,
        source: Arc<dyn RowSource>,
        sink: Arc<dyn DocumentSink>,
    ) -> Self {
        Scheduler {
            config,
            source,
            sink,
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    /// Begin background scheduling. A second call is a no-op.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            debug!("Import worker is already running");
            return;
        }

        let config = Arc::clone(&self.config);
        let source = Arc::clone(&self.source);
        let sink = Arc::clone(&self.sink);
        let cancel = self.cancel.clone();
        let finished = self.finished.clone();

        *worker = Some(tokio::spawn(async move {
            run_loop(config, source, sink, cancel).await;
            finished.cancel();
        }));
    }

    /// Request a graceful halt and wait for the worker to exit. The current
    /// cycle is not interrupted mid-write; it stops at the next row check.
    pub async fn stop(&self) {
        info!("Closing river {}", self.config.name);
        self.cancel.cancel();
        let running = self.worker.lock().unwrap().is_some();
        if running {
            self.finished.cancelled().await;
        }
    }

    /// Wait until the worker exits on its own (one-shot mode, or after a
    /// concurrent `stop`).
    pub async fn join(&self) {
        self.finished.cancelled().await;
    }
}

async fn run_loop(
    config: Arc<RiverConfig>,
    source: Arc<dyn RowSource>,
    sink: Arc<dyn DocumentSink>,
    cancel: CancellationToken,
) {
    info!("Import worker for river {} has started", config.name);

    let mut last_run: Option<Instant> = None;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let due = match (last_run, config.interval()) {
            (None, _) => true,
            (Some(at), Some(interval)) => at.elapsed() >= interval,
            // One-shot mode exits right after the first cycle.
            (Some(_), None) => false,
        };

        if due {
            last_run = Some(Instant::now());

            let cycle = SyncCycle::new(&config, source.as_ref(), sink.as_ref());
            let result = cycle.run(&cancel).await;
            match result.abort_reason {
                Some(reason) => warn!("Cycle aborted ({reason}): {result:?}"),
                None => info!(
                    "Cycle complete: {} read, {} written, {} failed, {} stale documents removed",
                    result.rows_read, result.rows_written, result.rows_failed, result.deleted_stale
                ),
            }

            if config.one_shot() {
                break;
            }
            if !cancel.is_cancelled() {
                info!(
                    "Import worker is waiting for {} seconds until the next run",
                    config.interval_ms / 1000
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(SLEEP_SLICE) => {}
        }
    }

    info!("Import worker for river {} has finished", config.name);
}
