//! Test infrastructure: an in-memory document sink and a canned row source.
//!
//! Used by the integration tests to drive full cycles without a database or
//! an index server on the other side.

use crate::error::{SinkError, SourceError};
use crate::sink::DocumentSink;
use crate::source::{Row, RowSource, RowStream};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Build a [`Row`] from column/value pairs.
pub fn row(columns: &[(&str, Option<&str>)]) -> Row {
    Row {
        columns: columns
            .iter()
            .map(|(column, value)| (column.to_string(), value.map(str::to_string)))
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub fields: Map<String, Value>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default)]
pub struct SinkState {
    pub documents: HashMap<String, StoredDocument>,
    pub create_index_calls: u64,
    pub put_mapping_calls: u64,
    pub upsert_calls: u64,
    pub purge_thresholds: Vec<i64>,
    auto_ids: u64,
}

/// In-memory [`DocumentSink`] with failure and cancellation knobs.
#[derive(Default)]
pub struct MemorySink {
    state: Mutex<SinkState>,
    index_exists: bool,
    fail_create_index: bool,
    fail_upsert_at: Option<u64>,
    cancel_after: Option<(u64, CancellationToken)>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    /// Index creation reports "already exists".
    pub fn with_existing_index(mut self) -> Self {
        self.index_exists = true;
        self
    }

    /// Index creation fails outright.
    pub fn failing_provisioning(mut self) -> Self {
        self.fail_create_index = true;
        self
    }

    /// The n-th upsert call (1-based) fails.
    pub fn failing_upsert_at(mut self, call: u64) -> Self {
        self.fail_upsert_at = Some(call);
        self
    }

    /// Cancel `token` as a side effect of the n-th successful upsert,
    /// simulating a `stop()` that lands mid-cycle.
    pub fn cancelling_after(mut self, call: u64, token: CancellationToken) -> Self {
        self.cancel_after = Some((call, token));
        self
    }

    /// Seed a document as if written by an earlier cycle.
    pub fn seed_document(&self, id: &str, fields: Map<String, Value>, timestamp: i64) {
        let mut state = self.state.lock().unwrap();
        state
            .documents
            .insert(id.to_string(), StoredDocument { fields, timestamp });
    }

    pub fn snapshot(&self) -> SinkState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn create_index(&self, _index: &str, _doc_type: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        state.create_index_calls += 1;
        if self.fail_create_index {
            return Err(SinkError::Request(anyhow::anyhow!(
                "simulated provisioning failure"
            )));
        }
        if self.index_exists {
            return Err(SinkError::IndexExists);
        }
        Ok(())
    }

    async fn put_mapping(&self, _index: &str, _doc_type: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        state.put_mapping_calls += 1;
        if self.index_exists {
            return Err(SinkError::MappingConflict);
        }
        Ok(())
    }

    async fn upsert(
        &self,
        _index: &str,
        _doc_type: &str,
        id: Option<&str>,
        fields: &Map<String, Value>,
        timestamp: i64,
    ) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        state.upsert_calls += 1;
        let call = state.upsert_calls;

        if self.fail_upsert_at == Some(call) {
            return Err(SinkError::Request(anyhow::anyhow!(
                "simulated write failure"
            )));
        }

        let id = match id {
            Some(id) => id.to_string(),
            None => {
                state.auto_ids += 1;
                format!("_assigned-{}", state.auto_ids)
            }
        };
        state.documents.insert(
            id,
            StoredDocument {
                fields: fields.clone(),
                timestamp,
            },
        );

        if let Some((at, token)) = &self.cancel_after {
            if call == *at {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn delete_older_than(
        &self,
        _index: &str,
        _doc_type: &str,
        threshold: i64,
    ) -> Result<u64, SinkError> {
        let mut state = self.state.lock().unwrap();
        state.purge_thresholds.push(threshold);
        let before = state.documents.len();
        state.documents.retain(|_, doc| doc.timestamp >= threshold);
        Ok((before - state.documents.len()) as u64)
    }
}

/// Canned [`RowSource`] that replays the same rows on every execution.
pub struct StaticRowSource {
    rows: Vec<Row>,
    report_total: bool,
    fail_execute: bool,
    executions: AtomicU64,
}

impl StaticRowSource {
    pub fn new(rows: Vec<Row>) -> Self {
        StaticRowSource {
            rows,
            report_total: true,
            fail_execute: false,
            executions: AtomicU64::new(0),
        }
    }

    /// The stream reports an unknown total, as a source without a cheap
    /// count probe would.
    pub fn without_total(mut self) -> Self {
        self.report_total = false;
        self
    }

    /// Every execution fails as if the database were unreachable.
    pub fn unreachable() -> Self {
        StaticRowSource {
            rows: Vec::new(),
            report_total: true,
            fail_execute: true,
            executions: AtomicU64::new(0),
        }
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RowSource for StaticRowSource {
    async fn execute(&self, _query: &str) -> Result<Box<dyn RowStream>, SourceError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.fail_execute {
            return Err(SourceError::from(anyhow::anyhow!(
                "connection refused (simulated)"
            )));
        }
        Ok(Box::new(StaticRowStream {
            total: self.report_total.then(|| self.rows.len() as u64),
            rows: self.rows.clone().into(),
        }))
    }
}

struct StaticRowStream {
    total: Option<u64>,
    rows: VecDeque<Row>,
}

#[async_trait]
impl RowStream for StaticRowStream {
    fn total_rows(&self) -> Option<u64> {
        self.total
    }

    async fn next(&mut self) -> Option<Result<Row, SourceError>> {
        self.rows.pop_front().map(Ok)
    }
}
