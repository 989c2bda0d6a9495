//! Cycle-level scenario tests, driven through the in-memory sink and a
//! canned row source.

use mysql_river::testing::{row, MemorySink, StaticRowSource};
use mysql_river::{AbortReason, CycleResult, DocumentSink, RiverConfig, RiverOpts, SyncCycle};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

fn config(mutate: impl FnOnce(&mut RiverOpts)) -> RiverConfig {
    let mut opts = RiverOpts {
        name: "rivertest".to_string(),
        hostname: Some("localhost".to_string()),
        database: Some("testdb".to_string()),
        username: Some("root".to_string()),
        password: Some("root".to_string()),
        query: Some("SELECT * FROM users".to_string()),
        index: None,
        doc_type: "data".to_string(),
        unique_id_field: Some("uid".to_string()),
        delete_old_entries: true,
        interval: 600_000,
    };
    mutate(&mut opts);
    RiverConfig::resolve(opts).unwrap()
}

fn numbered_rows(count: u64) -> Vec<mysql_river::Row> {
    (1..=count)
        .map(|n| row(&[("uid", Some(n.to_string().as_str())), ("name", Some("user"))]))
        .collect()
}

async fn run_cycle(
    config: &RiverConfig,
    source: &StaticRowSource,
    sink: &MemorySink,
) -> CycleResult {
    SyncCycle::new(config, source, sink)
        .run(&CancellationToken::new())
        .await
}

#[tokio::test]
async fn three_rows_are_upserted_under_their_unique_ids() {
    let config = config(|_| {});
    let source = StaticRowSource::new(numbered_rows(3));
    let sink = MemorySink::new();

    // Documents from an earlier run, refreshed in place by this one.
    for id in ["1", "2", "3"] {
        sink.seed_document(id, Map::new(), 1);
    }

    let result = run_cycle(&config, &source, &sink).await;

    assert!(!result.aborted);
    assert_eq!(result.rows_read, 3);
    assert_eq!(result.rows_written, 3);
    assert_eq!(result.rows_failed, 0);
    assert_eq!(result.deleted_stale, 0);

    let state = sink.snapshot();
    let mut ids: Vec<_> = state.documents.keys().cloned().collect();
    ids.sort();
    assert_eq!(ids, ["1", "2", "3"]);
    assert_eq!(
        state.documents["2"].fields["name"],
        Value::String("user".to_string())
    );
}

#[tokio::test]
async fn every_document_carries_the_cycle_timestamp() {
    let config = config(|_| {});
    let source = StaticRowSource::new(numbered_rows(5));
    let sink = MemorySink::new();

    let result = run_cycle(&config, &source, &sink).await;
    assert!(!result.aborted);

    let state = sink.snapshot();
    assert_eq!(state.purge_thresholds.len(), 1);
    let threshold = state.purge_thresholds[0];
    for doc in state.documents.values() {
        assert_eq!(doc.timestamp, threshold);
    }
}

#[tokio::test]
async fn stale_documents_are_purged_and_fresh_ones_survive() {
    let config = config(|_| {});
    let source = StaticRowSource::new(numbered_rows(2));
    let sink = MemorySink::new();
    sink.seed_document("gone", Map::new(), 1);

    let result = run_cycle(&config, &source, &sink).await;

    assert_eq!(result.deleted_stale, 1);
    let state = sink.snapshot();
    assert!(!state.documents.contains_key("gone"));
    assert_eq!(state.documents.len(), 2);
}

#[tokio::test]
async fn purge_preserves_documents_at_the_threshold() {
    let sink = MemorySink::new();
    sink.seed_document("old", Map::new(), 5);
    sink.seed_document("boundary", Map::new(), 10);
    sink.seed_document("fresh", Map::new(), 15);

    let deleted = sink.delete_older_than("rivertest", "data", 10).await.unwrap();

    assert_eq!(deleted, 1);
    let state = sink.snapshot();
    assert!(state.documents.contains_key("boundary"));
    assert!(state.documents.contains_key("fresh"));
}

#[tokio::test]
async fn zero_rows_aborts_without_touching_the_index() {
    let config = config(|_| {});
    let source = StaticRowSource::new(Vec::new());
    let sink = MemorySink::new();
    sink.seed_document("keep", Map::new(), 1);

    let result = run_cycle(&config, &source, &sink).await;

    assert!(result.aborted);
    assert_eq!(result.abort_reason, Some(AbortReason::EmptyResult));
    assert_eq!(result.rows_read, 0);

    // Provisioning happened, nothing else did.
    let state = sink.snapshot();
    assert_eq!(state.create_index_calls, 1);
    assert_eq!(state.put_mapping_calls, 1);
    assert_eq!(state.upsert_calls, 0);
    assert!(state.purge_thresholds.is_empty());
    assert!(state.documents.contains_key("keep"));
}

#[tokio::test]
async fn zero_rows_with_unknown_total_still_aborts_before_the_purge() {
    let config = config(|_| {});
    let source = StaticRowSource::new(Vec::new()).without_total();
    let sink = MemorySink::new();
    sink.seed_document("keep", Map::new(), 1);

    let result = run_cycle(&config, &source, &sink).await;

    assert!(result.aborted);
    assert_eq!(result.abort_reason, Some(AbortReason::EmptyResult));
    assert!(sink.snapshot().purge_thresholds.is_empty());
    assert!(sink.snapshot().documents.contains_key("keep"));
}

#[tokio::test]
async fn unknown_total_does_not_block_a_normal_refresh() {
    let config = config(|_| {});
    let source = StaticRowSource::new(numbered_rows(2)).without_total();
    let sink = MemorySink::new();

    let result = run_cycle(&config, &source, &sink).await;

    assert!(!result.aborted);
    assert_eq!(result.rows_written, 2);
    assert_eq!(sink.snapshot().purge_thresholds.len(), 1);
}

#[tokio::test]
async fn source_failure_aborts_before_any_write() {
    let config = config(|_| {});
    let source = StaticRowSource::unreachable();
    let sink = MemorySink::new();

    let result = run_cycle(&config, &source, &sink).await;

    assert!(result.aborted);
    assert_eq!(result.abort_reason, Some(AbortReason::SourceUnavailable));
    let state = sink.snapshot();
    assert_eq!(state.upsert_calls, 0);
    assert!(state.purge_thresholds.is_empty());
}

#[tokio::test]
async fn one_failed_write_does_not_abort_the_batch() {
    let config = config(|_| {});
    let source = StaticRowSource::new(numbered_rows(150));
    let sink = MemorySink::new().failing_upsert_at(42);

    let result = run_cycle(&config, &source, &sink).await;

    assert!(!result.aborted);
    assert_eq!(result.rows_read, 150);
    assert_eq!(result.rows_written, 149);
    assert_eq!(result.rows_failed, 1);
    // The purge still ran, with the cycle's own threshold.
    assert_eq!(sink.snapshot().purge_thresholds.len(), 1);
}

#[tokio::test]
async fn cancellation_mid_cycle_halts_iteration_and_skips_the_purge() {
    let config = config(|_| {});
    let source = StaticRowSource::new(numbered_rows(1000));
    let cancel = CancellationToken::new();
    let sink = MemorySink::new().cancelling_after(10, cancel.clone());

    let result = SyncCycle::new(&config, &source, &sink).run(&cancel).await;

    assert!(result.aborted);
    assert_eq!(result.abort_reason, Some(AbortReason::Cancelled));
    assert_eq!(result.rows_written, 10);
    assert_eq!(result.rows_read, 10);
    // The refresh is incomplete, so it is not committed as one.
    assert!(sink.snapshot().purge_thresholds.is_empty());
}

#[tokio::test]
async fn provisioning_failure_skips_the_cycle_before_the_source_is_touched() {
    let config = config(|_| {});
    let source = StaticRowSource::new(numbered_rows(3));
    let sink = MemorySink::new().failing_provisioning();

    let result = run_cycle(&config, &source, &sink).await;

    assert!(result.aborted);
    assert_eq!(result.abort_reason, Some(AbortReason::Provisioning));
    assert_eq!(source.executions(), 0);
    assert_eq!(sink.snapshot().upsert_calls, 0);
}

#[tokio::test]
async fn an_existing_index_is_not_a_failure() {
    let config = config(|_| {});
    let source = StaticRowSource::new(numbered_rows(3));
    let sink = MemorySink::new().with_existing_index();

    let result = run_cycle(&config, &source, &sink).await;

    assert!(!result.aborted);
    assert_eq!(result.rows_written, 3);
}

#[tokio::test]
async fn missing_id_field_falls_back_to_sink_assigned_ids() {
    let config = config(|opts| opts.unique_id_field = Some("user_id".to_string()));
    let source = StaticRowSource::new(numbered_rows(2));
    let sink = MemorySink::new();

    let result = run_cycle(&config, &source, &sink).await;

    assert!(!result.aborted);
    let state = sink.snapshot();
    assert_eq!(state.documents.len(), 2);
    assert!(state.documents.keys().all(|id| id.starts_with("_assigned-")));
}

#[tokio::test]
async fn purge_can_be_disabled() {
    let config = config(|opts| opts.delete_old_entries = false);
    let source = StaticRowSource::new(numbered_rows(2));
    let sink = MemorySink::new();
    sink.seed_document("ancient", Map::new(), 1);

    let result = run_cycle(&config, &source, &sink).await;

    assert!(!result.aborted);
    assert_eq!(result.deleted_stale, 0);
    let state = sink.snapshot();
    assert!(state.purge_thresholds.is_empty());
    assert!(state.documents.contains_key("ancient"));
}

#[tokio::test]
async fn rerunning_the_same_data_is_idempotent() {
    let config = config(|_| {});
    let source = StaticRowSource::new(numbered_rows(3));
    let sink = MemorySink::new();

    run_cycle(&config, &source, &sink).await;
    let first: Vec<_> = {
        let mut ids: Vec<_> = sink.snapshot().documents.keys().cloned().collect();
        ids.sort();
        ids
    };

    let result = run_cycle(&config, &source, &sink).await;
    assert!(!result.aborted);
    assert_eq!(result.deleted_stale, 0);

    let mut second: Vec<_> = sink.snapshot().documents.keys().cloned().collect();
    second.sort();
    assert_eq!(first, second);
}
