// tests/engine_cycle.rs
//
// Poll cycle properties against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use search_poller::checkpoint::{CheckpointStore, InMemoryCheckpointStore, Watermark};
use search_poller::ingest::providers::scripted::ScriptedGateway;
use search_poller::ingest::query::SearchQuery;
use search_poller::notify::RecordingForwarder;
use search_poller::{FetchError, Item, PollError, Poller, RetryPolicy};

const KEY: &str = "CHECKPOINT_TIMESTAMP";

fn item(ts: i64) -> Item {
    Item::new(ts, json!({ "id_str": ts.to_string(), "created_at": ts }))
}

fn batch(stamps: &[i64]) -> Vec<Item> {
    stamps.iter().copied().map(item).collect()
}

fn stamps(items: &[Item]) -> Vec<i64> {
    items.iter().map(Item::created_at_ms).collect()
}

fn transient() -> FetchError {
    FetchError::Transient("connection reset".into())
}

struct Rig {
    gateway: Arc<ScriptedGateway>,
    store: Arc<InMemoryCheckpointStore>,
    forwarder: Arc<RecordingForwarder>,
    poller: Poller,
}

fn rig(gateway: ScriptedGateway, store: InMemoryCheckpointStore) -> Rig {
    let gateway = Arc::new(gateway);
    let store = Arc::new(store);
    let forwarder = Arc::new(RecordingForwarder::new());
    let poller = Poller::new(
        gateway.clone(),
        store.clone(),
        forwarder.clone(),
        SearchQuery::new("#rustlang", Some("result_type=recent".into())),
    )
    .with_checkpoint_key(KEY)
    .with_retry(RetryPolicy::no_delay(3));
    Rig {
        gateway,
        store,
        forwarder,
        poller,
    }
}

#[tokio::test]
async fn repoll_of_unchanged_remote_is_a_noop() {
    let r = rig(
        ScriptedGateway::repeating(batch(&[100, 200, 300])),
        InMemoryCheckpointStore::new(),
    );

    let first = r.poller.run_cycle().await.expect("first cycle");
    assert_eq!(stamps(&first.items), vec![300, 200, 100]);
    assert_eq!(first.watermark_before, Watermark::Unset);
    assert_eq!(first.watermark_after, Watermark::At(300));
    assert_eq!(r.store.read(KEY).await.unwrap(), Watermark::At(300));

    let second = r.poller.run_cycle().await.expect("second cycle");
    assert!(second.items.is_empty());
    assert!(!second.advanced());
    assert_eq!(r.store.read(KEY).await.unwrap(), Watermark::At(300));

    assert_eq!(r.store.write_count(), 1);
    assert_eq!(r.forwarder.calls(), 1, "only the first cycle forwards");
}

#[tokio::test]
async fn item_equal_to_watermark_is_not_reforwarded() {
    let r = rig(
        ScriptedGateway::new(vec![Ok(batch(&[150, 200, 250]))]),
        InMemoryCheckpointStore::with_value(KEY, 200),
    );

    let report = r.poller.run_cycle().await.unwrap();
    assert_eq!(stamps(&report.items), vec![250]);
    assert_eq!(r.store.read(KEY).await.unwrap(), Watermark::At(250));
    assert_eq!(stamps(&r.forwarder.batches()[0]), vec![250]);
}

#[tokio::test]
async fn output_is_sorted_newest_first() {
    let r = rig(
        ScriptedGateway::new(vec![Ok(batch(&[5, 90, 17, 90, 42, 1, 64]))]),
        InMemoryCheckpointStore::new(),
    );

    let report = r.poller.run_cycle().await.unwrap();
    assert_eq!(report.items.len(), 7);
    for pair in report.items.windows(2) {
        assert!(pair[0].created_at_ms() >= pair[1].created_at_ms());
    }
    assert_eq!(report.watermark_after, Watermark::At(90));
}

#[tokio::test]
async fn empty_fetch_leaves_watermark_alone() {
    for start in [None, Some(0), Some(1_000)] {
        let store = match start {
            Some(ms) => InMemoryCheckpointStore::with_value(KEY, ms),
            None => InMemoryCheckpointStore::new(),
        };
        let r = rig(ScriptedGateway::new(vec![Ok(vec![])]), store);

        let report = r.poller.run_cycle().await.unwrap();
        assert!(report.items.is_empty());
        assert_eq!(
            r.store.read(KEY).await.unwrap(),
            Watermark::from_millis(start)
        );
        assert_eq!(r.store.write_count(), 0);
        assert_eq!(r.forwarder.calls(), 0);
    }
}

#[tokio::test]
async fn all_items_older_than_watermark_changes_nothing() {
    let r = rig(
        ScriptedGateway::new(vec![Ok(batch(&[10, 20, 30]))]),
        InMemoryCheckpointStore::with_value(KEY, 30),
    );
    let report = r.poller.run_cycle().await.unwrap();
    assert!(report.items.is_empty());
    assert_eq!(r.store.write_count(), 0);
    assert_eq!(r.forwarder.calls(), 0);
}

#[tokio::test]
async fn two_transient_failures_then_success_completes_normally() {
    let r = rig(
        ScriptedGateway::new(vec![
            Err(transient()),
            Err(transient()),
            Ok(batch(&[100, 200, 300])),
        ]),
        InMemoryCheckpointStore::new(),
    );

    let report = r.poller.run_cycle().await.expect("third attempt succeeds");
    assert_eq!(stamps(&report.items), vec![300, 200, 100]);
    assert_eq!(r.gateway.calls(), 3);
    assert_eq!(r.store.read(KEY).await.unwrap(), Watermark::At(300));
    assert_eq!(r.forwarder.calls(), 1);
}

#[tokio::test]
async fn exhausted_retries_leave_watermark_unchanged() {
    let r = rig(
        ScriptedGateway::new(vec![
            Err(transient()),
            Err(transient()),
            Err(transient()),
            Ok(batch(&[999])),
        ]),
        InMemoryCheckpointStore::with_value(KEY, 50),
    );

    let err = r.poller.run_cycle().await.unwrap_err();
    assert!(
        matches!(err, PollError::FetchExhausted { attempts: 3, .. }),
        "got {err:?}"
    );
    assert_eq!(r.gateway.calls(), 3, "bounded at three attempts");
    assert_eq!(r.store.read(KEY).await.unwrap(), Watermark::At(50));
    assert_eq!(r.forwarder.calls(), 0);
}

#[tokio::test]
async fn fatal_fetch_is_not_retried() {
    let r = rig(
        ScriptedGateway::new(vec![
            Err(FetchError::Fatal("HTTP 400".into())),
            Ok(batch(&[1])),
        ]),
        InMemoryCheckpointStore::new(),
    );
    let err = r.poller.run_cycle().await.unwrap_err();
    assert_eq!(err.kind(), "fetch_rejected");
    assert_eq!(r.gateway.calls(), 1);
}

#[tokio::test]
async fn auth_failure_is_fatal_for_the_cycle() {
    let r = rig(
        ScriptedGateway::new(vec![Err(FetchError::Auth("HTTP 401".into()))]),
        InMemoryCheckpointStore::new(),
    );
    let err = r.poller.run_cycle().await.unwrap_err();
    assert!(matches!(err, PollError::Auth(_)));
    assert_eq!(r.gateway.calls(), 1);
    assert_eq!(r.store.write_count(), 0);
}

#[tokio::test]
async fn failed_checkpoint_write_means_nothing_is_forwarded() {
    let r = rig(
        ScriptedGateway::new(vec![Ok(batch(&[100, 200]))]),
        InMemoryCheckpointStore::new(),
    );
    r.store.fail_writes(true);

    let err = r.poller.run_cycle().await.unwrap_err();
    assert!(matches!(err, PollError::CheckpointWrite { next: 200, .. }));
    assert_eq!(r.forwarder.calls(), 0, "forward must not run after a failed commit");

    r.store.fail_writes(false);
    assert_eq!(r.store.read(KEY).await.unwrap(), Watermark::Unset);
}

#[tokio::test]
async fn failed_checkpoint_read_skips_the_fetch() {
    let r = rig(
        ScriptedGateway::repeating(batch(&[1, 2, 3])),
        InMemoryCheckpointStore::new(),
    );
    r.store.fail_reads(true);

    let err = r.poller.run_cycle().await.unwrap_err();
    assert!(matches!(err, PollError::CheckpointRead { .. }));
    assert_eq!(r.gateway.calls(), 0);
    assert_eq!(r.forwarder.calls(), 0);
}

#[tokio::test]
async fn store_outage_recovers_on_next_cycle() {
    let r = rig(
        ScriptedGateway::repeating(batch(&[7, 8])),
        InMemoryCheckpointStore::new(),
    );
    r.store.fail_reads(true);
    assert!(r.poller.run_cycle().await.is_err());

    r.store.fail_reads(false);
    let report = r.poller.run_cycle().await.unwrap();
    assert_eq!(stamps(&report.items), vec![8, 7]);
}

#[tokio::test]
async fn concurrent_watermark_move_rejects_the_cycle() {
    // A gateway whose fetch lets another writer advance the checkpoint first.
    struct RacingGateway {
        store: Arc<InMemoryCheckpointStore>,
    }

    #[async_trait::async_trait]
    impl search_poller::SearchGateway for RacingGateway {
        async fn fetch(&self, _q: &SearchQuery) -> Result<Vec<Item>, FetchError> {
            self.store.force(KEY, 500);
            Ok(batch(&[100, 600]))
        }
        fn name(&self) -> &'static str {
            "racing"
        }
    }

    let store = Arc::new(InMemoryCheckpointStore::new());
    let forwarder = Arc::new(RecordingForwarder::new());
    let poller = Poller::new(
        Arc::new(RacingGateway {
            store: store.clone(),
        }),
        store.clone(),
        forwarder.clone(),
        SearchQuery::new("x", None),
    )
    .with_checkpoint_key(KEY);

    let err = poller.run_cycle().await.unwrap_err();
    match err {
        PollError::CheckpointConflict {
            expected, found, ..
        } => {
            assert_eq!(expected, Watermark::Unset);
            assert_eq!(found, Watermark::At(500));
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(forwarder.calls(), 0);
    assert_eq!(store.read(KEY).await.unwrap(), Watermark::At(500));
}

#[tokio::test]
async fn forwarder_failure_keeps_the_commit() {
    let r = rig(
        ScriptedGateway::new(vec![Ok(batch(&[1, 2]))]),
        InMemoryCheckpointStore::new(),
    );
    r.forwarder.fail_with(true);

    let report = r.poller.run_cycle().await.expect("cycle still succeeds");
    assert_eq!(report.watermark_after, Watermark::At(2));
    assert_eq!(r.store.read(KEY).await.unwrap(), Watermark::At(2));
    assert_eq!(r.forwarder.calls(), 1);
}

#[tokio::test]
async fn poll_commits_without_forwarding() {
    let r = rig(
        ScriptedGateway::new(vec![Ok(batch(&[3, 1, 2]))]),
        InMemoryCheckpointStore::new(),
    );
    let report = r.poller.poll().await.unwrap();
    assert_eq!(stamps(&report.items), vec![3, 2, 1]);
    assert_eq!(r.store.read(KEY).await.unwrap(), Watermark::At(3));
    assert_eq!(r.forwarder.calls(), 0);
}

#[tokio::test]
async fn query_string_reaches_the_gateway() {
    let r = rig(ScriptedGateway::new(vec![]), InMemoryCheckpointStore::new());
    r.poller.run_cycle().await.unwrap();
    assert_eq!(
        r.gateway.last_query().as_deref(),
        Some("q=%23rustlang&result_type=recent")
    );
}

#[tokio::test]
async fn cancelled_before_start_does_not_fetch() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let gateway = Arc::new(ScriptedGateway::repeating(batch(&[1])));
    let store = Arc::new(InMemoryCheckpointStore::new());
    let poller = Poller::new(
        gateway.clone(),
        store.clone(),
        Arc::new(RecordingForwarder::new()),
        SearchQuery::new("x", None),
    )
    .with_cancellation(cancel);

    assert!(matches!(
        poller.run_cycle().await,
        Err(PollError::Cancelled)
    ));
    assert_eq!(gateway.calls(), 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_aborts_without_commit() {
    let cancel = CancellationToken::new();
    let gateway = Arc::new(ScriptedGateway::new(vec![
        Err(transient()),
        Ok(batch(&[1])),
    ]));
    let store = Arc::new(InMemoryCheckpointStore::new());
    let poller = Poller::new(
        gateway.clone(),
        store.clone(),
        Arc::new(RecordingForwarder::new()),
        SearchQuery::new("x", None),
    )
    .with_retry(RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_secs(60),
        max_delay: Duration::from_secs(60),
    })
    .with_cancellation(cancel.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let res = poller.run_cycle().await;
    canceller.await.unwrap();
    assert!(matches!(res, Err(PollError::Cancelled)), "got {res:?}");
    assert_eq!(gateway.calls(), 1, "second attempt never starts");
    assert_eq!(store.write_count(), 0);
}
