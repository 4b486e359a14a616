//! Reconciler behaviour against a scripted chain.

use std::time::Duration;

use tidewatch_core::{
    backoff::RetrySchedule, builtin::EphemeralPending, config::MonitorConfig, ChainError,
    Disposition, FailureReason, MonitorError, NotificationKind, PendingStore, ProbeOutcome,
    Prober, Reconciler, SweepError,
};
use tidewatch_testing::{
    make_pending_tx, quick_schedule, reverted_receipt, success_receipt, tx_sequence_to_hash,
    FaultyPending, RecordingNotifier, ScriptedChain, TestFault,
};

type TestReconciler<S = EphemeralPending> = Reconciler<ScriptedChain, S, RecordingNotifier>;

fn reconciler<S: PendingStore>(
    chain: &ScriptedChain,
    store: &S,
    notifier: &RecordingNotifier,
    schedule: RetrySchedule,
) -> TestReconciler<S> {
    Reconciler::new(
        chain.clone(),
        store.clone(),
        notifier.clone(),
        &MonitorConfig::default(),
    )
    .with_schedule(schedule)
}

#[tokio::test]
async fn probe_reports_receipt_status() {
    let chain = ScriptedChain::at_height(1000);
    let ok = tx_sequence_to_hash(1);
    let bad = tx_sequence_to_hash(2);
    chain.set_receipt(success_receipt(ok, 990));
    chain.set_receipt(reverted_receipt(bad, 991));

    let prober = Prober::new(chain.clone(), 50);

    assert_eq!(prober.probe(980, &ok).await, Ok(ProbeOutcome::Success));
    assert_eq!(prober.probe(980, &bad).await, Ok(ProbeOutcome::Reverted));

    // a receipt answers on its own, no height lookup
    assert_eq!(chain.height_calls(), 0);
}

#[tokio::test]
async fn probe_without_receipt_depends_on_window() {
    let hash = tx_sequence_to_hash(1);
    let prober = |height| Prober::new(ScriptedChain::at_height(height), 50);

    assert_eq!(
        prober(1010).probe(1000, &hash).await,
        Ok(ProbeOutcome::Undetermined)
    );
    assert_eq!(
        prober(1050).probe(1000, &hash).await,
        Ok(ProbeOutcome::Undetermined)
    );
    assert_eq!(
        prober(1051).probe(1000, &hash).await,
        Ok(ProbeOutcome::NotMined)
    );
}

#[tokio::test]
async fn probe_surfaces_network_errors() {
    let chain = ScriptedChain::new();
    let hash = tx_sequence_to_hash(1);
    chain.push_receipt(hash, Err(ChainError::transport("connection reset")));

    let prober = Prober::new(chain, 50);

    assert_eq!(
        prober.probe(1000, &hash).await,
        Err(ChainError::transport("connection reset"))
    );
}

#[tokio::test(start_paused = true)]
async fn success_is_left_untouched() {
    let chain = ScriptedChain::at_height(1000);
    let tx = make_pending_tx("ok", 1);
    chain.set_receipt(success_receipt(tx.tx_hash, 1001));

    let store = EphemeralPending::with_txs([tx.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let disposition = reconciler
        .monitor_one(1000, &tx.local_id, &tx.tx_hash)
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Confirmed);
    assert!(store.get("ok").unwrap().is_some());
    assert_eq!(notifier.count(), 0);
    assert_eq!(chain.receipt_calls(&tx.tx_hash), 1);
}

#[tokio::test(start_paused = true)]
async fn revert_is_removed_and_notified_once() {
    let chain = ScriptedChain::at_height(1000);
    let tx = make_pending_tx("bad", 1);
    chain.set_receipt(reverted_receipt(tx.tx_hash, 1001));

    let store = EphemeralPending::with_txs([tx.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let disposition = reconciler
        .monitor_one(1000, &tx.local_id, &tx.tx_hash)
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Failed(FailureReason::Reverted));
    assert!(store.get("bad").unwrap().is_none());

    let received = notifier.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].kind, NotificationKind::TxPendingFailed);
    assert_eq!(received[0].local_id, "bad");
    assert_eq!(received[0].tx_hash, tx.tx_hash);
}

#[tokio::test(start_paused = true)]
async fn window_expiry_fails_on_the_third_attempt() {
    let chain = ScriptedChain::new();
    chain.push_heights([1010, 1020, 1060]);

    let tx = make_pending_tx("lost", 1);
    let store = EphemeralPending::with_txs([tx.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let disposition = reconciler
        .monitor_one(1000, &tx.local_id, &tx.tx_hash)
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Failed(FailureReason::NotMined));
    assert_eq!(chain.receipt_calls(&tx.tx_hash), 3);
    assert_eq!(chain.height_calls(), 3);
    assert!(store.is_empty());
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_window_stops_after_one_attempt() {
    let chain = ScriptedChain::at_height(2000);
    let tx = make_pending_tx("lost", 1);
    let store = EphemeralPending::with_txs([tx.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let disposition = reconciler
        .monitor_one(1000, &tx.local_id, &tx.tx_hash)
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Failed(FailureReason::NotMined));
    assert_eq!(chain.receipt_calls(&tx.tx_hash), 1);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_counts_as_failure() {
    let chain = ScriptedChain::at_height(1000);
    let tx = make_pending_tx("slow", 1);
    let store = EphemeralPending::with_txs([tx.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(4));

    let started = tokio::time::Instant::now();

    let disposition = reconciler
        .monitor_one(1000, &tx.local_id, &tx.tx_hash)
        .await
        .unwrap();

    assert_eq!(
        disposition,
        Disposition::Failed(FailureReason::Exhausted { attempts: 4 })
    );
    assert_eq!(chain.receipt_calls(&tx.tx_hash), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(1 + 2 + 4 + 8));
    assert!(store.is_empty());
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_errors_share_the_attempt_budget() {
    let chain = ScriptedChain::at_height(1000);
    let tx = make_pending_tx("flaky", 1);
    chain.push_receipt(tx.tx_hash, Err(ChainError::transport("timeout")));
    chain.push_receipt(tx.tx_hash, Err(ChainError::transport("timeout")));
    chain.push_receipt(tx.tx_hash, Ok(Some(reverted_receipt(tx.tx_hash, 1003))));

    let store = EphemeralPending::with_txs([tx.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let disposition = reconciler
        .monitor_one(1000, &tx.local_id, &tx.tx_hash)
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Failed(FailureReason::Reverted));
    assert_eq!(chain.receipt_calls(&tx.tx_hash), 3);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn persistent_network_failure_exhausts_and_fails() {
    let chain = ScriptedChain::new();
    let tx = make_pending_tx("offline", 1);
    chain.push_receipt(tx.tx_hash, Err(ChainError::transport("refused")));

    let store = EphemeralPending::with_txs([tx.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(3));

    let disposition = reconciler
        .monitor_one(1000, &tx.local_id, &tx.tx_hash)
        .await
        .unwrap();

    assert_eq!(
        disposition,
        Disposition::Failed(FailureReason::Exhausted { attempts: 3 })
    );
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_reply_leaves_tx_pending() {
    let chain = ScriptedChain::new();
    let tx = make_pending_tx("weird", 1);
    chain.push_receipt(tx.tx_hash, Err(ChainError::decode("bad status")));

    let store = EphemeralPending::with_txs([tx.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let result = reconciler.monitor_one(1000, &tx.local_id, &tx.tx_hash).await;

    assert!(matches!(result, Err(MonitorError::Chain(ChainError::Decode(_)))));
    assert_eq!(chain.receipt_calls(&tx.tx_hash), 1);
    assert!(store.get("weird").unwrap().is_some());
    assert_eq!(notifier.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn already_removed_tx_is_not_notified_twice() {
    let chain = ScriptedChain::at_height(1000);
    let tx = make_pending_tx("bad", 1);
    chain.set_receipt(reverted_receipt(tx.tx_hash, 1001));

    let store = EphemeralPending::new();
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let disposition = reconciler
        .monitor_one(1000, &tx.local_id, &tx.tx_hash)
        .await
        .unwrap();

    assert_eq!(disposition, Disposition::Failed(FailureReason::Reverted));
    assert_eq!(notifier.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_removal_does_not_notify() {
    let chain = ScriptedChain::at_height(1000);
    let tx = make_pending_tx("bad", 1);
    chain.set_receipt(reverted_receipt(tx.tx_hash, 1001));

    let store = FaultyPending::new(
        EphemeralPending::with_txs([tx.clone()]),
        TestFault::RemoveError,
    );
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let result = reconciler.monitor_one(1000, &tx.local_id, &tx.tx_hash).await;

    assert!(matches!(result, Err(MonitorError::Store(_))));
    assert!(store.inner().get("bad").unwrap().is_some());
    assert_eq!(notifier.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_monitor_for_same_id_is_skipped() {
    let chain = ScriptedChain::at_height(1000);
    let tx = make_pending_tx("dup", 1);
    chain.push_heights([1000, 1000, 2000]);

    let store = EphemeralPending::with_txs([tx.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let (first, second) = tokio::join!(
        reconciler.monitor_one(1000, &tx.local_id, &tx.tx_hash),
        reconciler.monitor_one(1000, &tx.local_id, &tx.tx_hash),
    );

    let mut dispositions = vec![first.unwrap(), second.unwrap()];
    dispositions.sort_by_key(|x| matches!(x, Disposition::Skipped));

    assert_eq!(
        dispositions,
        vec![
            Disposition::Failed(FailureReason::NotMined),
            Disposition::Skipped
        ]
    );
    assert!(!reconciler.is_monitoring("dup"));
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_sweep_makes_no_calls() {
    let chain = ScriptedChain::at_height(1000);
    let store = EphemeralPending::new();
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let report = reconciler.sweep().await;

    assert!(report.outcomes.is_empty());
    assert!(report.baseline.is_none());
    assert!(report.error.is_none());
    assert_eq!(chain.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn sweep_only_reconciles_failures() {
    let chain = ScriptedChain::at_height(1000);
    let ok = make_pending_tx("ok", 1);
    let bad = make_pending_tx("bad", 2);
    chain.set_receipt(success_receipt(ok.tx_hash, 1001));
    chain.set_receipt(reverted_receipt(bad.tx_hash, 1001));

    let store = EphemeralPending::with_txs([ok.clone(), bad.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let report = reconciler.sweep().await;

    assert_eq!(report.baseline, Some(1000));
    assert_eq!(report.confirmed(), 1);
    assert_eq!(report.failed(), 1);
    assert!(matches!(report.disposition("ok"), Some(Ok(Disposition::Confirmed))));

    assert!(store.get("ok").unwrap().is_some());
    assert!(store.get("bad").unwrap().is_none());
    assert_eq!(notifier.count_for("bad"), 1);
    assert_eq!(notifier.count_for("ok"), 0);
}

#[tokio::test(start_paused = true)]
async fn sweep_prefers_submission_block() {
    let chain = ScriptedChain::new();
    // baseline snapshot, then the probe of each tx
    chain.push_heights([1100, 1100]);

    let fresh = make_pending_tx("fresh", 1);
    let old = make_pending_tx("old", 2).with_submitted_block(1000);

    let store = EphemeralPending::with_txs([fresh.clone(), old.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(1));

    let report = reconciler.sweep().await;

    // "old" is measured from block 1000, so its window is closed
    assert!(matches!(
        report.disposition("old"),
        Some(Ok(Disposition::Failed(FailureReason::NotMined)))
    ));

    // "fresh" shares the 1100 baseline and is only out of attempts
    assert!(matches!(
        report.disposition("fresh"),
        Some(Ok(Disposition::Failed(FailureReason::Exhausted { attempts: 1 })))
    ));
}

#[tokio::test(start_paused = true)]
async fn sweep_isolates_monitor_errors() {
    let chain = ScriptedChain::at_height(1000);
    let weird = make_pending_tx("weird", 1);
    let bad = make_pending_tx("bad", 2);
    chain.push_receipt(weird.tx_hash, Err(ChainError::decode("garbage")));
    chain.set_receipt(reverted_receipt(bad.tx_hash, 1001));

    let store = EphemeralPending::with_txs([weird.clone(), bad.clone()]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let report = reconciler.sweep().await;

    assert_eq!(report.errored(), 1);
    assert_eq!(report.failed(), 1);
    assert!(store.get("weird").unwrap().is_some());
    assert!(store.get("bad").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn sweep_survives_baseline_failure() {
    let chain = ScriptedChain::new();
    chain.push_height(Err(ChainError::transport("refused")));

    let store = EphemeralPending::with_txs([make_pending_tx("a", 1)]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let report = reconciler.sweep().await;

    assert!(matches!(report.error, Some(SweepError::Chain(_))));
    assert!(report.outcomes.is_empty());
    assert_eq!(store.len(), 1);
    assert_eq!(notifier.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn baseline_failure_falls_back_to_submission_block() {
    let chain = ScriptedChain::new();
    chain.push_height(Err(ChainError::transport("refused")));

    let anchored = make_pending_tx("anchored", 1).with_submitted_block(1000);
    let floating = make_pending_tx("floating", 2);
    chain.set_receipt(reverted_receipt(anchored.tx_hash, 1001));

    let store = EphemeralPending::with_txs([anchored, floating]);
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let report = reconciler.sweep().await;

    assert!(matches!(report.error, Some(SweepError::Chain(_))));
    assert_eq!(report.outcomes.len(), 1);
    assert!(matches!(
        report.disposition("anchored"),
        Some(Ok(Disposition::Failed(FailureReason::Reverted)))
    ));
    assert!(store.get("floating").unwrap().is_some());
    assert_eq!(notifier.count_for("anchored"), 1);
}

#[tokio::test(start_paused = true)]
async fn sweep_survives_store_failure() {
    let chain = ScriptedChain::at_height(1000);
    let store = FaultyPending::new(
        EphemeralPending::with_txs([make_pending_tx("a", 1)]),
        TestFault::ReadError,
    );
    let notifier = RecordingNotifier::new();
    let reconciler = reconciler(&chain, &store, &notifier, quick_schedule(6));

    let report = reconciler.sweep().await;

    assert!(matches!(report.error, Some(SweepError::Store(_))));
    assert_eq!(chain.total_calls(), 0);
}
