//! Worker events delivered to connected listeners through the fan-out task.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use billscan::events::{spawn_fanout, ChannelListener, ConnectionRegistry};
use billscan::{JobEvent, JobEventChannel, TaskQueue, WorkerPool};

use common::{echo_stage_builder, unit_for, TestEnv};

async fn next_payload(rx: &mut UnboundedReceiver<String>) -> serde_json::Value {
    let payload = timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("listener channel closed");
    serde_json::from_str(&payload).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_listeners_receive_job_events() {
    let env = TestEnv::new();
    let channel = JobEventChannel::new(32);
    let registry = Arc::new(ConnectionRegistry::new());

    let (first, mut first_rx) = ChannelListener::new();
    let (second, mut second_rx) = ChannelListener::new();
    registry.connect(Arc::new(first));
    registry.connect(Arc::new(second));
    let fanout = spawn_fanout(&channel, Arc::clone(&registry));

    let pool = WorkerPool::new(env.db.clone(), channel.clone(), echo_stage_builder(), 1).unwrap();
    let submission = env.submit_images(&["Total: 1.00", "Total: 2.00"]);
    pool.enqueue(unit_for(&submission)).unwrap();

    for rx in [&mut first_rx, &mut second_rx] {
        let progress = next_payload(rx).await;
        assert_eq!(progress["type"], "job_progress");
        assert_eq!(progress["job_id"], submission.job_id.as_str());
        assert_eq!(progress["progress"], 50);
        assert_eq!(progress["current"], 1);
        assert_eq!(progress["total"], 2);

        assert_eq!(next_payload(rx).await["progress"], 100);

        let done = next_payload(rx).await;
        assert_eq!(done["type"], "job_completed");
        assert_eq!(done["status"], "completed");
    }

    tokio::task::spawn_blocking(move || {
        pool.shutdown();
        pool.wait();
    })
    .await
    .unwrap();

    drop(channel);
    timeout(Duration::from_secs(5), fanout)
        .await
        .expect("fan-out did not stop")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnected_listener_is_evicted() {
    let channel = JobEventChannel::new(8);
    let registry = Arc::new(ConnectionRegistry::new());

    let (kept, mut kept_rx) = ChannelListener::new();
    let (gone, gone_rx) = ChannelListener::new();
    registry.connect(Arc::new(kept));
    registry.connect(Arc::new(gone));
    drop(gone_rx);
    let _fanout = spawn_fanout(&channel, Arc::clone(&registry));

    channel.send(JobEvent::failed("job-1", "OCR failed: unreadable scan"));

    let failed = next_payload(&mut kept_rx).await;
    assert_eq!(failed["type"], "job_failed");
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["error"], "OCR failed: unreadable scan");

    // The next delivery starts after the previous one evicted the closed listener.
    channel.send(JobEvent::completed("job-2"));
    assert_eq!(next_payload(&mut kept_rx).await["job_id"], "job-2");
    assert_eq!(registry.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fanout_ends_with_the_pool_that_owns_the_channel() {
    let env = TestEnv::new();
    let channel = JobEventChannel::new(32);
    let registry = Arc::new(ConnectionRegistry::new());
    let (listener, mut payloads) = ChannelListener::new();
    registry.connect(Arc::new(listener));
    let fanout = spawn_fanout(&channel, Arc::clone(&registry));

    let pool = WorkerPool::new(env.db.clone(), channel, echo_stage_builder(), 1).unwrap();
    let submission = env.submit_images(&["Total: 3.00"]);
    pool.enqueue(unit_for(&submission)).unwrap();

    let report = tokio::task::spawn_blocking(move || {
        let report = pool.recv_report();
        pool.shutdown();
        pool.wait();
        report
    })
    .await
    .unwrap()
    .unwrap();
    assert!(report.outcome.unwrap().succeeded());

    timeout(Duration::from_secs(5), fanout)
        .await
        .expect("fan-out did not stop")
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(payload) = payloads.try_recv() {
        let event: serde_json::Value = serde_json::from_str(&payload).unwrap();
        kinds.push(event["type"].as_str().unwrap().to_string());
    }
    assert_eq!(kinds, vec!["job_progress", "job_completed"]);
}
