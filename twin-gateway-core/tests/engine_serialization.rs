mod common;

use std::sync::Arc;

use twin_gateway_core::{ResourcePath, TwinGateway};
use twin_gateway_models::{ResourceKind, Settings, TimedValue, TwinValue};

// Non-atomic read-modify-write from many tasks: any interleaving between
// commands would lose increments.
#[tokio::test]
async fn concurrent_submitters_never_interleave() {
    common::init();
    let gw = Arc::new(TwinGateway::start(Settings::default()));

    const TASKS: usize = 8;
    const PER_TASK: i64 = 50;

    let mut handles = Vec::new();
    for _ in 0..TASKS {
        let gw = Arc::clone(&gw);
        handles.push(tokio::spawn(async move {
            for _ in 0..PER_TASK {
                let fut = gw
                    .engine()
                    .submit(|txn| {
                        let path = ResourcePath::new("m", "p", "svc", "counter");
                        let (res, _) = txn.twin.ensure_path(&path, ResourceKind::Data, None);
                        let current = match res.value.value {
                            Some(TwinValue::Int64(n)) => n,
                            _ => 0,
                        };
                        res.value = TimedValue::now(TwinValue::Int64(current + 1));
                        Ok(())
                    })
                    .await;
                fut.await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let timed = gw
        .get_resource_value(ResourcePath::new("m", "p", "svc", "counter"))
        .await
        .unwrap();
    assert_eq!(timed.value, Some(TwinValue::Int64(TASKS as i64 * PER_TASK)));
    gw.stop().await.unwrap();
}

// One submitter's commands run in the order it submitted them.
#[tokio::test]
async fn single_submitter_sees_fifo_order() {
    common::init();
    let gw = TwinGateway::start(Settings::default());

    let mut futures = Vec::new();
    for i in 0..100i64 {
        let fut = gw
            .engine()
            .submit(move |txn| {
                let path = ResourcePath::new("m", "p", "svc", "seq");
                let (res, _) = txn.twin.ensure_path(&path, ResourceKind::Data, None);
                // Monotonic check: every previous write is already visible.
                if let Some(TwinValue::Int64(prev)) = res.value.value {
                    assert_eq!(prev, i - 1);
                }
                res.value = TimedValue::now(TwinValue::Int64(i));
                Ok(())
            })
            .await;
        futures.push(fut);
    }
    for fut in futures {
        fut.await.unwrap();
    }

    let timed = gw
        .get_resource_value(ResourcePath::new("m", "p", "svc", "seq"))
        .await
        .unwrap();
    assert_eq!(timed.value, Some(TwinValue::Int64(99)));
    gw.stop().await.unwrap();
}

// Stop drains queued commands before the worker exits.
#[tokio::test]
async fn stop_drains_queued_commands() {
    common::init();
    let gw = TwinGateway::start(Settings::default());

    let mut futures = Vec::new();
    for i in 0..32i64 {
        let fut = gw
            .engine()
            .submit(move |txn| {
                let path = ResourcePath::new("m", "p", "svc", "drain");
                let (res, _) = txn.twin.ensure_path(&path, ResourceKind::Data, None);
                res.value = TimedValue::now(TwinValue::Int64(i));
                Ok(i)
            })
            .await;
        futures.push(fut);
    }
    gw.stop().await.unwrap();
    for (i, fut) in futures.into_iter().enumerate() {
        assert_eq!(fut.await.unwrap(), i as i64);
    }
}
