// End-to-end scenarios over two endpoints wired with in-process channels.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use script_bridge::config::{BridgeSettings, UnknownHandlerPolicy};
use script_bridge::protocol::{ErrorCodes, ResponseError};
use script_bridge::transport::channel::{ConnectedPair, connect_pair};
use script_bridge::{BridgeError, spawn_expiry_task};

const WAIT: Duration = Duration::from_secs(5);

fn pair() -> ConnectedPair {
    connect_pair(BridgeSettings::default(), BridgeSettings::default())
}

fn register_echo(pair: &ConnectedPair) {
    pair.b.register("echo", |payload, responder| {
        if let Some(responder) = responder {
            responder.respond(payload).unwrap();
        }
    });
}

fn register_counter(pair: &ConnectedPair) -> Arc<AtomicU64> {
    let counter = Arc::new(AtomicU64::new(0));
    pair.b
        .register_with_context("counterReset", Arc::clone(&counter), |count, _, responder| {
            count.store(0, Ordering::SeqCst);
            if let Some(responder) = responder {
                responder.respond(json!({"counter": 0})).unwrap();
            }
        });
    pair.b.register_with_context(
        "counterIncrement",
        Arc::clone(&counter),
        |count, _, responder| {
            let value = count.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(responder) = responder {
                responder.respond(json!({"counter": value})).unwrap();
            }
        },
    );
    counter
}

#[tokio::test]
async fn echo_fires_callback_exactly_once() {
    let pair = pair();
    register_echo(&pair);
    let fired = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel();
    let counter = Arc::clone(&fired);

    pair.a
        .send_with("echo", json!({"v": 1}), move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(result);
        })
        .unwrap();

    let result = tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(result, json!({"v": 1}));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(pair.a.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_increments_each_fire_once() {
    let pair = pair();
    let counter = register_counter(&pair);

    let reset = tokio::time::timeout(WAIT, pair.a.call("counterReset", Value::Null))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reset, json!({"counter": 0}));

    let mut calls = JoinSet::new();
    for _ in 0..100 {
        let a = Arc::clone(&pair.a);
        calls.spawn(async move { a.call("counterIncrement", Value::Null).await });
    }

    let mut seen = Vec::new();
    while let Some(joined) = tokio::time::timeout(WAIT, calls.join_next()).await.unwrap() {
        let result = joined.unwrap().unwrap();
        seen.push(result["counter"].as_u64().unwrap());
    }
    seen.sort_unstable();

    assert_eq!(seen, (1..=100).collect::<Vec<u64>>());
    assert_eq!(counter.load(Ordering::SeqCst), 100);
    assert_eq!(pair.a.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_large_payloads_match_their_requests() {
    let pair = pair();
    register_echo(&pair);

    let mut calls = JoinSet::new();
    for i in 0..10 {
        let a = Arc::clone(&pair.a);
        let marker = format!("marker-{i}-{}", "x".repeat(100_000));
        calls.spawn(async move {
            let result = a.call("echo", json!({"data": marker.clone()})).await;
            (marker, result)
        });
    }

    while let Some(joined) = tokio::time::timeout(WAIT, calls.join_next()).await.unwrap() {
        let (marker, result) = joined.unwrap();
        assert_eq!(result.unwrap()["data"], json!(marker));
    }
    assert_eq!(pair.a.pending_count(), 0);
}

#[tokio::test]
async fn megabyte_payload_survives_round_trip() {
    let pair = pair();
    register_echo(&pair);
    let data = "x".repeat(1024 * 1024);

    let result = tokio::time::timeout(WAIT, pair.a.call("echo", json!({"data": data})))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result["data"].as_str().map(str::len), Some(1024 * 1024));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_fans_out_calls_to_the_other_side() {
    let pair = pair();
    let received = Arc::new(AtomicUsize::new(0));
    let receive_count = Arc::clone(&received);
    pair.a.register("counterReceive", move |_, responder| {
        receive_count.fetch_add(1, Ordering::SeqCst);
        if let Some(responder) = responder {
            responder.respond(json!({"ok": true})).unwrap();
        }
    });

    let acknowledged = Arc::new(AtomicUsize::new(0));
    let ack_count = Arc::clone(&acknowledged);
    let b = Arc::downgrade(&pair.b);
    pair.b
        .register("nativeCounterDispatch", move |payload, responder| {
            let Some(b) = b.upgrade() else {
                return;
            };
            let count = payload["count"].as_u64().unwrap_or_default();
            for _ in 0..count {
                let ack_count = Arc::clone(&ack_count);
                b.send_with("counterReceive", json!({}), move |_| {
                    ack_count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
            if let Some(responder) = responder {
                responder.respond(json!({"dispatched": count})).unwrap();
            }
        });

    let result = tokio::time::timeout(
        WAIT,
        pair.a.call("nativeCounterDispatch", json!({"count": 25})),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(result, json!({"dispatched": 25}));

    tokio::time::timeout(WAIT, async {
        while acknowledged.load(Ordering::SeqCst) < 25 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(received.load(Ordering::SeqCst), 25);
    assert_eq!(pair.b.pending_count(), 0);
}

#[tokio::test]
async fn garbage_from_transport_invokes_nothing() {
    let pair = pair();
    let invoked = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&invoked);
    pair.b.register("h", move |_, _| {
        count.fetch_add(1, Ordering::SeqCst);
    });

    pair.b.on_transport_message("not%20json");
    pair.b.on_transport_message("%7B%22call%22%3A%22send%22%7D");
    pair.b.on_transport_message("");

    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn later_registration_handles_calls() {
    let pair = pair();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&calls);
    let second = Arc::clone(&calls);
    pair.b.register("h", move |_, responder| {
        first.lock().unwrap().push("first");
        if let Some(responder) = responder {
            responder.respond(json!("first")).unwrap();
        }
    });
    pair.b.register("h", move |_, responder| {
        second.lock().unwrap().push("second");
        if let Some(responder) = responder {
            responder.respond(json!("second")).unwrap();
        }
    });

    let result = tokio::time::timeout(WAIT, pair.a.call("h", Value::Null))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result, json!("second"));
    assert_eq!(*calls.lock().unwrap(), vec!["second"]);
}

#[tokio::test]
async fn unknown_handler_reply_error_resolves_caller() {
    let pair = connect_pair(
        BridgeSettings::default(),
        BridgeSettings {
            unknown_handler: UnknownHandlerPolicy::ReplyError,
            ..BridgeSettings::default()
        },
    );

    let result = tokio::time::timeout(WAIT, pair.a.call("missing", json!({})))
        .await
        .unwrap()
        .unwrap();

    let error = ResponseError::from_payload(&result).expect("payload should carry an error");
    assert_eq!(error.code, ErrorCodes::UNKNOWN_HANDLER);
    assert_eq!(pair.a.pending_count(), 0);
}

#[tokio::test]
async fn handler_error_reaches_caller_as_response_error() {
    let pair = pair();
    pair.b.register("divide", |payload, responder| {
        let Some(responder) = responder else {
            return;
        };
        match payload["by"].as_f64() {
            Some(by) if by != 0.0 => responder.respond(json!(1.0 / by)).unwrap(),
            _ => responder
                .respond_error(ResponseError::request_failed("division by zero"))
                .unwrap(),
        }
    });

    let result = tokio::time::timeout(WAIT, pair.a.call("divide", json!({"by": 0})))
        .await
        .unwrap()
        .unwrap();

    let error = ResponseError::from_payload(&result).expect("payload should carry an error");
    assert_eq!(error.code, ErrorCodes::REQUEST_FAILED);
    assert_eq!(error.message, "division by zero");
}

#[tokio::test]
async fn panicking_handler_leaves_delivery_running() {
    let pair = pair();
    register_echo(&pair);
    pair.b.register("boom", |_, _| panic!("handler failed"));

    pair.a.notify("boom", json!({})).unwrap();
    let result = tokio::time::timeout(WAIT, pair.a.call("echo", json!("after")))
        .await
        .expect("echo should still be answered")
        .unwrap();

    assert_eq!(result, json!("after"));
}

#[tokio::test]
async fn abandoned_call_releases_pending_entry() {
    let pair = pair();
    pair.b.register("silent", |_, _| {});

    let abandoned =
        tokio::time::timeout(Duration::from_millis(30), pair.a.call("silent", json!({}))).await;

    assert!(abandoned.is_err());
    assert_eq!(pair.a.pending_count(), 0);
}

#[tokio::test]
async fn unanswered_call_times_out() {
    let pair = connect_pair(
        BridgeSettings {
            callback_timeout: Some(Duration::from_millis(50)),
            ..BridgeSettings::default()
        },
        BridgeSettings::default(),
    );
    pair.b.register("silent", |_, _| {});

    let result = pair.a.call("silent", json!({})).await;

    assert!(matches!(result, Err(BridgeError::Timeout { .. })));
    assert_eq!(pair.a.pending_count(), 0);
}

#[tokio::test]
async fn expiry_task_evicts_forgotten_callbacks() {
    let pair = connect_pair(
        BridgeSettings {
            callback_timeout: Some(Duration::from_millis(20)),
            ..BridgeSettings::default()
        },
        BridgeSettings::default(),
    );
    pair.b.register("silent", |_, _| {});
    let _expiry = spawn_expiry_task(&pair.a, Duration::from_millis(10));

    pair.a.send_with("silent", json!({}), |_| {}).unwrap();
    assert_eq!(pair.a.pending_count(), 1);

    tokio::time::timeout(WAIT, async {
        while pair.a.pending_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}
