mod helpers;

use std::sync::{Arc, Mutex};

use helpers::{ok_mock, request, text_spec, transient_mock};
use waypoint::{Gateway, Subscriber, TelemetryEvent};

#[tokio::test]
async fn every_attempt_publishes_started_and_one_completion() {
    let a = Arc::new(transient_mock("a"));
    let b = Arc::new(ok_mock().build());

    let gateway = Gateway::builder()
        .seed(2)
        .exploration_rate(0.0)
        .with_backend(text_spec("a"), a)
        .with_backend(text_spec("b"), b)
        .build()
        .expect("gateway builds");
    let rx = gateway.tap();

    for _ in 0..5 {
        let _ = gateway.submit(request()).await;
    }

    let events = rx.drain();
    let mut started = 0_usize;
    let mut completed = 0_usize;
    for event in &events {
        match event {
            TelemetryEvent::DispatchStarted { .. } => started += 1,
            TelemetryEvent::DispatchCompleted { .. } => completed += 1,
            _ => {}
        }
    }
    assert_eq!(started, completed, "one terminal completion per attempt");
    assert_eq!(rx.dropped(), 0);
    assert_eq!(gateway.dropped_events(), 0);
}

#[tokio::test]
async fn request_ids_are_unique_and_monotonic() {
    let a = Arc::new(ok_mock().build());
    let gateway = Gateway::builder()
        .seed(2)
        .with_backend(text_spec("a"), a)
        .build()
        .expect("gateway builds");
    let rx = gateway.tap();

    for _ in 0..4 {
        gateway.submit(request()).await.expect("succeeds");
    }

    let ids: Vec<u64> = rx
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            TelemetryEvent::DispatchStarted { request_id, .. } => Some(request_id),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn small_receiver_buffer_drops_oldest_under_load() {
    let a = Arc::new(ok_mock().build());
    let gateway = Gateway::builder()
        .seed(2)
        .telemetry_buffer(4)
        .with_backend(text_spec("a"), a)
        .build()
        .expect("gateway builds");
    let rx = gateway.tap();

    for _ in 0..10 {
        gateway.submit(request()).await.expect("succeeds");
    }

    // 20 events were published (started + completed per submit) into a
    // 4-slot buffer.
    assert_eq!(rx.len(), 4);
    assert_eq!(rx.dropped(), 16);
    assert_eq!(gateway.dropped_events(), 16);

    // The survivors are the newest events, still in publication order.
    let ids: Vec<u64> = rx
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            TelemetryEvent::DispatchStarted { request_id, .. }
            | TelemetryEvent::DispatchCompleted { request_id, .. } => Some(request_id),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec![9, 9, 10, 10]);
}

struct OrderProbe {
    order: Mutex<Vec<String>>,
}

impl Subscriber for OrderProbe {
    fn on_event(&self, event: &TelemetryEvent) {
        if let TelemetryEvent::DispatchCompleted {
            backend, success, ..
        } = event
        {
            self.order
                .lock()
                .unwrap()
                .push(format!("{backend}:{success}"));
        }
    }
}

#[tokio::test]
async fn attached_subscribers_observe_fallback_order() {
    let a = Arc::new(transient_mock("a"));
    let b = Arc::new(ok_mock().build());

    let gateway = Gateway::builder()
        .seed(2)
        .exploration_rate(0.0)
        .with_backend(text_spec("a"), a)
        .with_backend(text_spec("b"), b)
        .build()
        .expect("gateway builds");

    let blob = waypoint::snapshot::encode(
        0,
        &[],
        &[(
            waypoint::BackendId::new("a"),
            waypoint::TaskCategory::TextGeneration,
            0.9,
        )],
    );
    gateway.import_snapshot(&blob).expect("snapshot imports");

    let probe = Arc::new(OrderProbe {
        order: Mutex::new(Vec::new()),
    });
    gateway.subscribe(probe.clone());

    gateway.submit(request()).await.expect("fallback serves");

    assert_eq!(
        *probe.order.lock().unwrap(),
        vec!["a:false".to_string(), "b:true".to_string()]
    );
}
