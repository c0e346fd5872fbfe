mod common;

use std::time::Duration;

use appsync_broadcast::{BroadcastError, BroadcastEvent, FailurePolicy, RetryPolicy};
use common::{payload, HarnessBuilder, ScriptedDelivery, Step};

// ---------------------------------------------------------------------------
// Per-channel retry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn transport_errors_are_retried_with_growing_backoff() {
    let h = HarnessBuilder::new()
        .delivery(ScriptedDelivery::new().script("app/orders", &[Step::Transport, Step::Transport]))
        .build();

    let started = tokio::time::Instant::now();
    let outcome = h
        .broadcaster
        .broadcast(&["orders"], "OrderShipped", &payload())
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 1);
    assert!(outcome.failures.is_empty());
    assert_eq!(h.delivery.attempts("app/orders"), 3);
    assert_eq!(
        h.sink.retry_delays(),
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn transport_failure_becomes_permanent_after_three_attempts() {
    let h = HarnessBuilder::new()
        .delivery(ScriptedDelivery::new().script(
            "app/orders",
            &[Step::Transport, Step::Transport, Step::Transport, Step::Ok],
        ))
        .build();

    let err = h
        .broadcaster
        .broadcast(&["orders"], "OrderShipped", &payload())
        .await
        .unwrap_err();

    assert!(matches!(err, BroadcastError::AggregateBroadcast { .. }));
    assert!(err.to_string().contains("transport error"));
    assert_eq!(h.delivery.attempts("app/orders"), 3);
    assert_eq!(h.sink.retry_delays().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn gateway_errors_are_not_retried() {
    let h = HarnessBuilder::new()
        .delivery(ScriptedDelivery::new().script("app/orders", &[Step::Gateway(500), Step::Ok]))
        .build();

    let err = h
        .broadcaster
        .broadcast_to_channel("app/orders", "OrderShipped", &payload())
        .await
        .unwrap_err();

    match err {
        BroadcastError::Gateway { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "gateway says no");
        }
        other => panic!("expected gateway error, got {other}"),
    }
    assert_eq!(h.delivery.attempts("app/orders"), 1);
    assert!(h.sink.retry_delays().is_empty());
}

#[tokio::test(start_paused = true)]
async fn custom_retry_policy_sets_budget_and_backoff() {
    let h = HarnessBuilder::new()
        .retry(RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
        })
        .delivery(ScriptedDelivery::new().script("app/orders", &[Step::Transport, Step::Transport]))
        .build();

    let err = h
        .broadcaster
        .broadcast_to_channel("app/orders", "OrderShipped", &payload())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(h.delivery.attempts("app/orders"), 2);
    assert_eq!(h.sink.retry_delays(), vec![Duration::from_millis(10)]);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_escapes_the_retry_loop_immediately() {
    let h = HarnessBuilder::new()
        .delivery(ScriptedDelivery::new().script("app/orders", &[Step::Unauthorized]))
        .build();

    let err = h
        .broadcaster
        .broadcast_to_channel("app/orders", "OrderShipped", &payload())
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(h.delivery.attempts("app/orders"), 1);
    assert_eq!(h.tokens.invalidations(), 0);
}

// ---------------------------------------------------------------------------
// Aggregation across channels
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn partial_failure_still_succeeds_and_is_reported() {
    let h = HarnessBuilder::new()
        .delivery(
            ScriptedDelivery::new()
                .script("app/a", &[Step::Ok])
                .script("app/b", &[Step::Unauthorized, Step::Ok])
                .script("app/c", &[Step::Gateway(422)]),
        )
        .build();

    let outcome = h
        .broadcaster
        .broadcast(&["a", "b", "c"], "OrderShipped", &payload())
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed_channels(), vec!["app/c".to_string()]);
    assert!(outcome.failures[0].error.contains("422"));

    // The 401 on b cost exactly one refresh.
    assert_eq!(h.tokens.invalidations(), 1);
    assert_eq!(h.delivery.resets(), 1);
    assert_eq!(h.delivery.attempts("app/b"), 2);

    let partial = h.sink.events().into_iter().find_map(|e| match e {
        BroadcastEvent::PartialFailure {
            failures,
            succeeded,
        } => Some((failures, succeeded)),
        _ => None,
    });
    let (failures, succeeded) = partial.expect("partial failure event");
    assert_eq!(succeeded, 2);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].channel, "app/c");
}

#[tokio::test(start_paused = true)]
async fn total_failure_raises_aggregate_error_naming_every_channel() {
    let h = HarnessBuilder::new()
        .delivery(
            ScriptedDelivery::new()
                .script("app/a", &[Step::Gateway(500)])
                .script("app/b", &[Step::Gateway(503)]),
        )
        .build();

    let err = h
        .broadcaster
        .broadcast(&["a", "b"], "OrderShipped", &payload())
        .await
        .unwrap_err();

    let BroadcastError::AggregateBroadcast { failures } = &err else {
        panic!("expected aggregate error, got {err}");
    };
    assert_eq!(failures.len(), 2);
    let message = err.to_string();
    assert!(message.contains("app/a"), "{message}");
    assert!(message.contains("app/b"), "{message}");
}

#[tokio::test(start_paused = true)]
async fn second_unauthorized_fails_the_channel_without_another_refresh() {
    let h = HarnessBuilder::new()
        .delivery(
            ScriptedDelivery::new()
                .script("app/a", &[Step::Unauthorized, Step::Unauthorized])
                .script("app/b", &[Step::Ok]),
        )
        .build();

    let outcome = h
        .broadcaster
        .broadcast(&["a", "b"], "OrderShipped", &payload())
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failed_channels(), vec!["app/a".to_string()]);
    assert_eq!(h.tokens.invalidations(), 1);
    assert_eq!(h.delivery.attempts("app/a"), 2);
}

#[tokio::test(start_paused = true)]
async fn strict_policy_fails_on_any_failed_channel() {
    let mut config = common::test_config();
    config.failure_policy = FailurePolicy::Strict;
    let h = HarnessBuilder::new()
        .config(config)
        .delivery(ScriptedDelivery::new().script("app/b", &[Step::Gateway(500)]))
        .build();

    let err = h
        .broadcaster
        .broadcast(&["a", "b"], "OrderShipped", &payload())
        .await
        .unwrap_err();

    match err {
        BroadcastError::AggregateBroadcast { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].channel, "app/b");
        }
        other => panic!("expected aggregate error, got {other}"),
    }
    // Channel a was still delivered.
    assert_eq!(h.delivery.attempts("app/a"), 1);
}

#[tokio::test]
async fn every_channel_is_namespaced_and_delivered_in_order() {
    let h = HarnessBuilder::new().build();

    let outcome = h
        .broadcaster
        .broadcast(
            &["private-orders.1", "presence-room.2", "app/news"],
            "Updated",
            &payload(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 3);
    let sent: Vec<String> = h.delivery.sent().into_iter().map(|e| e.channel).collect();
    assert_eq!(
        sent,
        vec!["app/private-orders.1", "app/presence-room.2", "app/app/news"]
    );

    let envelope = &h.delivery.sent()[0];
    assert_eq!(envelope.event, "Updated");
    assert_eq!(envelope.data["order_id"], 7);
}

#[tokio::test]
async fn empty_broadcast_is_a_no_op() {
    let h = HarnessBuilder::new().build();
    let channels: [&str; 0] = [];

    let outcome = h
        .broadcaster
        .broadcast(&channels, "Updated", &payload())
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 0);
    assert!(outcome.failures.is_empty());
    assert!(h.delivery.sent().is_empty());
}
