//! Deadline and cancellation behavior of the retry loop.
//!
//! These run on a paused tokio clock: timers fire as soon as the runtime is
//! idle, so backoff waits of many seconds take no wall-clock time.

mod common;

use std::time::Duration;

use common::{MockTransport, Step};
use reqbox::{Backoff, Client, Context, ContextError, Error, StatusCode, TransportError};

fn client(transport: &MockTransport, backoff: Backoff) -> Client {
    Client::builder()
        .base_url("http://api.test")
        .transport(transport.clone())
        .backoff(backoff)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_backoff_aborts_before_next_attempt() {
    let transport = MockTransport::always(Step::status(500));
    let client = client(&transport, Backoff::constant(Duration::from_secs(10)));

    let result = client
        .get("/slow")
        .expect_status(StatusCode::OK)
        .retry(5)
        .timeout(Duration::from_secs(1))
        .send()
        .await;

    match result {
        Err(Error::Cancelled { attempts, source }) => {
            assert_eq!(attempts, 1);
            assert_eq!(source, ContextError::DeadlineExceeded);
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_interrupts_exchange() {
    let transport = MockTransport::always(Step::Hang);
    let client = client(&transport, Backoff::none());

    let started = tokio::time::Instant::now();
    let result = client
        .get("/hang")
        .retry(3)
        .timeout(Duration::from_secs(2))
        .send()
        .await;

    assert!(matches!(
        result,
        Err(Error::Cancelled {
            attempts: 1,
            source: ContextError::DeadlineExceeded
        })
    ));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_per_attempt_timeout_consumes_attempts() {
    let transport = MockTransport::always(Step::Hang);
    let client = Client::builder()
        .transport(transport.clone())
        .timeout(Duration::from_secs(1))
        .backoff(Backoff::none())
        .build()
        .unwrap();

    let result = client.get("http://api.test/hang").retry(2).send().await;

    assert!(matches!(
        result,
        Err(Error::Transport {
            attempts: 3,
            source: TransportError::Timeout
        })
    ));
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_cancelled_context_never_dispatches() {
    let transport = MockTransport::always(Step::status(200));
    let client = client(&transport, Backoff::none());
    let (ctx, handle) = Context::background().with_cancel();
    handle.cancel();

    let result = client.get("/items").context(ctx).send().await;

    assert!(matches!(
        result,
        Err(Error::Cancelled {
            attempts: 0,
            source: ContextError::Cancelled
        })
    ));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_from_another_task_during_backoff() {
    let transport = MockTransport::always(Step::Fail);
    let client = client(&transport, Backoff::constant(Duration::from_secs(60)));
    let (ctx, handle) = Context::background().with_cancel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = client
        .get("/items")
        .retry(10)
        .context(ctx)
        .send()
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), 1);
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_later_than_retries_does_not_interfere() {
    let transport = MockTransport::script([Step::status(503), Step::status(200)]);
    let client = client(&transport, Backoff::constant(Duration::from_secs(1)));

    let response = client
        .get("/items")
        .expect_status(StatusCode::OK)
        .retry(1)
        .timeout(Duration::from_secs(30))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(transport.calls(), 2);
}
