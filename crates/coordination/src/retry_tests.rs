// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};

#[tokio::test(start_paused = true)]
async fn succeeds_immediately_without_retrying() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::default();
    let result = policy
        .run(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CoordinationError>(42)
        })
        .await
        .unwrap();
    assert_eq!(result, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_transient_failures_then_succeeds() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy { initial_delay: Duration::from_millis(1), ..RetryPolicy::default() };
    let result = policy
        .run(|| async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(CoordinationError::Unavailable("connection refused".into()))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();
    assert_eq!(result, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    let policy =
        RetryPolicy { initial_delay: Duration::from_millis(1), max_attempts: 3, ..RetryPolicy::default() };
    let calls = AtomicU32::new(0);
    let err = policy
        .run(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(CoordinationError::Unavailable("down".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::Unavailable(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn does_not_retry_non_retryable_errors() {
    let policy = RetryPolicy::default();
    let calls = AtomicU32::new(0);
    let err = policy
        .run(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(CoordinationError::AlreadyExists("/leader".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::AlreadyExists(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
