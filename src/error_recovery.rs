// src/error_recovery.rs
//! Retry with exponential backoff for network operations.

use crate::error::{classify_fetch_failure, AppError, FetchFailureKind};
use std::time::Duration;

/// Retries an async operation with exponential backoff.
///
/// Only transient failures are retried; auth, not-found and other errors
/// are returned after the first attempt.
pub async fn retry_with_backoff<F, T, Fut>(
    mut operation: F,
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AppError>>,
{
    let mut delay = initial_delay;
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let kind = classify_fetch_failure(&e);
                if kind != FetchFailureKind::Transient || attempt == max_attempts {
                    return Err(e);
                }
                log::warn!(
                    "Attempt {} failed ({}), retrying after {:?}",
                    attempt,
                    e,
                    delay
                );
                last_error = Some(e);
                tokio::time::sleep(delay).await;

                // Exponential backoff with cap
                delay = std::cmp::min(delay * 2, max_delay);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::InternalError {
        message: "Retry failed with no error".to_string(),
        source: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WikiErrorCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn service_error(status: u16) -> AppError {
        AppError::WikiService {
            code: WikiErrorCode::from_http_status(status),
            message: "test".to_string(),
            status: reqwest::StatusCode::from_u16(status).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_with_backoff(
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(service_error(503))
                } else {
                    Ok("done")
                }
            },
            2,
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_with_backoff(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(service_error(404))
            },
            3,
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_with_backoff(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(service_error(502))
            },
            2,
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
