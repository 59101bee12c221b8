use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Run an async operation up to `max_attempts` times with exponential backoff.
///
/// The delay before attempt n+1 is `base_delay * 2^(n-1)`, so a 10s base gives
/// 10s, 20s, 40s, 80s between five attempts. The last error is returned once
/// attempts are exhausted.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    max_attempts: u32,
    base_delay: Duration,
    label: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt == max_attempts {
                    warn!("{} failed after {} attempts: {}", label, max_attempts, e);
                    last_error = Some(e);
                    break;
                }

                let backoff = base_delay * 2u32.saturating_pow(attempt - 1);
                debug!(
                    "Attempt {} for {} failed: {}. Retrying in {:?}...",
                    attempt, label, e, backoff
                );
                last_error = Some(e);
                tokio::time::sleep(backoff).await;
            }
        }
    }

    Err(last_error.expect("at least one attempt runs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(format!("transient {n}"))
                    } else {
                        Ok(n)
                    }
                }
            },
            5,
            Duration::from_secs(10),
            "test op",
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("attempt {n}")) }
            },
            5,
            Duration::from_secs(10),
            "always fails",
        )
        .await;

        assert_eq!(result.unwrap_err(), "attempt 5");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_between_attempts() {
        let start = tokio::time::Instant::now();
        let _: Result<(), &str> = with_retry(
            || async { Err("nope") },
            3,
            Duration::from_secs(10),
            "timing",
        )
        .await;

        // 10s + 20s of backoff across three attempts
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
