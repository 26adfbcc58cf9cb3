//! `with_timeout(seconds, fallback)` from spec §4.1.
//!
//! The "shared worker pool" is the process-wide `tokio` runtime; submitting
//! a callable to it is just awaiting the future on that runtime. Bounding it
//! is `tokio::time::timeout`, the same primitive the teacher applies at the
//! `reqwest` layer in `vault/llm.rs::chat_completion`. On expiry the future
//! is dropped (best-effort cancellation — Rust has no safe preemption) and
//! the caller gets the fallback instead of an error: the wrapper never
//! raises.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Runs `fut` with a hard deadline. Returns `None` on timeout; callers
/// combine this with their own fallback factory (spec's `fallback(*args,
/// **kwargs)` sentinel) rather than this function manufacturing one, since
/// the fallback shape is call-site specific.
pub async fn with_timeout<T, Fut>(timeout: Duration, fut: Fut) -> Option<T>
where
    Fut: Future<Output = T>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(?timeout, "cacheguard: external call exceeded deadline, falling back");
            None
        }
    }
}

/// Convenience: run with a deadline and an eagerly-available fallback
/// value, returning the sentinel string contract from spec §4.1 when the
/// adapter times out ("fallback strings are opaque to callers").
pub async fn with_timeout_or<T, Fut, Fb>(timeout: Duration, fut: Fut, fallback: Fb) -> T
where
    Fut: Future<Output = T>,
    Fb: FnOnce() -> T,
{
    with_timeout(timeout, fut).await.unwrap_or_else(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fast_future_completes() {
        let v = with_timeout(Duration::from_millis(50), async { 42 }).await;
        assert_eq!(v, Some(42));
    }

    #[tokio::test]
    async fn slow_future_times_out_to_none() {
        let v = with_timeout(Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            42
        })
        .await;
        assert_eq!(v, None);
    }

    #[tokio::test]
    async fn with_timeout_or_falls_back_on_expiry() {
        let v = with_timeout_or(
            Duration::from_millis(5),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "real".to_string()
            },
            || "fallback:timeout".to_string(),
        )
        .await;
        assert_eq!(v, "fallback:timeout");
    }
}
