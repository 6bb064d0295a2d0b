//! Cancellation and timeout bounds shared by every provider call.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::GeocodeError;

/// Runs a provider request, racing it against cancellation and a timeout.
///
/// Cancellation is checked first, so an already-cancelled token never
/// starts the request.
///
/// # Errors
///
/// Returns [`GeocodeError::Cancelled`] if `cancel` fires first,
/// [`GeocodeError::Timeout`] if `timeout` elapses, or the request's own
/// error.
pub async fn guarded<T, F>(
    provider: &'static str,
    timeout: Duration,
    cancel: &CancellationToken,
    request: F,
) -> Result<T, GeocodeError>
where
    F: Future<Output = Result<T, GeocodeError>>,
{
    tokio::select! {
        biased;

        () = cancel.cancelled() => Err(GeocodeError::Cancelled),

        result = tokio::time::timeout(timeout, request) => {
            result.unwrap_or_else(|_| {
                Err(GeocodeError::Timeout {
                    provider,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            })
        }
    }
}

/// Collapses a provider result to `Option`, logging the failure.
///
/// Cancellation is expected (the user kept typing) and logged at debug
/// level; everything else is a warning.
pub fn settle<T>(provider: &str, query: &str, result: Result<T, GeocodeError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(GeocodeError::Cancelled) => {
            log::debug!("{provider}: request for '{query}' cancelled");
            None
        }
        Err(e) => {
            log::warn!("{provider} error for '{query}': {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn passes_through_success() {
        let cancel = CancellationToken::new();
        let result = guarded("test", Duration::from_secs(5), &cancel, async {
            Ok::<_, GeocodeError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_slow_requests() {
        let cancel = CancellationToken::new();
        let result = guarded("slow", Duration::from_secs(5), &cancel, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, GeocodeError>(())
        })
        .await;
        assert!(matches!(
            result,
            Err(GeocodeError::Timeout {
                provider: "slow",
                timeout_ms: 5000
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_wins() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = guarded("test", Duration::from_secs(5), &cancel, async {
            Ok::<_, GeocodeError>(1)
        })
        .await;
        assert!(matches!(result, Err(GeocodeError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_in_flight_request() {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            child.cancel();
        });
        let result = guarded("test", Duration::from_secs(5), &cancel, async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, GeocodeError>(())
        })
        .await;
        assert!(matches!(result, Err(GeocodeError::Cancelled)));
    }

    #[test]
    fn settle_drops_errors() {
        assert_eq!(settle("test", "q", Ok::<_, GeocodeError>(3)), Some(3));
        assert_eq!(settle::<i32>("test", "q", Err(GeocodeError::RateLimited)), None);
        assert_eq!(settle::<i32>("test", "q", Err(GeocodeError::Cancelled)), None);
    }
}
