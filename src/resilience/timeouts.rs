//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound a single upstream attempt with a deadline
//! - Turn an elapsed deadline into a retryable failure
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors in the message only;
//!   they classify as `Transient` like any connection failure

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::domain::UpstreamError;

/// Run `fut`, failing with a transient error once `deadline` elapses.
pub async fn with_deadline<T, F>(deadline: Option<Duration>, fut: F) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    match deadline {
        Some(limit) => match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::transient(format!(
                "attempt timed out after {} ms",
                limit.as_millis()
            ))),
        },
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_maps_to_transient() {
        let result: Result<(), _> = with_deadline(Some(Duration::from_millis(50)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_no_deadline_passes_through() {
        let result = with_deadline(None, async { Ok::<_, UpstreamError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
