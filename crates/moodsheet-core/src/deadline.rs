//! Run an external operation with a time budget.
//!
//! A timeout only stops the wait. The underlying future is dropped, so any
//! request it already sent may still take effect on the remote side.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// An operation exceeded its time budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} timed out after {}ms", .budget.as_millis())]
pub struct DeadlineExceeded {
    /// Name of the operation, used in logs and error messages.
    pub operation: &'static str,
    pub budget: Duration,
}

/// Tagged result of [`call_with_deadline`].
#[derive(Debug)]
pub enum CallOutcome<T, E> {
    Completed(T),
    Failed(E),
    TimedOut(DeadlineExceeded),
}

impl<T, E> CallOutcome<T, E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CallOutcome::TimedOut(_))
    }

    /// Fold into a `Result`, turning a timeout into the caller's error type.
    pub fn into_result(self) -> Result<T, E>
    where
        E: From<DeadlineExceeded>,
    {
        match self {
            CallOutcome::Completed(value) => Ok(value),
            CallOutcome::Failed(err) => Err(err),
            CallOutcome::TimedOut(timeout) => Err(timeout.into()),
        }
    }
}

/// Await `future` for at most `budget`.
pub async fn call_with_deadline<T, E, F>(
    operation: &'static str,
    budget: Duration,
    future: F,
) -> CallOutcome<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(budget, future).await {
        Ok(Ok(value)) => CallOutcome::Completed(value),
        Ok(Err(err)) => CallOutcome::Failed(err),
        Err(_) => {
            warn!(
                operation = operation,
                budget_ms = budget.as_millis() as u64,
                "Operation timed out"
            );
            CallOutcome::TimedOut(DeadlineExceeded { operation, budget })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Boom,
        Timeout(String),
    }

    impl From<DeadlineExceeded> for TestError {
        fn from(e: DeadlineExceeded) -> Self {
            TestError::Timeout(e.to_string())
        }
    }

    #[test]
    fn test_deadline_exceeded_is_an_error() {
        let err = DeadlineExceeded {
            operation: "listChildren",
            budget: Duration::from_millis(8000),
        };
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err.clone());
        assert_eq!(boxed.to_string(), "listChildren timed out after 8000ms");
        assert!(boxed.source().is_none());
    }

    #[tokio::test]
    async fn test_completed() {
        let outcome: CallOutcome<u32, TestError> =
            call_with_deadline("fast", Duration::from_millis(100), async { Ok(7) }).await;
        assert!(!outcome.is_timeout());
        assert_eq!(outcome.into_result(), Ok(7));
    }

    #[tokio::test]
    async fn test_failed_passes_error_through() {
        let outcome: CallOutcome<u32, TestError> =
            call_with_deadline("fails", Duration::from_millis(100), async {
                Err(TestError::Boom)
            })
            .await;
        assert_eq!(outcome.into_result(), Err(TestError::Boom));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out() {
        let outcome: CallOutcome<u32, TestError> =
            call_with_deadline("writeRow", Duration::from_millis(5000), async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            })
            .await;
        assert!(outcome.is_timeout());
        assert_eq!(
            outcome.into_result(),
            Err(TestError::Timeout("writeRow timed out after 5000ms".into()))
        );
    }
}
