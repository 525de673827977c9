//! Compensation for multi-step writes.
//!
//! The store has no cross-statement transactions, so a manager that fails half way
//! runs the inverse of the steps it already applied and reports the original failure.

use std::future::Future;

use crate::error::AppError;

/// Runs `undo` after `failure` and returns the error the caller should surface:
/// the original one if the undo succeeded, otherwise [`AppError::CompensationFailed`].
pub(crate) async fn compensate<F, T, E>(failure: AppError, step: &'static str, undo: F) -> AppError
where
    F: Future<Output = Result<T, E>>,
    E: Into<AppError>,
{
    tracing::warn!(step, error = %failure, "step failed, compensating");
    match undo.await {
        Ok(_) => failure,
        Err(err) => {
            let compensation = err.into();
            tracing::error!(step, error = %failure, compensation = %compensation, "compensation failed");
            AppError::CompensationFailed {
                original: Box::new(failure),
                compensation: Box::new(compensation),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[tokio::test]
    async fn successful_undo_keeps_original_error() {
        let err = compensate(AppError::Conflict("taken".into()), "test", async {
            Ok::<_, AppError>(())
        })
        .await;
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn failed_undo_carries_both_errors() {
        let err = compensate(
            AppError::Store(StoreError::Unavailable("insert".into())),
            "test",
            async { Err::<(), _>(StoreError::Unavailable("delete".into())) },
        )
        .await;
        match err {
            AppError::CompensationFailed {
                original,
                compensation,
            } => {
                assert!(original.to_string().contains("insert"));
                assert!(compensation.to_string().contains("delete"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
