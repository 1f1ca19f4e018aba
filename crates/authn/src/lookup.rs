//! Bounded collaborator calls.

use std::{future::Future, time::Duration};

use extjwt_storage::{StorageError, StorageResult};
use tokio_util::sync::CancellationToken;

use crate::error::AuthError;

/// Runs a collaborator lookup under `timeout`, abandoning it if `cancel`
/// fires first.
///
/// Elapsed timeouts surface as [`StorageError::Timeout`] in the inner
/// result so callers map them like any other lookup failure. Cancellation
/// surfaces as [`AuthError::Cancelled`].
pub(crate) async fn bounded<T>(
    timeout: Duration,
    cancel: &CancellationToken,
    lookup: impl Future<Output = StorageResult<T>>,
) -> Result<StorageResult<T>, AuthError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AuthError::Cancelled),
        result = tokio::time::timeout(timeout, lookup) => {
            Ok(result.unwrap_or_else(|_elapsed| Err(StorageError::timeout())))
        },
    }
}
