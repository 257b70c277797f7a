use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::Result;
use crate::StoreError;

/// Races a store round trip against the caller's cancellation token, so
/// every blocking operation unblocks promptly on cancellation.
pub(crate) async fn run_cancellable<T, F>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<T>
where
    F: Future<Output = std::result::Result<T, StoreError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = fut => Ok(res?),
    }
}
