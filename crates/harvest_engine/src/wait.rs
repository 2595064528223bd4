//! Suspension points. Every wait the engine performs goes through here so that
//! cancellation is observed at the next one.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{DriverError, HarvestError, PageDriver};

pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, HarvestError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HarvestError::Cancelled),
        result = fut => result.map_err(HarvestError::from),
    }
}

/// Fixed settle delay.
pub(crate) async fn pause<D: PageDriver>(
    driver: &D,
    cancel: &CancellationToken,
    duration: Duration,
) -> Result<(), HarvestError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HarvestError::Cancelled),
        _ = driver.wait(duration) => Ok(()),
    }
}
