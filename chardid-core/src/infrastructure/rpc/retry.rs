use crate::foundation::{DidError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry an async operation with exponential backoff. The delay doubles
/// after each failure, capped at 30s.
pub async fn retry_with_backoff<F, Fut, T>(mut attempts: usize, initial_delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    const MAX_DELAY: Duration = Duration::from_secs(30);
    let mut delay = initial_delay;
    let mut last_err = None;
    while attempts > 0 {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_err = Some(err);
                attempts -= 1;
                if attempts > 0 {
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_DELAY);
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| DidError::Message("retry exhausted".to_string())))
}
