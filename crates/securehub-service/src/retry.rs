use std::time::Duration;

use securehub_store::{ObjectStoreGateway, StoreError};
use tracing::warn;

/// Delete `key`, retrying with exponential backoff.
///
/// `attempts` counts the first try; zero is treated as one. The wait before
/// retry `n` is `backoff * 2^(n-1)`.
pub async fn delete_with_retry(
    store: &dyn ObjectStoreGateway,
    key: &str,
    attempts: u32,
    backoff: Duration,
) -> Result<(), StoreError> {
    let attempts = attempts.max(1);
    let mut attempt = 0u32;
    loop {
        match store.delete(key).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts {
                    warn!(key, attempts, error = %e, "object delete failed, giving up");
                    return Err(e);
                }
                let wait = backoff.saturating_mul(2u32.saturating_pow(attempt - 1));
                warn!(key, attempt, error = %e, wait_ms = wait.as_millis() as u64, "object delete failed, retrying");
                tokio::time::sleep(wait).await;
            }
        }
    }
}
