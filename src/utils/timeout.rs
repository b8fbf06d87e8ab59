use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Runs a call against an external service, turning an expired deadline into
/// an `ExternalService` error instead of waiting forever.
pub async fn bounded<T, F>(service: &'static str, limit: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(service, timeout_ms = limit.as_millis() as u64, "External call timed out");
            Err(AppError::external(
                service,
                format!("no response within {}s", limit.as_secs_f32()),
            ))
        }
    }
}
