//! Executor jobs
//!
//! Device SDK calls block on network I/O. They run on tokio's blocking pool
//! so the async workers stay free.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("executor job panicked: {0}")]
    Panicked(String),

    #[error("executor job was cancelled")]
    Cancelled,
}

/// Run a blocking job on the blocking pool and await its result
pub async fn async_add_executor_job<F, R>(job: F) -> Result<R, ExecutorError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(|e| {
        if e.is_panic() {
            ExecutorError::Panicked(e.to_string())
        } else {
            ExecutorError::Cancelled
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_result_is_returned() {
        let value = async_add_executor_job(|| 6 * 7).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_panicking_job_is_reported() {
        let result = async_add_executor_job(|| -> u8 { panic!("device exploded") }).await;
        assert!(matches!(result, Err(ExecutorError::Panicked(_))));
    }
}
