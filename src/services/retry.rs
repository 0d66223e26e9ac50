//! 重试执行器 - 业务能力层
//!
//! 指数退避重试单个上游调用；任何错误都视为可重试，只有取消会提前结束

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{AppError, AppResult, EvaluationError};

/// 重试执行器
///
/// 职责：
/// - 最多执行 `max_retries + 1` 次
/// - 两次尝试之间等待，初始延迟每次翻倍，不超过上限
/// - 每次尝试前、每次等待中都检查取消信号
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// 执行带重试的操作
    ///
    /// # 参数
    /// - `step`: 步骤名，用于日志和错误信息
    /// - `cancel`: 取消信号
    /// - `operation`: 每次尝试调用一次，返回新的 future
    ///
    /// # 返回
    /// 成功时返回操作结果；重试耗尽时返回 `RetriesExhausted`，
    /// 其中包含步骤名、总尝试次数和最后一次错误
    pub async fn execute<T, F, Fut>(
        &self,
        step: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut delay = self.config.initial_delay();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if cancel.is_cancelled() {
                return Err(AppError::cancelled(step));
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::cancelled(step)),
                outcome = operation() => outcome,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => err,
            };

            if attempt > self.config.max_retries {
                return Err(EvaluationError::RetriesExhausted {
                    step: step.to_string(),
                    attempts: attempt,
                    last_error: Box::new(err),
                }
                .into());
            }

            log_retry(step, attempt, delay, &err);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::cancelled(step)),
                _ = tokio::time::sleep(delay) => {}
            }

            delay = (delay * 2).min(self.config.max_delay());
        }
    }
}

// ========== 日志辅助函数 ==========

fn log_retry(step: &str, attempt: u32, delay: Duration, err: &AppError) {
    warn!(
        "[{}] ⚠️ 第 {} 次尝试失败，{}ms 后重试: {}",
        step,
        attempt,
        delay.as_millis(),
        err
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    #[tokio::test]
    async fn test_always_failing_operation_runs_max_retries_plus_one() {
        let _ = tracing_subscriber::fmt::try_init();
        let executor = RetryExecutor::new(fast_config(3));
        let calls = Arc::new(AtomicU32::new(0));

        let result: AppResult<()> = executor
            .execute("grammar", &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::Other("连接被拒绝".to_string()))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let err = assert_err!(result);
        let msg = err.to_string();
        assert!(msg.contains("grammar"));
        assert!(msg.contains("4"));
        assert!(msg.contains("连接被拒绝"));
    }

    #[tokio::test]
    async fn test_succeeds_on_kth_attempt() {
        let executor = RetryExecutor::new(fast_config(3));

        for k in 1..=4u32 {
            let calls = Arc::new(AtomicU32::new(0));
            let result = executor
                .execute("score", &CancellationToken::new(), || {
                    let calls = calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        if n < k {
                            Err(AppError::Other(format!("attempt {}", n)))
                        } else {
                            Ok(n)
                        }
                    }
                })
                .await;

            assert_eq!(assert_ok!(result), k);
            assert_eq!(calls.load(Ordering::SeqCst), k);
        }
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let executor = RetryExecutor::new(fast_config(0));
        let calls = Arc::new(AtomicU32::new(0));

        let result: AppResult<()> = executor
            .execute("fluency", &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::Other("x".to_string()))
                }
            })
            .await;

        assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let executor = RetryExecutor::new(fast_config(3));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));

        let result: AppResult<()> = executor
            .execute("overall", &cancel, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(assert_err!(result).is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_retrying() {
        let executor = RetryExecutor::new(RetryConfig {
            max_retries: 3,
            initial_delay_ms: 10_000,
            max_delay_ms: 10_000,
        });
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: AppResult<()> = executor
            .execute("paragraph", &cancel, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::Other("x".to_string()))
                }
            })
            .await;

        assert!(assert_err!(result).is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_hung_attempt() {
        let executor = RetryExecutor::new(fast_config(3));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: AppResult<()> = executor
            .execute("suggestion", &cancel, || async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;

        assert!(assert_err!(result).is_cancelled());
    }
}
