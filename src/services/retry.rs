//! 重试与退避封装
//! 仅对限流类错误重试：指数退避，优先采用服务端建议的等待时长

use crate::services::gemini::GenerateError;
use std::future::Future;
use std::time::{Duration, Instant};

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次失败后的等待时长（不含服务端提示）
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// 在限流错误下按策略重试 operation，其余错误立即透传
///
/// 每次尝试的结果都带着 label 写入日志。重试间隔为
/// min(max_delay, base_delay * 2^attempt)；若限流错误携带服务端建议的
/// 等待时长，则改用建议值 + 1 秒。重试耗尽后返回最后一次限流错误。
pub async fn call_with_retry<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, GenerateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerateError>>,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                log::info!(
                    "[{}] succeeded on attempt {} after {:?}",
                    label,
                    attempt + 1,
                    started.elapsed()
                );
                return Ok(value);
            }
            Err(GenerateError::RateLimited {
                message,
                retry_after,
            }) => {
                if attempt >= policy.max_retries {
                    log::error!(
                        "[{}] rate limited, retries exhausted after {} attempts ({:?})",
                        label,
                        attempt + 1,
                        started.elapsed()
                    );
                    return Err(GenerateError::RateLimited {
                        message,
                        retry_after,
                    });
                }

                let delay = match retry_after {
                    Some(suggested) => suggested.saturating_add(Duration::from_secs(1)),
                    None => policy.backoff_delay(attempt),
                };
                log::warn!(
                    "[{}] rate limited on attempt {}, waiting {:?} before retry: {}",
                    label,
                    attempt + 1,
                    delay,
                    message
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                log::error!(
                    "[{}] failed on attempt {} without retry: {}",
                    label,
                    attempt + 1,
                    err
                );
                return Err(err);
            }
        }
    }
}
