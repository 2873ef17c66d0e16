//! 重试策略 - 业务能力层
//!
//! 固定间隔、有限次数的重试，包裹任意异步操作

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    delay: Duration,
}

/// 重试耗尽后的错误，保留最后一次失败的原因
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: usize,
    pub last_error: E,
}

impl RetryPolicy {
    /// 创建重试策略，至少尝试一次
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// 无等待的重试策略（测试用）
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 执行操作，失败时按策略重试
    ///
    /// `op` 收到当前尝试序号（从 1 开始）
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    warn!(
                        "{} 失败 (尝试 {}/{})，放弃: {}",
                        label, attempt, self.max_attempts, e
                    );
                    return Err(RetryError {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    warn!(
                        "{} 失败 (尝试 {}/{}), 等待 {:?} 后重试: {}",
                        label, attempt, self.max_attempts, self.delay, e
                    );
                    if !self.delay.is_zero() {
                        sleep(self.delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}
