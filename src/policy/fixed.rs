use std::time::Duration;

use crate::policy::{RetryContext, RetryDecision, RetryPolicy};

/// 固定延迟策略
///
/// - 每次失败都在 `now + delay` 重新入队。
/// - 第一次执行之后最多再来 `max_retries` 次。
#[derive(Debug, Clone)]
pub struct FixedDelay {
    max_retries: u32,
    delay: Duration,
}

impl FixedDelay {
    pub fn new(max_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries,
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// 失败即放弃
    pub fn never() -> Self {
        Self::new(0, 0)
    }
}

impl RetryPolicy for FixedDelay {
    fn decide(&self, ctx: &RetryContext<'_>) -> RetryDecision {
        if ctx.retry_count < self.max_retries {
            RetryDecision::RetryAfter(self.delay)
        } else {
            RetryDecision::GiveUp
        }
    }
}
