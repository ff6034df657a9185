use std::time::Duration;

use crate::common::calculate_backoff;
use crate::policy::{RetryContext, RetryDecision, RetryPolicy};

/// 指数退避策略
///
/// - 随着失败次数增加，重试间隔呈指数级增长，并带随机抖动。
/// - 适用于下游服务短暂故障的场景，避免所有实例同时重试把对方打爆。
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_retries: u32,
    base_ms: u64,
    max_ms: u64,
}

impl ExponentialBackoff {
    /// 创建退避策略
    ///
    /// # 参数
    /// - `base_ms`: 第一次重试的基准间隔
    /// - `max_ms`: 最大间隔 (封顶值)
    pub fn new(max_retries: u32, base_ms: u64, max_ms: u64) -> Self {
        Self {
            max_retries,
            base_ms,
            max_ms,
        }
    }

    fn delay_for(&self, retry_count: u32) -> Duration {
        calculate_backoff(retry_count + 1, self.base_ms, self.max_ms)
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn decide(&self, ctx: &RetryContext<'_>) -> RetryDecision {
        if ctx.retry_count >= self.max_retries {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.delay_for(ctx.retry_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_is_capped() {
        let policy = ExponentialBackoff::new(10, 100, 1000);
        let first = match policy.decide(&RetryContext::new("a", 0)) {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::GiveUp => panic!("should retry"),
        };
        assert!(first <= Duration::from_millis(100));

        let late = match policy.decide(&RetryContext::new("a", 9)) {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::GiveUp => panic!("should retry"),
        };
        assert!(late <= Duration::from_millis(1000));
        assert!(late >= Duration::from_millis(500));
    }

    #[test]
    fn gives_up_after_max_retries() {
        let policy = ExponentialBackoff::new(2, 100, 1000);
        assert_eq!(policy.decide(&RetryContext::new("a", 2)), RetryDecision::GiveUp);
    }
}
