use std::time::Duration;

use crate::common::config::{BackoffKind, RetryConfig};
use crate::policy::{ExponentialBackoff, FixedDelay};

/// 重试决策 (The Decision)
///
/// - 策略层返回给 Driver 的具体行动指令。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// [重新入队]
    ///
    /// 含义: "以 `RETRY-(n+1)` 前缀写回索引，score = now + duration"
    ///
    /// - duration 为 0 时，同一轮 `run_tasks` 内会被立即再次领取。
    RetryAfter(Duration),

    /// [放弃]
    ///
    /// 含义: "重试次数用尽，永久丢弃"
    /// - 行为: 不写回索引，只通知插件 `on_exhausted`。
    GiveUp,
}

/// 重试策略上下文
#[derive(Debug, Clone)]
pub struct RetryContext<'a> {
    /// Handler 名称
    pub handler: &'a str,
    /// 本次失败的任务已经失败过几次 (首次执行为 0)
    pub retry_count: u32,
}

impl<'a> RetryContext<'a> {
    pub fn new(handler: &'a str, retry_count: u32) -> Self {
        Self {
            handler,
            retry_count,
        }
    }
}

/// 重试策略接口 (The Interface)
///
/// - 决定了一个失败的任务要不要再来一次，以及多久之后再来。
pub trait RetryPolicy: Send + Sync + 'static {
    /// 核心决策方法
    fn decide(&self, ctx: &RetryContext<'_>) -> RetryDecision;
}

/// 按配置构建策略
pub fn from_config(cfg: &RetryConfig) -> Box<dyn RetryPolicy> {
    match cfg.backoff {
        BackoffKind::Fixed => Box::new(FixedDelay::new(cfg.max_retries, cfg.retry_delay_ms)),
        BackoffKind::Exponential => Box::new(ExponentialBackoff::new(
            cfg.max_retries,
            cfg.retry_delay_ms,
            cfg.max_retry_delay_ms,
        )),
    }
}
