use std::time::Duration;

use crate::{common::SchedulerError, driver::context::DriverContext, scheduler::JobContext};
use async_trait::async_trait;

/// 成员被丢弃的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// 成员格式损坏，无法解码
    Malformed,
    /// 当前进程没有注册这个 Handler
    UnknownHandler,
}

/// 驱动器插件/钩子接口
///
/// 用户可以通过实现此 Trait 来介入 Driver 的生命周期。
/// 常见用途：
/// - 自定义日志/监控 (Metrics)
/// - 错误报警 (Alerting)
/// - 重试耗尽后的补偿 (没有死信队列，`on_exhausted` 是唯一的出口)
///
/// 所有钩子都在 drain 内部串行调用，不要在里面做耗时操作。
#[async_trait]
pub trait DriverPlugin: Send + Sync + 'static {
    /// [生命周期] 调度器关闭时调用
    async fn on_shutdown(&self, _ctx: &DriverContext) {}

    /// [任务] 任务开始执行前调用
    async fn before_execute(&self, _job: &JobContext) {}

    /// [执行后] 任务执行结束 (无论成功失败都会调用)
    /// 用于记录总耗时
    async fn after_execute(&self, _job: &JobContext, _duration: Duration) {}

    /// [执行成功] Handler 返回 Ok
    async fn on_success(&self, _job: &JobContext) {}

    /// [执行失败] Handler 返回 Err 或 Panic
    ///
    /// `error` 总是 `SchedulerError::HandlerFailed`。
    async fn on_failure(&self, _job: &JobContext, _error: &SchedulerError) {}

    /// [重试] 失败的任务已经以 `RETRY-(n+1)` 写回索引
    async fn on_retry(&self, _job: &JobContext, _next_due_ms: i64) {}

    /// [耗尽] 重试次数用尽，任务被永久丢弃
    async fn on_exhausted(&self, _job: &JobContext) {}

    /// [丢弃] 被领取的成员无法执行
    async fn on_dropped(&self, _member: &str, _reason: DropReason) {}
}

// ==========================================
// 默认的空插件 (No-Op)
// ==========================================

pub struct NoOpPlugin;

#[async_trait]
impl DriverPlugin for NoOpPlugin {}
