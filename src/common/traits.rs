use async_trait::async_trait;
use std::sync::Arc;

use crate::scheduler::JobContext;

// ==========================================
// 任务处理接口 (TaskHandler)
// ==========================================

/// 任务处理接口
///
/// 注册表里保存的就是它的 trait object。
/// - 闭包形式的 Handler 由 `scheduler::router::HandlerWrapper` 包装成它。
/// - 也可以直接为自己的结构体实现它，再用 `Scheduler::set_task_handler` 注册。
///
/// # 返回值
/// - `Ok(())`: 任务成功，不再做任何事。
/// - `Err(e)`: 任务失败，调度器捕获错误并交给重试策略。错误永远不会返回给当初提交任务的人。
///
/// # 幂等
/// 调度器只保证 at-least-once：进程在执行中途崩溃、或者重试，都可能让同一个 payload 被执行多次。
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: JobContext) -> anyhow::Result<()>;
}

// 让 Arc<Handler> 自动实现 TaskHandler
#[async_trait]
impl<H> TaskHandler for Arc<H>
where
    H: TaskHandler + ?Sized,
{
    async fn handle(&self, ctx: JobContext) -> anyhow::Result<()> {
        (**self).handle(ctx).await
    }
}
