use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::common::error::{Result, SchedulerError};
use crate::common::{DrainReport, TaskMember, TimeUtils};
use crate::driver::context::DriverContext;
use crate::driver::pacemaker::{TaskPacemaker, TimerState};
use crate::driver::plugin::{DriverPlugin, DropReason};
use crate::persistence::IndexEntry;
use crate::policy::{RetryContext, RetryDecision, RetryPolicy};
use crate::scheduler::{HandlerRegistry, JobContext};

/// Drain 锁守卫 (DrainGuard) - RAII
///
/// 只能通过 CAS 拿到，Drop 时释放。
/// 无论 drain 是正常结束、存储报错还是提前返回，锁都一定会被释放。
struct DrainGuard<'a> {
    locked: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn try_acquire(locked: &'a AtomicBool) -> Option<Self> {
        locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { locked })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.locked.store(false, Ordering::Release);
    }
}

/// 驱动器Inner 结构体
pub(crate) struct DriverInner {
    /// 全局上下文
    pub(crate) ctx: DriverContext,
    /// Handler 注册表 (名称 -> Handler)
    pub(crate) registry: Arc<HandlerRegistry>,
    /// 重试策略
    retry_policy: Box<dyn RetryPolicy>,
    /// 插件系统
    plugins: Vec<Box<dyn DriverPlugin>>,
    /// Drain 锁 (进程内单飞)
    locked: AtomicBool,
    /// 持锁期间有 schedule 发生，解锁后补发一次失效通知
    deferred_invalidation: AtomicBool,
    /// 单定时器
    pub(crate) pacemaker: TaskPacemaker,
    /// "查询最早成员 -> 布防" 的串行锁，drain 前释放
    arming: tokio::sync::Mutex<()>,
    /// 监听协程的停止信号
    pub(crate) listener: Mutex<Option<CancellationToken>>,
}

/// 任务驱动器 (The Engine)
///
/// 负责定时器重算和到期任务的执行。Clone 只是增加引用计数。
#[derive(Clone)]
pub struct TaskDriver {
    pub(crate) inner: Arc<DriverInner>, //减轻Arc Clone
}

impl TaskDriver {
    /// 构造函数
    pub fn new_with_components(
        ctx: DriverContext,
        registry: Arc<HandlerRegistry>,
        plugins: Vec<Box<dyn DriverPlugin>>,
        retry_policy: Box<dyn RetryPolicy>,
    ) -> Self {
        let inner = DriverInner {
            ctx,
            registry,
            retry_policy,
            plugins,
            locked: AtomicBool::new(false),
            deferred_invalidation: AtomicBool::new(false),
            pacemaker: TaskPacemaker::new(),
            arming: tokio::sync::Mutex::new(()),
            listener: Mutex::new(None),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn context(&self) -> &DriverContext {
        &self.inner.ctx
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.inner.registry
    }

    /// 是否正持有 drain 锁
    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    /// 当前定时器状态
    pub fn timer_state(&self) -> TimerState {
        if self.is_locked() {
            return TimerState::Executing;
        }
        match self.inner.pacemaker.fires_at() {
            Some(fires_at_ms) => TimerState::Armed { fires_at_ms },
            None => TimerState::Idle,
        }
    }

    // ==========================================
    // 失效通知
    // ==========================================

    /// 索引可能出现了更早的任务，通知所有实例重算定时器
    ///
    /// 持锁期间只记一个标记，drain 结束后统一补发一次。
    pub(crate) async fn notify_changed(&self) -> Result<()> {
        if self.is_locked() {
            self.inner
                .deferred_invalidation
                .store(true, Ordering::Release);
            trace!("[Driver] Drain in progress, invalidation deferred");
            return Ok(());
        }
        let ctx = &self.inner.ctx;
        ctx.channel.publish(ctx.update_message()).await
    }

    async fn flush_deferred_invalidation(&self) {
        if !self
            .inner
            .deferred_invalidation
            .swap(false, Ordering::AcqRel)
        {
            return;
        }
        let ctx = &self.inner.ctx;
        if let Err(e) = ctx.channel.publish(ctx.update_message()).await {
            // 本实例马上会重算；远端实例靠定时器 horizon 兜底
            warn!("[Driver] Deferred invalidation publish failed: {}", e);
        }
    }

    // ==========================================
    // Core Logic: 定时器重算
    // ==========================================

    /// 重算定时器
    ///
    /// 每次都重新查询索引中最早的成员，不做任何缓存：
    /// - 索引为空 -> 撤防
    /// - 最早的已经到期 -> 立即 drain，然后再查一次
    /// - 否则布防一个定时器，最长不超过 horizon
    pub async fn recompute(&self) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        loop {
            // 读索引到布防之间不允许其它重算插入
            let arming = self.inner.arming.lock().await;
            if self.is_locked() {
                trace!("[Driver] Recompute skipped, drain in progress");
                return Ok(report);
            }

            let Some(earliest) = self.inner.ctx.index.peek_earliest().await? else {
                self.inner.pacemaker.disarm();
                return Ok(report);
            };

            let now = TimeUtils::now_millis();
            if earliest.score <= now {
                drop(arming);
                let drained = self.drain().await?;
                if drained.drains == 0 {
                    // 另一个调用方刚拿到锁，它结束后会自己重算
                    return Ok(report);
                }
                report.merge(drained);
                continue;
            }

            self.arm(&earliest, now);
            return Ok(report);
        }
    }

    /// 为最早的成员布防定时器
    fn arm(&self, earliest: &IndexEntry, now: i64) {
        let ctx = &self.inner.ctx;
        if ctx.is_shutdown() {
            return;
        }
        let delay_ms = TimeUtils::timer_delay_ms(earliest.score, now, ctx.config.timer.max_horizon_ms);
        let fires_at = now.saturating_add(delay_ms as i64);

        // 定时器只持有弱引用，调度器被丢弃后定时器自然失效
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .pacemaker
            .arm(fires_at, Duration::from_millis(delay_ms), move |generation| async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                // 先让出槽位，drain 期间的重新布防不会中止当前协程
                if !inner.pacemaker.release(generation) {
                    return;
                }
                inner.ctx.metrics.inc_timer_fires();
                let driver = TaskDriver { inner };
                trace!("[Pacemaker] Timer #{} fired", generation);
                if let Err(e) = driver.run_tasks().await {
                    error!("[Pacemaker] Run tasks after timer fire failed: {}", e);
                }
            });
    }

    // ==========================================
    // Core Logic: 执行逻辑
    // ==========================================

    /// 执行所有到期任务，然后重算定时器
    ///
    /// 如果另一个 drain 正在进行，立即返回一个空报告。
    pub async fn run_tasks(&self) -> Result<DrainReport> {
        let mut report = self.drain().await?;
        report.merge(self.recompute().await?);
        Ok(report)
    }

    /// 单轮 drain：拿锁 -> 领取 -> 逐个执行 -> 解锁 -> 补发通知
    async fn drain(&self) -> Result<DrainReport> {
        let Some(guard) = DrainGuard::try_acquire(&self.inner.locked) else {
            trace!("[Driver] Drain already in progress");
            return Ok(DrainReport::default());
        };

        let result = self.drain_locked().await;
        drop(guard);

        self.flush_deferred_invalidation().await;
        result
    }

    async fn drain_locked(&self) -> Result<DrainReport> {
        let ctx = &self.inner.ctx;
        let now = TimeUtils::now_millis();

        let entries = ctx.index.claim_due(now).await?;
        ctx.metrics.inc_drains();

        let mut report = DrainReport {
            drains: 1,
            claimed: entries.len(),
            ..Default::default()
        };
        if !entries.is_empty() {
            debug!(
                "[Driver-{}] Claimed {} due task(s)",
                ctx.node_id,
                entries.len()
            );
        }

        // 串行执行，单个任务的失败不影响同批次其它任务
        for entry in entries {
            self.dispatch(entry, &mut report).await;
        }
        Ok(report)
    }

    /// 执行一个被领取的成员
    async fn dispatch(&self, entry: IndexEntry, report: &mut DrainReport) {
        let plugins = &self.inner.plugins;

        let member = match TaskMember::decode(&entry.member) {
            Ok(member) => member,
            Err(e) => {
                warn!("[Driver] Dropping claimed member: {}", e);
                report.dropped += 1;
                for p in plugins.iter() {
                    p.on_dropped(&entry.member, DropReason::Malformed).await;
                }
                return;
            }
        };

        let Some(handler) = self.inner.registry.get(&member.handler) else {
            debug!(
                "[Driver] No handler `{}` on this node, dropping {}",
                member.handler, entry.member
            );
            report.dropped += 1;
            for p in plugins.iter() {
                p.on_dropped(&entry.member, DropReason::UnknownHandler).await;
            }
            return;
        };

        let job = JobContext::new(&member, entry.score, &self.inner.ctx.node_id);

        // Hook: 执行前
        for p in plugins.iter() {
            p.before_execute(&job).await;
        }
        let start = Instant::now();
        let result = AssertUnwindSafe(handler.handle(job.clone()))
            .catch_unwind()
            .await;
        let duration = start.elapsed();
        // [Hook] 执行后 (通用)
        for p in plugins.iter() {
            p.after_execute(&job, duration).await;
        }

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(panic) => Some(anyhow::anyhow!(panic_message(&*panic))),
        };

        match failure {
            None => {
                report.succeeded += 1;
                for p in plugins.iter() {
                    p.on_success(&job).await;
                }
            }
            Some(source) => {
                report.failed += 1;
                let err = SchedulerError::handler_failed(&member.handler, source);
                error!(
                    "[Driver] Task {} failed on attempt {}: {}",
                    entry.member,
                    job.attempt(),
                    err
                );
                for p in plugins.iter() {
                    p.on_failure(&job, &err).await;
                }
                self.handle_failure(&member, &job, report).await;
            }
        }
    }

    /// 处理任务失败
    /// - 询问重试策略
    /// - 重新入队或者永久丢弃
    async fn handle_failure(&self, member: &TaskMember, job: &JobContext, report: &mut DrainReport) {
        let ctx = &self.inner.ctx;
        let decision = self
            .inner
            .retry_policy
            .decide(&RetryContext::new(&member.handler, member.retry_count));

        match decision {
            RetryDecision::RetryAfter(delay) => {
                let next = member.next_attempt();
                let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
                let due = TimeUtils::now_millis().saturating_add(delay_ms);
                let encoded = next.encode();
                match ctx.index.upsert(&encoded, due).await {
                    Ok(()) => {
                        report.retried += 1;
                        trace!("[Driver] Requeued {} at {}", encoded, due);
                        for p in self.inner.plugins.iter() {
                            p.on_retry(job, due).await;
                        }
                    }
                    // 重试丢失，但批次里的其它任务照常执行
                    Err(e) => error!("[Driver] Retry requeue failed for {}: {}", encoded, e),
                }
            }
            RetryDecision::GiveUp => {
                report.exhausted += 1;
                warn!(
                    "[Driver] Task {}:{} exhausted after {} attempt(s), dropping",
                    member.handler,
                    member.payload,
                    job.attempt()
                );
                for p in self.inner.plugins.iter() {
                    p.on_exhausted(job).await;
                }
            }
        }
    }

    /// 触发停机
    /// - 停止监听、撤防定时器，之后不再布防
    /// - 正在进行的 drain 会正常跑完
    pub async fn shutdown(&self) {
        trace!("[Driver] Shutdown triggered.");
        self.inner.ctx.shutdown.cancel();
        self.disable_listener();
        self.inner.pacemaker.disarm();

        // [Hook] 关闭
        for p in self.inner.plugins.iter() {
            p.on_shutdown(&self.inner.ctx).await;
        }
        trace!("[Driver-{}] Shutdown complete.", self.inner.ctx.node_id);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("Panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("Panic: {}", s)
    } else {
        "Panic: Unknown error".to_string()
    }
}
