use std::{future::Future, sync::Arc};

use serde::de::DeserializeOwned;

use crate::{
    common::{DrainReport, Result, SchedulerStats, TaskHandler},
    driver::{DriverMetrics, TaskDriver, TimerState},
    scheduler::{
        JobContext, SchedulerBuilder,
        router::{HandlerWrapper, PayloadDecoder, json_handler, raw_handler},
    },
};

/// 调度器实例 (The Public Face)
///
/// 这是用户直接交互的对象。它封装了底层的 `TaskDriver`，
/// 屏蔽了 Context 创建、组件组装等细节。
///
/// - Clone 是廉价的，所有 Clone 共享同一份注册表、定时器和监听。
/// - 多个进程 (或者多个用不同 `Scheduler` 的测试) 通过共享存储协作。
#[derive(Clone)]
pub struct Scheduler {
    /// 内部核心驱动器 (引擎)
    pub(crate) driver: TaskDriver,
}

impl Scheduler {
    /// 创建一个 Builder
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub fn node_id(&self) -> &str {
        &self.driver.context().node_id
    }

    // ==========================================
    // Handler 注册
    // ==========================================

    /// 注册处理原始字符串 payload 的 Handler
    ///
    /// 同名覆盖。名称为空、含 `:` 或形如 `RETRY-<数字>` 时返回 `InvalidName`。
    pub fn set_handler<F, Fut>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(JobContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.driver
            .registry()
            .set(name, Arc::new(raw_handler(handler)))
    }

    /// 注册 JSON 参数的 Handler
    ///
    /// payload 解析失败等同于 Handler 执行失败，会进入重试。
    pub fn set_json_handler<Args, F, Fut>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(JobContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
        Args: DeserializeOwned + Send + 'static,
    {
        self.driver
            .registry()
            .set(name, Arc::new(json_handler(handler)))
    }

    /// 注册使用自定义解码器的 Handler
    ///
    /// `decoder` 把 payload 字符串解析成 `Args`，解析失败按 Handler 失败处理。
    pub fn set_decoded_handler<Args, D, F, Fut>(&self, name: &str, decoder: D, handler: F) -> Result<()>
    where
        D: PayloadDecoder<Args>,
        F: Fn(JobContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
        Args: Send + 'static,
    {
        self.driver
            .registry()
            .set(name, Arc::new(HandlerWrapper::new(handler, decoder)))
    }

    /// 注册一个实现了 `TaskHandler` 的结构体
    pub fn set_task_handler<H>(&self, name: &str, handler: H) -> Result<()>
    where
        H: TaskHandler,
    {
        self.driver.registry().set(name, Arc::new(handler))
    }

    /// 移除 Handler，返回之前是否存在
    ///
    /// 正在执行中的那一次不受影响。
    pub fn remove_handler(&self, name: &str) -> bool {
        self.driver.registry().remove(name)
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.driver.registry().contains(name)
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.driver.registry().names()
    }

    // ==========================================
    // 定时器与执行
    // ==========================================

    /// 开启失效通知监听，并立即重算一次定时器
    pub async fn enable_listener(&self) -> Result<DrainReport> {
        self.driver.enable_listener().await
    }

    /// 关闭失效通知监听，返回之前是否处于监听状态
    pub fn disable_listener(&self) -> bool {
        self.driver.disable_listener()
    }

    pub fn listener_enabled(&self) -> bool {
        self.driver.listener_enabled()
    }

    /// 重算定时器 (最早的任务已到期时会先执行)
    pub async fn recompute(&self) -> Result<DrainReport> {
        self.driver.recompute().await
    }

    /// 执行所有到期任务，然后重算定时器
    pub async fn run_tasks(&self) -> Result<DrainReport> {
        self.driver.run_tasks().await
    }

    pub fn timer_state(&self) -> TimerState {
        self.driver.timer_state()
    }

    /// 运行时统计快照
    pub fn stats(&self) -> SchedulerStats {
        let ctx = self.driver.context();
        let m = &ctx.metrics;
        SchedulerStats {
            node_id: ctx.node_id.clone(),
            registered_handlers: self.driver.registry().len(),
            listener_enabled: self.driver.listener_enabled(),
            timer_fires_at_ms: match self.driver.timer_state() {
                TimerState::Armed { fires_at_ms } => Some(fires_at_ms),
                TimerState::Idle | TimerState::Executing => None,
            },
            drains: DriverMetrics::get(&m.drains),
            timer_fires: DriverMetrics::get(&m.timer_fires),
            total_success: DriverMetrics::get(&m.total_success),
            total_failure: DriverMetrics::get(&m.total_failure),
            total_retries: DriverMetrics::get(&m.total_retries),
            total_exhausted: DriverMetrics::get(&m.total_exhausted),
            total_dropped: DriverMetrics::get(&m.total_dropped),
        }
    }

    /// 停机
    ///
    /// 关闭监听、撤防定时器，之后不会再布防。正在执行的 drain 会跑完。
    pub async fn shutdown(&self) {
        self.driver.shutdown().await;
    }
}
