use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    common::SchedulerConfig,
    driver::{DriverContext, DriverMetrics, DriverPlugin, TaskDriver, plugins::MetricsPlugin},
    persistence::{DueIndex, InvalidationChannel, memory::MemoryPersistence},
    policy::{self, RetryPolicy},
    scheduler::HandlerRegistry,
};

/// 任务驱动构造器 (Builder Pattern)
pub struct TaskDriverBuilder {
    /// 节点ID名
    node_id: Option<String>,
    /// 全局配置
    config: Option<SchedulerConfig>,
    /// 重试策略
    retry_policy: Option<Box<dyn RetryPolicy>>,
    /// 插件列表
    plugins: Vec<Box<dyn DriverPlugin>>,
    /// 持久化 - 到期索引 (Option 用于处理默认值逻辑)
    index: Option<Arc<dyn DueIndex>>,
    /// 持久化 - 失效通知
    channel: Option<Arc<dyn InvalidationChannel>>,
    /// 全局统计指标
    metrics: Arc<DriverMetrics>,

    shutdown: Option<CancellationToken>,
}

impl Default for TaskDriverBuilder {
    /// 创建一个新的构造器
    ///
    /// **默认行为**:
    /// - Config: Default
    /// - RetryPolicy: 按 `config.retry` 生成 (默认固定延迟 5s，最多 3 次)
    /// - Persistence: None (默认初始化为 MemoryPersistence)
    /// - Metrics: 0 (全新计数器)
    fn default() -> Self {
        Self {
            node_id: None,
            config: None,
            retry_policy: None,
            plugins: Vec::new(),
            index: None,
            channel: None,
            shutdown: None,
            metrics: Arc::new(DriverMetrics::default()),
        }
    }
}

impl TaskDriverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置节点 ID (如果不设，使用配置里的 node_id)
    pub fn with_node_id(mut self, id: impl Into<String>) -> Self {
        self.node_id = Some(id.into());
        self
    }

    /// 设置调度器配置
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 设置重试策略 (覆盖 `config.retry`)
    pub fn with_retry_policy<R>(mut self, policy: R) -> Self
    where
        R: RetryPolicy,
    {
        self.retry_policy = Some(Box::new(policy));
        self
    }

    /// 添加插件 (支持链式调用)
    ///
    /// **注意**: 插件的执行顺序与添加顺序一致 (FIFO)。
    pub fn with_plugin<PL>(mut self, plugin: PL) -> Self
    where
        PL: DriverPlugin,
    {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// 设置持久化层
    ///
    /// - 这里接收一个同时实现了 `DueIndex + InvalidationChannel` 的具体类型 `P`。
    /// - 然后将其包装为 `Arc` 并分别强转为两个 trait object。
    pub fn with_persistence<P>(mut self, persistence: P) -> Self
    where
        P: DueIndex + InvalidationChannel,
    {
        let arc = Arc::new(persistence);
        self.index = Some(arc.clone()); // 引用计数 +1，转换为 dyn DueIndex
        self.channel = Some(arc); // 引用计数 +1，转换为 dyn InvalidationChannel
        self
    }

    /// 单独设置到期索引
    pub fn with_index<I>(mut self, index: I) -> Self
    where
        I: DueIndex,
    {
        self.index = Some(Arc::new(index));
        self
    }

    /// 单独设置失效通知
    pub fn with_channel<C>(mut self, channel: C) -> Self
    where
        C: InvalidationChannel,
    {
        self.channel = Some(Arc::new(channel));
        self
    }

    /// 注入外部停机信号 (多组件协同)
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// 构建驱动器
    ///
    /// 索引和通知必须成对提供；只给了一个时，缺的那个会回落到一份新的 MemoryPersistence。
    pub fn build(mut self, registry: Arc<HandlerRegistry>) -> TaskDriver {
        let mut config = self.config.unwrap_or_default();
        if let Some(node_id) = self.node_id {
            config.node_id = node_id;
        }
        let node_id = config.node_id.clone();

        // 处理持久化层的默认逻辑
        let (index, channel) = match (self.index, self.channel) {
            (Some(i), Some(c)) => (i, c),
            (index, channel) => {
                debug!("[Driver] Build using default MemoryPersistence");
                let mem = Arc::new(MemoryPersistence::new());
                (
                    index.unwrap_or_else(|| mem.clone() as Arc<dyn DueIndex>),
                    channel.unwrap_or_else(|| mem as Arc<dyn InvalidationChannel>),
                )
            }
        };

        let retry_policy = self
            .retry_policy
            .unwrap_or_else(|| policy::from_config(&config.retry));

        // 自动注入 MetricsPlugin
        let metrics_plugin = Box::new(MetricsPlugin::new(self.metrics.clone()));
        self.plugins.insert(0, metrics_plugin);

        // 初始化全局停机 Token
        let token = self.shutdown.unwrap_or_default();

        // 创建上下文
        let ctx = DriverContext::new(node_id, index, channel, config, self.metrics, token);
        // 组装最终的 Driver
        TaskDriver::new_with_components(ctx, registry, self.plugins, retry_policy)
    }
}
