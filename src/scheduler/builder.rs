use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    common::{Result, SchedulerConfig},
    driver::{DriverPlugin, TaskDriverBuilder},
    persistence::{DueIndex, InvalidationChannel},
    policy::RetryPolicy,
    scheduler::{HandlerRegistry, Scheduler},
};

/// Scheduler 构建器
///
/// 用于一步步配置并生成 Scheduler 实例。
/// 不设置持久化层时使用一份全新的 `MemoryPersistence` (只在单进程内有意义)。
#[derive(Default)]
pub struct SchedulerBuilder {
    /// 选填: 全局配置 (默认 `SchedulerConfig::default()`)
    config: Option<SchedulerConfig>,
    /// 内部构造器，负责组件组装
    driver: TaskDriverBuilder,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置全局配置
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// [可选] 设置节点 ID
    /// 用于日志追踪。如果不填，使用配置中的 `hostname-随机串`。
    pub fn node_id(mut self, id: impl Into<String>) -> Self {
        self.driver = self.driver.with_node_id(id);
        self
    }

    /// 设置持久化层 (同时提供索引和通知)
    ///
    /// 例如 `RedisPersistence`，或者一个 `MemoryPersistence` 的 Clone。
    pub fn with_persistence<P>(mut self, persistence: P) -> Self
    where
        P: DueIndex + InvalidationChannel,
    {
        self.driver = self.driver.with_persistence(persistence);
        self
    }

    pub fn with_index<I: DueIndex>(mut self, index: I) -> Self {
        self.driver = self.driver.with_index(index);
        self
    }

    pub fn with_channel<C: InvalidationChannel>(mut self, channel: C) -> Self {
        self.driver = self.driver.with_channel(channel);
        self
    }

    /// [可选] 注入自定义插件
    /// 例如：报警、重试耗尽后的补偿记录
    pub fn with_plugin<PL: DriverPlugin>(mut self, plugin: PL) -> Self {
        self.driver = self.driver.with_plugin(plugin);
        self
    }

    /// [可选] 自定义重试策略，覆盖 `config.retry`
    pub fn with_retry_policy<R: RetryPolicy>(mut self, policy: R) -> Self {
        self.driver = self.driver.with_retry_policy(policy);
        self
    }

    /// [可选] 外部停机信号
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.driver = self.driver.with_shutdown(token);
        self
    }

    /// [核心] 构建 Scheduler
    ///
    /// 这里完成了所有组件的组装工作：
    /// Config + Persistence -> Context -> Driver -> Scheduler
    ///
    /// 构建不会订阅通道，需要时显式调用 `enable_listener`。
    pub fn build(self) -> Result<Scheduler> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let registry = Arc::new(HandlerRegistry::new());
        let driver = self.driver.with_config(config).build(registry);

        Ok(Scheduler { driver })
    }
}
