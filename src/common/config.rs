use serde::{Deserialize, Serialize};

use crate::common::error::{Result, SchedulerError};
use crate::common::utils::default_node_id;

// ==========================================
// 1. 重试配置 (RetryConfig)
// ==========================================

/// 重试退避方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// 固定延迟 (默认)
    ///
    /// 每次失败后都在 `now + retry_delay_ms` 重新入队。
    Fixed,
    /// 指数退避 + 抖动
    ///
    /// 以 `retry_delay_ms` 为基数翻倍，封顶 `max_retry_delay_ms`。
    Exponential,
}

/// 失败任务的重试策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 最大重试次数
    ///
    /// - 说明: 第一次执行之后最多再重试多少次。
    /// - 默认值: 3 (一个永远失败的任务总共会被执行 4 次)
    pub max_retries: u32,

    /// 重试延迟 (毫秒)
    ///
    /// - 默认值: 5000
    /// - 说明: 设为 0 时，重试任务会在同一轮 `run_tasks` 里被立即再次领取。
    pub retry_delay_ms: u64,

    /// 退避方式
    pub backoff: BackoffKind,

    /// 指数退避的封顶延迟 (毫秒)，仅 `Exponential` 有效
    /// - 默认值: 3,600,000 (1小时)
    pub max_retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 5000,
            backoff: BackoffKind::Fixed,
            max_retry_delay_ms: 3_600_000,
        }
    }
}

// ==========================================
// 2. 定时器配置 (TimerConfig)
// ==========================================

/// 进程内定时器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// 定时器最大视野 (毫秒)
    ///
    /// - 说明: 即使最早的任务在很远的将来，定时器也最多睡这么久就会重新查一次索引。
    /// - 默认值: 86,400,000 (24小时)
    /// - 影响: 这是丢失失效通知时的兜底。越短越快自愈，但空转查询越多。
    pub max_horizon_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            max_horizon_ms: 86_400_000,
        }
    }
}

// ==========================================
// 3. 存储配置 (StoreConfig)
// ==========================================

/// 共享存储相关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 失效通知的消息体
    ///
    /// - 默认值: "update"
    /// - 说明: 频道上收到的其它消息一律忽略。
    pub update_message: String,

    /// Redis 连接池大小
    ///
    /// - 默认值: 4 (调度核心是串行的，连接需求很小)
    #[cfg(feature = "distributed")]
    pub redis_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            update_message: "update".to_string(),
            #[cfg(feature = "distributed")]
            redis_pool_size: 4,
        }
    }
}

// ==========================================
// 4. 总配置入口 (SchedulerConfig)
// ==========================================

/// 调度器总配置
///
/// 使用分层结构组织配置项。支持 `serde` 序列化，可直接从 JSON 加载。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 命名空间
    ///
    /// 默认: "SchedulerUtil"
    /// - 有序集合 Key: `{namespace}.Tasks`
    /// - Pub/Sub 频道: `{namespace}`
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// 节点唯一标识
    ///
    /// - 说明: 只用于日志和 `JobContext`，不参与任何分布式互斥。
    /// - 默认值: `hostname-随机串`
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// 重试策略
    #[serde(default)]
    pub retry: RetryConfig,

    /// 定时器
    #[serde(default)]
    pub timer: TimerConfig,

    /// 存储与通知
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_namespace() -> String {
    "SchedulerUtil".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            node_id: default_node_id(),
            retry: RetryConfig::default(),
            timer: TimerConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// 从 JSON 字符串加载，缺省字段取默认值
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 快速创建一个测试环境配置
    ///
    /// 重试不等待，方便在一次 `run_tasks` 内走完整个重试链。
    pub fn new_dev() -> Self {
        let mut cfg = Self::default();
        cfg.retry.retry_delay_ms = 0;
        cfg
    }

    /// 有序集合 Key
    pub fn index_key(&self) -> String {
        format!("{}.Tasks", self.namespace)
    }

    /// 失效通知频道
    pub fn channel(&self) -> &str {
        &self.namespace
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(SchedulerError::Config("namespace must not be empty".into()));
        }
        if self.store.update_message.is_empty() {
            return Err(SchedulerError::Config(
                "update message must not be empty".into(),
            ));
        }
        if self.timer.max_horizon_ms == 0 {
            return Err(SchedulerError::Config(
                "timer horizon must be greater than zero".into(),
            ));
        }
        if self.retry.backoff == BackoffKind::Exponential
            && self.retry.max_retry_delay_ms < self.retry.retry_delay_ms
        {
            return Err(SchedulerError::Config(
                "max retry delay must not be smaller than the base retry delay".into(),
            ));
        }
        Ok(())
    }
}
