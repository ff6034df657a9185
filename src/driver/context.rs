use crate::{
    common::config::SchedulerConfig,
    driver::DriverMetrics,
    persistence::{DueIndex, InvalidationChannel},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 驱动器上下文 (Driver Context)
///
/// **职责**:
/// 每个调度器实例独享一份，打包了 Driver 运行所需的全部资源。
/// 进程内没有任何全局状态，一个进程里可以同时存在多个互不干扰的调度器。
#[derive(Clone)]
pub struct DriverContext {
    // --- 身份标识 (Identity) ---
    /// 当前节点的 ID
    ///
    /// 只用于日志和 `JobContext`，跨进程互斥完全依赖 `claim_due` 的原子性。
    pub node_id: String,

    // --- 核心组件 (Components) ---
    /// 共享到期索引 (负责 Upsert, Remove, Peek, Claim)
    pub index: Arc<dyn DueIndex>,

    /// 失效通知 (负责 Publish, Subscribe)
    pub channel: Arc<dyn InvalidationChannel>,

    /// 全局配置
    pub config: Arc<SchedulerConfig>,

    /// 全局统计指标
    pub metrics: Arc<DriverMetrics>,

    // --- 信号与控制 (Signals & Control) ---
    /// 关机信号
    pub shutdown: CancellationToken,
}

impl DriverContext {
    /// 创建一个新的驱动器上下文
    pub fn new(
        node_id: String,
        index: Arc<dyn DueIndex>,
        channel: Arc<dyn InvalidationChannel>,
        config: SchedulerConfig,
        metrics: Arc<DriverMetrics>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            node_id,
            index,
            channel,
            config: Arc::new(config),
            metrics,
            shutdown,
        }
    }

    /// 检查是否收到停机信号
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// 失效通知的消息体
    pub fn update_message(&self) -> &str {
        &self.config.store.update_message
    }
}
