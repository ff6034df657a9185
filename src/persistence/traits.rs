use async_trait::async_trait;

use crate::common::error::Result;
use crate::persistence::model::{IndexEntry, Subscription};

// ==========================================
// 1. 到期索引接口 (DueIndex) - 调度的大脑
// ==========================================

/// 共享的有序索引
///
/// **职责**: 以 due time 为 score 保存所有待执行的任务成员。
/// **特点**:
/// - 所有实例共用同一份数据 (Redis ZSET 或进程内共享的内存结构)
/// - 成员唯一：同一个成员重复写入只会更新 score
/// - `claim_due` 是唯一的跨进程互斥手段，必须原子
#[async_trait]
pub trait DueIndex: Send + Sync + 'static {
    /// 写入或更新一个成员 (ZADD)
    async fn upsert(&self, member: &str, score: i64) -> Result<()>;

    /// 精确删除一个成员 (ZREM)
    ///
    /// # 返回值
    /// - `true`: 成员存在并已删除
    /// - `false`: 成员本来就不存在 (幂等)
    async fn remove(&self, member: &str) -> Result<bool>;

    /// 查看 score 最小的成员，不删除
    ///
    /// 定时器每次重算都会调用它，实现层不得缓存。
    async fn peek_earliest(&self) -> Result<Option<IndexEntry>>;

    /// 领取所有到期成员 (Claim)
    ///
    /// 原子地取出并删除所有 `score <= now` 的成员，按 score 升序返回。
    ///
    /// # 注意
    /// 多个实例同时调用时，每个成员只会出现在其中一个实例的返回值里。
    /// 领取之后的执行失败由重试机制负责，索引层不会自动复活。
    async fn claim_due(&self, now: i64) -> Result<Vec<IndexEntry>>;

    /// 按 score 范围查询 (ZRANGEBYSCORE -inf max)，不删除
    async fn range_by_score(&self, max: i64) -> Result<Vec<IndexEntry>>;
}

// ==========================================
// 2. 失效通知接口 (InvalidationChannel)
// ==========================================

/// 固定主题上的发布/订阅
///
/// 用来告诉所有实例："索引变了，重算你的定时器"。
/// 主题名由实现层从配置中得出 (默认 `SchedulerUtil`)。
#[async_trait]
pub trait InvalidationChannel: Send + Sync + 'static {
    /// 发布一条消息
    ///
    /// 没有订阅者时静默成功 (与 Redis PUBLISH 返回 0 一致)。
    async fn publish(&self, message: &str) -> Result<()>;

    /// 打开一个独立的订阅
    ///
    /// 方法返回时订阅已经生效，之后发布的消息都会被收到。
    async fn subscribe(&self) -> Result<Subscription>;
}
