use parking_lot::Mutex;
use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::broadcast;

use crate::common::error::{Result, SchedulerError};

/// 失效主题的缓冲区大小
///
/// 订阅者落后超过这个数量会收到 `Resubscribed`，不会丢掉重算。
const TOPIC_CAPACITY: usize = 256;

/// 有序索引的内部状态
///
/// 两个结构必须在同一把锁下修改，`claim_due` 才是原子的。
#[derive(Debug, Default)]
pub(super) struct IndexState {
    /// 成员 -> score (保证成员唯一)
    pub(super) scores: HashMap<String, i64>,
    /// (score, 成员) 有序集合，同分时按成员字典序 (与 Redis ZSET 一致)
    pub(super) ordered: BTreeSet<(i64, String)>,
}

/// 内存持久化实现 (In-Memory Persistence)
///
/// 同时实现了 `DueIndex` 和 `InvalidationChannel`。
///
/// - Clone 是廉价的 (内部都是 Arc)，所有 Clone 共享同一份索引和主题。
/// - 用多个 Clone 分别构建多个 `Scheduler`，就能在一个进程里模拟多个共享存储的实例。
#[derive(Debug, Clone)]
pub struct MemoryPersistence {
    /// 【到期索引】
    pub(super) index: Arc<Mutex<IndexState>>,

    /// 【失效主题】
    pub(super) topic: broadcast::Sender<String>,

    /// 模拟存储宕机
    pub(super) offline: Arc<AtomicBool>,
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPersistence {
    /// 创建一个新的内存持久化实例
    pub fn new() -> Self {
        let (topic, _) = broadcast::channel(TOPIC_CAPACITY);
        Self {
            index: Arc::new(Mutex::new(IndexState::default())),
            topic,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 模拟存储不可用
    ///
    /// 打开后所有索引和发布/订阅操作都返回 `StoreUnavailable`，直到再次关闭。
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// 当前索引中的成员数
    pub fn len(&self) -> usize {
        self.index.lock().scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 查询某个成员的 score (测试与排查用)
    pub fn score_of(&self, member: &str) -> Option<i64> {
        self.index.lock().scores.get(member).copied()
    }

    /// 按 score 升序列出全部成员
    pub fn members(&self) -> Vec<String> {
        self.index
            .lock()
            .ordered
            .iter()
            .map(|(_, member)| member.clone())
            .collect()
    }

    /// 清空索引
    pub fn clear(&self) {
        let mut state = self.index.lock();
        state.scores.clear();
        state.ordered.clear();
    }

    pub(super) fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SchedulerError::StoreUnavailable(
                "in-memory store is offline".into(),
            ));
        }
        Ok(())
    }
}
