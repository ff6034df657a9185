use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// 驱动器核心指标
// 使用 Atomic 保证并发下的计数性能
#[derive(Debug, Default, Serialize)]
pub struct DriverMetrics {
    // --- 瞬时状态 (Gauges) ---
    /// 当前正在执行的 Handler 数 (drain 是串行的，只会是 0 或 1)
    pub active_tasks: AtomicUsize,

    // --- 累积计数 (Counters) ---
    /// 实际执行的 drain 轮数
    pub drains: AtomicU64,

    /// 定时器触发次数
    pub timer_fires: AtomicU64,

    /// 历史总成功任务数
    pub total_success: AtomicU64,

    /// 历史总失败任务数 (含 Panic)
    pub total_failure: AtomicU64,

    /// 历史总重试入队数
    pub total_retries: AtomicU64,

    /// 重试耗尽被丢弃的任务数
    pub total_exhausted: AtomicU64,

    /// 无法执行被丢弃的成员数
    pub total_dropped: AtomicU64,
}

impl DriverMetrics {
    /// 增加活跃数 (开始做任务)
    pub fn inc_active(&self) {
        self.active_tasks.fetch_add(1, Ordering::Relaxed);
    }

    /// 减少活跃数 (任务结束)
    pub fn dec_active(&self) {
        self.active_tasks.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn inc_drains(&self) {
        self.drains.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_timer_fires(&self) {
        self.timer_fires.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录成功
    pub fn inc_success(&self) {
        self.total_success.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录失败
    pub fn inc_failure(&self) {
        self.total_failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retries(&self) {
        self.total_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_exhausted(&self) {
        self.total_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.total_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// 读取一个计数器
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
