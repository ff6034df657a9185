use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::trace;

/// 定时器状态 (对外可见)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TimerState {
    /// 没有布防的定时器，索引为空或者还没重算过
    Idle,
    /// 已布防，将在 `fires_at_ms` 触发
    Armed { fires_at_ms: i64 },
    /// 正持有 drain 锁执行任务
    Executing,
}

/// 一个已布防的定时器
struct ArmedTimer {
    /// 布防代号，用于判断触发的是不是 "当前" 这个定时器
    generation: u64,
    fires_at_ms: i64,
    handle: JoinHandle<()>,
}

/// 任务起搏器
///
/// 核心职责：保证每个实例在任意时刻最多只有一个布防的定时器。
///
/// - `arm` 会先中止旧的定时器，再布防新的。
/// - 定时器触发后必须先调用 `release(generation)` 让出槽位，之后再去执行任务。
///   这样执行期间的重算只会覆盖槽位，不会中止正在执行的那个协程。
pub struct TaskPacemaker {
    slot: Mutex<Option<ArmedTimer>>,
    generation: AtomicU64,
}

impl Default for TaskPacemaker {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskPacemaker {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// 布防定时器
    ///
    /// # 参数
    /// - `fires_at_ms`: 预计触发时间 (仅用于展示)
    /// - `delay`: 实际睡眠时长
    /// - `on_fire`: 触发回调，参数是本次布防的 generation
    pub fn arm<F, Fut>(&self, fires_at_ms: i64, delay: Duration, on_fire: F)
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.take() {
            previous.handle.abort();
        }

        // 在锁内 spawn 并写入槽位，触发的协程 release 时一定能看到自己
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(generation).await;
        });

        trace!(
            "[Pacemaker] Armed #{} to fire at {} (in {:?})",
            generation, fires_at_ms, delay
        );
        *slot = Some(ArmedTimer {
            generation,
            fires_at_ms,
            handle,
        });
    }

    /// 定时器触发后让出槽位
    ///
    /// # 返回值
    /// - `true`: 槽位里确实是自己，已清空
    /// - `false`: 已经被新的布防取代，调用方应该直接退出
    pub fn release(&self, generation: u64) -> bool {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(timer) if timer.generation == generation => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// 撤防 (中止当前定时器)
    pub fn disarm(&self) {
        if let Some(previous) = self.slot.lock().take() {
            trace!("[Pacemaker] Disarmed #{}", previous.generation);
            previous.handle.abort();
        }
    }

    /// 当前定时器的触发时间
    pub fn fires_at(&self) -> Option<i64> {
        self.slot.lock().as_ref().map(|timer| timer.fires_at_ms)
    }

    pub fn is_armed(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl Drop for TaskPacemaker {
    fn drop(&mut self) {
        if let Some(previous) = self.slot.get_mut().take() {
            previous.handle.abort();
        }
    }
}
