#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use redis_scheduler::{MemoryPersistence, Scheduler, SchedulerConfig};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 构建一个挂在共享内存存储上的调度器
pub fn scheduler_on(store: &MemoryPersistence, config: SchedulerConfig, node: &str) -> Scheduler {
    init_tracing();
    Scheduler::builder()
        .with_config(config)
        .with_persistence(store.clone())
        .node_id(node)
        .build()
        .expect("valid config")
}

/// 注册一个只计数的 Handler
pub fn counting_handler(scheduler: &Scheduler, name: &str) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    scheduler
        .set_handler(name, move |_ctx, _payload| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .expect("valid handler name");
    hits
}

/// 注册一个永远失败的 Handler
pub fn failing_handler(scheduler: &Scheduler, name: &str) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    scheduler
        .set_handler(name, move |_ctx, payload| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("refusing {payload}")
            }
        })
        .expect("valid handler name");
    hits
}

/// 轮询直到条件成立或超时
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

pub fn hits(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
