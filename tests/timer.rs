mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{counting_handler, failing_handler, hits, init_tracing, scheduler_on, wait_until};
use redis_scheduler::common::TimeUtils;
use redis_scheduler::persistence::{DueIndex, IndexEntry};
use redis_scheduler::{MemoryPersistence, Scheduler, SchedulerConfig, TimerState};

/// 读完索引后再拖延一段时间才返回的索引，模拟慢查询
#[derive(Clone)]
struct LaggingIndex {
    inner: MemoryPersistence,
    lag_next_peek: Arc<AtomicBool>,
}

#[async_trait]
impl DueIndex for LaggingIndex {
    async fn upsert(&self, member: &str, score: i64) -> redis_scheduler::Result<()> {
        self.inner.upsert(member, score).await
    }

    async fn remove(&self, member: &str) -> redis_scheduler::Result<bool> {
        self.inner.remove(member).await
    }

    async fn peek_earliest(&self) -> redis_scheduler::Result<Option<IndexEntry>> {
        let entry = self.inner.peek_earliest().await?;
        if self.lag_next_peek.swap(false, Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(entry)
    }

    async fn claim_due(&self, now: i64) -> redis_scheduler::Result<Vec<IndexEntry>> {
        self.inner.claim_due(now).await
    }

    async fn range_by_score(&self, max: i64) -> redis_scheduler::Result<Vec<IndexEntry>> {
        self.inner.range_by_score(max).await
    }
}

#[tokio::test]
async fn empty_index_leaves_timer_idle() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");
    counting_handler(&scheduler, "email");

    scheduler.recompute().await.unwrap();
    assert_eq!(scheduler.timer_state(), TimerState::Idle);

    scheduler
        .schedule("email", TimeUtils::now_millis() + 60_000, "x")
        .await
        .unwrap();
    scheduler.recompute().await.unwrap();
    assert!(matches!(scheduler.timer_state(), TimerState::Armed { .. }));

    scheduler.cancel("email", "x").await.unwrap();
    scheduler.recompute().await.unwrap();
    assert_eq!(scheduler.timer_state(), TimerState::Idle);
}

#[tokio::test]
async fn timer_is_capped_at_the_horizon() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");
    counting_handler(&scheduler, "report");

    let now = TimeUtils::now_millis();
    scheduler
        .schedule("report", now + 2 * 86_400_000, "monthly")
        .await
        .unwrap();
    scheduler.recompute().await.unwrap();

    let TimerState::Armed { fires_at_ms } = scheduler.timer_state() else {
        panic!("timer should be armed");
    };
    let after = TimeUtils::now_millis();
    assert!(fires_at_ms >= now + 86_400_000);
    assert!(fires_at_ms <= after + 86_400_000);
    assert_eq!(scheduler.stats().timer_fires_at_ms, Some(fires_at_ms));
}

#[tokio::test]
async fn recompute_follows_the_earliest_task() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");
    counting_handler(&scheduler, "email");

    let now = TimeUtils::now_millis();
    scheduler.schedule("email", now + 60_000, "late").await.unwrap();
    scheduler.recompute().await.unwrap();
    scheduler.schedule("email", now + 30_000, "early").await.unwrap();
    scheduler.recompute().await.unwrap();

    assert_eq!(
        scheduler.timer_state(),
        TimerState::Armed {
            fires_at_ms: now + 30_000
        }
    );
}

#[tokio::test]
async fn armed_timer_fires_and_executes() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");
    let sent = counting_handler(&scheduler, "email");

    scheduler
        .schedule("email", TimeUtils::now_millis() + 100, "soon")
        .await
        .unwrap();
    scheduler.recompute().await.unwrap();
    assert_eq!(hits(&sent), 0);

    assert!(wait_until(Duration::from_secs(2), || hits(&sent) == 1).await);
    assert!(store.is_empty());
    assert!(wait_until(Duration::from_millis(500), || scheduler.timer_state() == TimerState::Idle).await);
    assert_eq!(scheduler.stats().timer_fires, 1);
}

#[tokio::test]
async fn timer_drives_delayed_retries() {
    let store = MemoryPersistence::new();
    let mut config = SchedulerConfig::default();
    config.retry.max_retries = 2;
    config.retry.retry_delay_ms = 50;
    let scheduler = scheduler_on(&store, config, "a");
    let calls = failing_handler(&scheduler, "flaky");

    scheduler.schedule("flaky", 0, "p").await.unwrap();
    let report = scheduler.recompute().await.unwrap();
    assert_eq!(report.failed, 1);

    assert!(wait_until(Duration::from_secs(2), || hits(&calls) == 3).await);
    assert!(wait_until(Duration::from_millis(500), || store.is_empty()).await);
    assert_eq!(scheduler.stats().total_exhausted, 1);
}

#[tokio::test]
async fn shutdown_disarms_and_stops_arming() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");
    let sent = counting_handler(&scheduler, "email");

    scheduler
        .schedule("email", TimeUtils::now_millis() + 100, "x")
        .await
        .unwrap();
    scheduler.enable_listener().await.unwrap();
    assert!(matches!(scheduler.timer_state(), TimerState::Armed { .. }));

    scheduler.shutdown().await;
    assert_eq!(scheduler.timer_state(), TimerState::Idle);
    assert!(!scheduler.listener_enabled());

    scheduler.recompute().await.unwrap();
    assert_eq!(scheduler.timer_state(), TimerState::Idle);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(hits(&sent), 0);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn slow_recompute_cannot_override_a_newer_timer() {
    init_tracing();
    let store = MemoryPersistence::new();
    let lag = Arc::new(AtomicBool::new(false));
    let scheduler = Scheduler::builder()
        .with_index(LaggingIndex {
            inner: store.clone(),
            lag_next_peek: lag.clone(),
        })
        .with_channel(store.clone())
        .node_id("a")
        .build()
        .unwrap();
    let sent = counting_handler(&scheduler, "job");

    let now = TimeUtils::now_millis();
    scheduler.schedule("job", now + 60_000, "far").await.unwrap();

    // 这次重算读到的只有 far
    lag.store(true, Ordering::SeqCst);
    let slow = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.recompute().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let near = now + 400;
    scheduler.schedule("job", near, "near").await.unwrap();
    scheduler.recompute().await.unwrap();
    slow.await.unwrap().unwrap();

    assert_eq!(
        scheduler.timer_state(),
        TimerState::Armed { fires_at_ms: near }
    );
    assert!(wait_until(Duration::from_secs(2), || hits(&sent) == 1).await);
    assert_eq!(store.len(), 1);
}
