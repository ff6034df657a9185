mod common;

use common::{counting_handler, scheduler_on};
use redis_scheduler::common::TimeUtils;
use redis_scheduler::persistence::DueIndex;
use redis_scheduler::{MemoryPersistence, SchedulerConfig, SchedulerError};
use serde::Serialize;

#[tokio::test]
async fn invalid_handler_names_are_rejected() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");

    for name in ["", "send:email", "RETRY-7"] {
        let err = scheduler
            .set_handler(name, |_ctx, _p| async { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidName(_)), "{name:?}");
    }
    assert!(scheduler.handler_names().is_empty());
}

#[tokio::test]
async fn schedule_requires_a_registered_handler() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");

    let err = scheduler.schedule("email", 0, "hello").await.unwrap_err();
    assert!(matches!(err, SchedulerError::UnknownHandler(ref n) if n == "email"));
    assert!(store.is_empty());

    let err = scheduler.cancel("email", "hello").await.unwrap_err();
    assert!(matches!(err, SchedulerError::UnknownHandler(_)));
}

#[tokio::test]
async fn rescheduling_identical_task_only_moves_due_time() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");
    counting_handler(&scheduler, "email");

    let later = TimeUtils::now_millis() + 60_000;
    scheduler.schedule("email", later, "hello").await.unwrap();
    scheduler.schedule("email", later + 5_000, "hello").await.unwrap();
    scheduler.schedule("email", later, "other").await.unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.score_of("email:hello"), Some(later + 5_000));
}

#[tokio::test]
async fn cancel_is_exact_and_idempotent() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");
    counting_handler(&scheduler, "email");

    let later = TimeUtils::now_millis() + 60_000;
    scheduler.schedule("email", later, "hello").await.unwrap();
    // 已经进入重试的成员不在 cancel 的范围内
    store.upsert("RETRY-1:email:hello", later).await.unwrap();

    assert!(scheduler.cancel("email", "hello").await.unwrap());
    assert!(!scheduler.cancel("email", "hello").await.unwrap());
    assert!(!scheduler.cancel("email", "never-scheduled").await.unwrap());
    assert_eq!(store.members(), vec!["RETRY-1:email:hello".to_string()]);
}

#[tokio::test]
async fn pending_lists_tasks_in_due_order_without_claiming() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");
    counting_handler(&scheduler, "report");

    let now = TimeUtils::now_millis();
    scheduler.schedule("report", now + 3_000, "c").await.unwrap();
    scheduler.schedule("report", now + 1_000, "a:with:colons").await.unwrap();
    scheduler.schedule("report", now + 2_000, "b").await.unwrap();
    store.upsert("not-a-member", now).await.unwrap();

    let pending = scheduler.pending(now + 2_500).await.unwrap();
    let payloads: Vec<_> = pending.iter().map(|t| t.payload.as_str()).collect();
    assert_eq!(payloads, vec!["a:with:colons", "b"]);
    assert_eq!(pending[0].due_time_ms, now + 1_000);
    assert_eq!(pending[0].retry_count, 0);
    assert_eq!(store.len(), 4);
}

#[derive(Serialize)]
struct Invoice {
    id: u32,
    customer: &'static str,
}

#[tokio::test]
async fn json_payloads_schedule_and_cancel() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");
    counting_handler(&scheduler, "invoice");

    let invoice = Invoice {
        id: 7,
        customer: "acme",
    };
    let later = TimeUtils::now_millis() + 60_000;
    scheduler.schedule_json("invoice", later, &invoice).await.unwrap();
    assert_eq!(
        store.members(),
        vec![r#"invoice:{"id":7,"customer":"acme"}"#.to_string()]
    );

    assert!(scheduler.cancel_json("invoice", &invoice).await.unwrap());
    assert!(store.is_empty());
}

#[tokio::test]
async fn store_outage_surfaces_to_callers() {
    let store = MemoryPersistence::new();
    let scheduler = scheduler_on(&store, SchedulerConfig::default(), "a");
    counting_handler(&scheduler, "email");

    store.set_offline(true);
    let err = scheduler.schedule("email", 0, "x").await.unwrap_err();
    assert!(err.is_store_unavailable());
    assert!(scheduler.run_tasks().await.unwrap_err().is_store_unavailable());
    assert!(scheduler.recompute().await.unwrap_err().is_store_unavailable());

    // 恢复后锁已经释放，可以正常工作
    store.set_offline(false);
    scheduler.schedule("email", 0, "x").await.unwrap();
    let report = scheduler.run_tasks().await.unwrap();
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn config_is_validated_by_builder() {
    let mut config = SchedulerConfig::default();
    config.namespace = String::new();
    let result = redis_scheduler::Scheduler::builder().with_config(config).build();
    assert!(matches!(result, Err(SchedulerError::Config(_))));
}
