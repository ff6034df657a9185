use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    common::SchedulerError,
    driver::{DriverMetrics, DriverPlugin, DropReason},
    scheduler::JobContext,
};

/// 指标插件
///
/// Builder 会自动把它装在插件链的第一位。
pub struct MetricsPlugin {
    metrics: Arc<DriverMetrics>,
}

impl MetricsPlugin {
    pub fn new(metrics: Arc<DriverMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl DriverPlugin for MetricsPlugin {
    async fn before_execute(&self, _job: &JobContext) {
        self.metrics.inc_active();
    }
    // 无论成败 active -1
    async fn after_execute(&self, _job: &JobContext, _duration: Duration) {
        self.metrics.dec_active();
    }
    async fn on_success(&self, _job: &JobContext) {
        self.metrics.inc_success();
    }
    async fn on_failure(&self, _job: &JobContext, _error: &SchedulerError) {
        self.metrics.inc_failure();
    }
    async fn on_retry(&self, _job: &JobContext, _next_due_ms: i64) {
        self.metrics.inc_retries();
    }
    async fn on_exhausted(&self, _job: &JobContext) {
        self.metrics.inc_exhausted();
    }
    async fn on_dropped(&self, _member: &str, _reason: DropReason) {
        self.metrics.inc_dropped();
    }
}
