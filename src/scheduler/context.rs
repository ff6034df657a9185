use chrono::{DateTime, Utc};

use crate::common::{TaskMember, TimeUtils};

/// 面向用户的任务上下文
///
/// 每次执行都会新建一份，Handler 拿到的是自己的副本。
#[derive(Debug, Clone)]
pub struct JobContext {
    handler: String,
    payload: String,
    retry_count: u32,
    due_time_ms: i64,
    node_id: String,
}

impl JobContext {
    pub(crate) fn new(member: &TaskMember, due_time_ms: i64, node_id: &str) -> Self {
        Self {
            handler: member.handler.clone(),
            payload: member.payload.clone(),
            retry_count: member.retry_count,
            due_time_ms,
            node_id: node_id.to_string(),
        }
    }

    /// Handler 名称
    pub fn name(&self) -> &str {
        &self.handler
    }

    /// 已失败次数 (首次执行为 0)
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// 第几次执行 (从 1 开始)
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    pub fn is_retry(&self) -> bool {
        self.retry_count > 0
    }

    /// 索引里记录的 due time (Unix 毫秒)
    pub fn due_time_ms(&self) -> i64 {
        self.due_time_ms
    }

    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        TimeUtils::millis_to_datetime(self.due_time_ms)
    }

    /// 执行本任务的节点
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// 后门：原始 payload 字符串
    pub fn raw_payload(&self) -> &str {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_counts_from_one() {
        let member = TaskMember::new("email", "hi").next_attempt().next_attempt();
        let ctx = JobContext::new(&member, 1_700_000_000_000, "node-a");
        assert_eq!(ctx.name(), "email");
        assert_eq!(ctx.retry_count(), 2);
        assert_eq!(ctx.attempt(), 3);
        assert!(ctx.is_retry());
        assert_eq!(ctx.raw_payload(), "hi");
        assert_eq!(ctx.due_at().map(|d| d.timestamp_millis()), Some(1_700_000_000_000));
    }
}
