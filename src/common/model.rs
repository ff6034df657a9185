use serde::{Deserialize, Serialize};

use crate::common::error::{Result, SchedulerError};

/// 成员分隔符
///
/// Handler 名称里不允许出现；Payload 是贪婪匹配的剩余部分，可以包含它。
pub const DELIMITER: char = ':';

/// 重试前缀
///
/// 与历史部署写入的格式保持一致: `RETRY-<n>:name:payload`。
pub const RETRY_PREFIX: &str = "RETRY-";

// ==========================================
// 1. 任务成员编解码 (TaskMember)
// ==========================================

/// 有序索引中的一个成员
///
/// 任务本身从不以对象形式保存，只以 "编码后的字符串 + due time score" 存在于共享索引里。
///
/// # 编码格式
/// - `retry_count == 0`: `name:payload`
/// - `retry_count  > 0`: `RETRY-<retry_count>:name:payload`
///
/// 索引是一个集合：`(name, payload, retry 前缀)` 完全相同的两个任务会合并成一个，
/// 第二次写入只会覆盖 score。`cancel` 正是依赖这种精确匹配。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMember {
    /// Handler 名称 (不含 `:`)
    pub handler: String,
    /// 调用方自定义的载荷，通常是 JSON
    pub payload: String,
    /// 已失败次数，首次调度为 0
    pub retry_count: u32,
}

impl TaskMember {
    /// 首次调度的成员 (retry_count = 0)
    pub fn new(handler: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            payload: payload.into(),
            retry_count: 0,
        }
    }

    /// 失败后下一次尝试对应的成员
    pub fn next_attempt(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            payload: self.payload.clone(),
            retry_count: self.retry_count + 1,
        }
    }

    /// 编码为索引成员字符串
    pub fn encode(&self) -> String {
        if self.retry_count > 0 {
            format!(
                "{RETRY_PREFIX}{}{DELIMITER}{}{DELIMITER}{}",
                self.retry_count, self.handler, self.payload
            )
        } else {
            format!("{}{DELIMITER}{}", self.handler, self.payload)
        }
    }

    /// 解析索引成员字符串
    ///
    /// 失败时返回 `MalformedMember`，调用方决定如何处置 (执行循环会丢弃它)。
    pub fn decode(raw: &str) -> Result<Self> {
        let malformed = || SchedulerError::MalformedMember(raw.to_string());

        let (head, rest) = raw.split_once(DELIMITER).ok_or_else(malformed)?;

        let (retry_count, handler, payload) = match retry_tag(head) {
            Some(digits) => {
                let retry_count = digits.parse::<u32>().map_err(|_| malformed())?;
                let (handler, payload) = rest.split_once(DELIMITER).ok_or_else(malformed)?;
                (retry_count, handler, payload)
            }
            None => (0, head, rest),
        };

        if handler.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            handler: handler.to_string(),
            payload: payload.to_string(),
            retry_count,
        })
    }
}

/// 如果 `segment` 形如 `RETRY-<数字>`，返回数字部分
fn retry_tag(segment: &str) -> Option<&str> {
    let digits = segment.strip_prefix(RETRY_PREFIX)?;
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

/// 校验 Handler 名称
///
/// - 不能为空
/// - 不能包含 `:`
/// - 不能形如 `RETRY-<数字>`，否则 `RETRY-1:x:y` 将无法判断是重试前缀还是名称
pub fn validate_handler_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(DELIMITER) || retry_tag(name).is_some() {
        return Err(SchedulerError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ==========================================
// 2. 查询视图 (ScheduledTask)
// ==========================================

/// 索引中一个待执行任务的只读视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub handler: String,
    pub payload: String,
    pub retry_count: u32,
    /// 到期时间 (Unix 毫秒)
    pub due_time_ms: i64,
}

impl ScheduledTask {
    pub fn new(member: TaskMember, due_time_ms: i64) -> Self {
        Self {
            handler: member.handler,
            payload: member.payload,
            retry_count: member.retry_count,
            due_time_ms,
        }
    }
}

// ==========================================
// 3. 执行报告与统计 (DrainReport / SchedulerStats)
// ==========================================

/// 一次 `run_tasks` / `recompute` 调用的执行报告
///
/// 覆盖该调用内触发的所有 drain (重试延迟为 0 时可能连续好几轮)。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// 实际执行的 drain 轮数 (拿不到锁的不算)
    pub drains: u32,
    /// 从索引领取 (并删除) 的成员数
    pub claimed: usize,
    /// 执行成功
    pub succeeded: usize,
    /// 执行失败 (含 Panic)
    pub failed: usize,
    /// 失败后重新入队
    pub retried: usize,
    /// 重试耗尽，永久丢弃
    pub exhausted: usize,
    /// 无法执行而丢弃 (未注册 Handler 或成员格式损坏)
    pub dropped: usize,
}

impl DrainReport {
    /// 合并另一轮的计数
    pub fn merge(&mut self, other: DrainReport) {
        self.drains += other.drains;
        self.claimed += other.claimed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.retried += other.retried;
        self.exhausted += other.exhausted;
        self.dropped += other.dropped;
    }
}

/// 调度器运行时统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// 节点 ID
    pub node_id: String,
    /// 当前注册的 Handler 数
    pub registered_handlers: usize,
    /// 是否在监听失效通知
    pub listener_enabled: bool,
    /// 当前定时器的触发时间 (Unix 毫秒)，未布防为 None
    pub timer_fires_at_ms: Option<i64>,
    /// 累计 drain 轮数
    pub drains: u64,
    /// 累计定时器触发次数
    pub timer_fires: u64,
    /// 累计成功
    pub total_success: u64,
    /// 累计失败
    pub total_failure: u64,
    /// 累计重试入队
    pub total_retries: u64,
    /// 累计重试耗尽
    pub total_exhausted: u64,
    /// 累计丢弃
    pub total_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_has_no_prefix() {
        assert_eq!(TaskMember::new("email", "hello").encode(), "email:hello");
    }

    #[test]
    fn retry_prefix_is_written_after_failure() {
        let member = TaskMember::new("email", "hello").next_attempt();
        assert_eq!(member.encode(), "RETRY-1:email:hello");
        assert_eq!(member.next_attempt().encode(), "RETRY-2:email:hello");
    }

    #[test]
    fn payload_may_contain_delimiter() {
        let raw = r#"RETRY-12:webhook:{"url":"http://x:8080/a"}"#;
        let member = TaskMember::decode(raw).unwrap();
        assert_eq!(member.retry_count, 12);
        assert_eq!(member.handler, "webhook");
        assert_eq!(member.payload, r#"{"url":"http://x:8080/a"}"#);
        assert_eq!(member.encode(), raw);
    }

    #[test]
    fn plain_member_with_colons_in_payload() {
        let member = TaskMember::decode("report:2024:01:31").unwrap();
        assert_eq!(member.retry_count, 0);
        assert_eq!(member.handler, "report");
        assert_eq!(member.payload, "2024:01:31");
    }

    #[test]
    fn empty_payload_is_allowed() {
        let member = TaskMember::decode("tick:").unwrap();
        assert_eq!(member.handler, "tick");
        assert_eq!(member.payload, "");
    }

    #[test]
    fn handler_merely_starting_with_retry_is_a_name() {
        let member = TaskMember::decode("RETRY-later:payload").unwrap();
        assert_eq!(member.retry_count, 0);
        assert_eq!(member.handler, "RETRY-later");
    }

    #[test]
    fn malformed_members_are_reported() {
        for raw in ["no-delimiter", ":payload", "RETRY-3:only-name", "RETRY-3::x"] {
            assert!(
                matches!(TaskMember::decode(raw), Err(SchedulerError::MalformedMember(_))),
                "{raw} should be rejected"
            );
        }
        // u32 溢出
        assert!(TaskMember::decode("RETRY-99999999999:a:b").is_err());
    }

    #[test]
    fn handler_names_are_validated() {
        assert!(validate_handler_name("send-email").is_ok());
        assert!(validate_handler_name("RETRY-later").is_ok());
        assert!(validate_handler_name("").is_err());
        assert!(validate_handler_name("invalid:name").is_err());
        assert!(validate_handler_name("RETRY-1").is_err());
    }

    #[test]
    fn reports_merge_counts() {
        let mut total = DrainReport {
            drains: 1,
            claimed: 2,
            succeeded: 1,
            failed: 1,
            retried: 1,
            ..Default::default()
        };
        total.merge(DrainReport {
            drains: 1,
            claimed: 1,
            failed: 1,
            exhausted: 1,
            ..Default::default()
        });
        assert_eq!(total.drains, 2);
        assert_eq!(total.claimed, 3);
        assert_eq!(total.failed, 2);
        assert_eq!(total.exhausted, 1);
    }
}
