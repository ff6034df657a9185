use std::time::Duration;

use serde::Serialize;

use crate::{
    common::{Result, ScheduledTask, SchedulerError, TaskMember, TimeUtils},
    scheduler::Scheduler,
};

/// 提交与取消
impl Scheduler {
    fn ensure_registered(&self, name: &str) -> Result<()> {
        if self.driver.registry().contains(name) {
            Ok(())
        } else {
            Err(SchedulerError::UnknownHandler(name.to_string()))
        }
    }

    /// 在 `due_time_ms` (Unix 毫秒) 执行 `name(payload)`
    ///
    /// - Handler 必须已在本进程注册，否则返回 `UnknownHandler`，索引不会被修改。
    /// - 同名同 payload 的任务只会存在一份，再次调度只更新 due time。
    /// - 写入后通知所有实例重算定时器 (本实例正在 drain 时推迟到 drain 结束)。
    pub async fn schedule(&self, name: &str, due_time_ms: i64, payload: &str) -> Result<()> {
        self.ensure_registered(name)?;
        let member = TaskMember::new(name, payload).encode();
        self.driver.context().index.upsert(&member, due_time_ms).await?;
        self.driver.notify_changed().await
    }

    /// 在 `delay` 之后执行
    pub async fn schedule_in(&self, name: &str, delay: Duration, payload: &str) -> Result<()> {
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let due = TimeUtils::now_millis().saturating_add(delay_ms);
        self.schedule(name, due, payload).await
    }

    /// 以 JSON 序列化 `args` 作为 payload
    pub async fn schedule_json<T>(&self, name: &str, due_time_ms: i64, args: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(args)?;
        self.schedule(name, due_time_ms, &payload).await
    }

    /// 取消一个尚未执行的任务
    ///
    /// 只会删除首次调度的那个成员 (不带重试前缀)，已经进入重试的任务不受影响。
    /// 幂等；返回是否真的删除了一个成员。取消不会让最早的任务提前，因此不发通知。
    pub async fn cancel(&self, name: &str, payload: &str) -> Result<bool> {
        self.ensure_registered(name)?;
        let member = TaskMember::new(name, payload).encode();
        self.driver.context().index.remove(&member).await
    }

    /// `schedule_json` 的对应取消
    ///
    /// 序列化结果必须和调度时逐字节一致。
    pub async fn cancel_json<T>(&self, name: &str, args: &T) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(args)?;
        self.cancel(name, &payload).await
    }

    /// 列出 due time `<= until_ms` 的待执行任务 (不删除)
    ///
    /// 无法解码的成员被跳过。
    pub async fn pending(&self, until_ms: i64) -> Result<Vec<ScheduledTask>> {
        let entries = self.driver.context().index.range_by_score(until_ms).await?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                TaskMember::decode(&entry.member)
                    .ok()
                    .map(|member| ScheduledTask::new(member, entry.score))
            })
            .collect())
    }
}
