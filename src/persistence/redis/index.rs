use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;

use super::core::{RedisPersistence, score_to_millis};
use crate::common::error::{Result, SchedulerError};
use crate::persistence::model::IndexEntry;
use crate::persistence::traits::DueIndex;

#[async_trait]
impl DueIndex for RedisPersistence {
    async fn upsert(&self, member: &str, score: i64) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let _: i64 = conn.zadd(&self.index_key, member, score).await?;
        Ok(())
    }

    async fn remove(&self, member: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let removed: i64 = conn.zrem(&self.index_key, member).await?;
        Ok(removed > 0)
    }

    async fn peek_earliest(&self) -> Result<Option<IndexEntry>> {
        let mut conn = self.pool.get().await?;
        let first: Vec<(String, f64)> = conn.zrange_withscores(&self.index_key, 0, 0).await?;
        Ok(first
            .into_iter()
            .next()
            .map(|(member, score)| IndexEntry::new(member, score_to_millis(score))))
    }

    async fn claim_due(&self, now: i64) -> Result<Vec<IndexEntry>> {
        let mut conn = self.pool.get().await?;

        // 调用 Lua 脚本 "claim_due"
        // KEYS[1]: index_zset
        // ARGV[1]: now
        let result: Vec<String> = self
            .scripts
            .claim_due
            .key(&self.index_key)
            .arg(now)
            .invoke_async(&mut conn)
            .await?;

        // Lua 返回的是 [member1, score1, member2, score2, ...] 的扁平数组
        let mut claimed = Vec::with_capacity(result.len() / 2);
        let mut iter = result.into_iter();
        while let Some(member) = iter.next() {
            let raw_score = iter.next().ok_or_else(|| {
                SchedulerError::StoreUnavailable("claim script returned an odd-length reply".into())
            })?;
            // 成员已经被删掉了，score 解析失败也要交给上层执行，按 now 处理
            let score = raw_score.parse::<f64>().map(score_to_millis).unwrap_or(now);
            claimed.push(IndexEntry::new(member, score));
        }
        Ok(claimed)
    }

    async fn range_by_score(&self, max: i64) -> Result<Vec<IndexEntry>> {
        let mut conn = self.pool.get().await?;
        let entries: Vec<(String, f64)> = conn
            .zrangebyscore_withscores(&self.index_key, "-inf", max)
            .await?;
        Ok(entries
            .into_iter()
            .map(|(member, score)| IndexEntry::new(member, score_to_millis(score)))
            .collect())
    }
}
