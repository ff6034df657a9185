use async_trait::async_trait;

use super::MemoryPersistence;
use crate::common::error::Result;
use crate::persistence::model::IndexEntry;
use crate::persistence::traits::DueIndex;

#[async_trait]
impl DueIndex for MemoryPersistence {
    async fn upsert(&self, member: &str, score: i64) -> Result<()> {
        self.ensure_online()?;
        let mut state = self.index.lock();
        // 已存在则只更新 score
        if let Some(old) = state.scores.insert(member.to_string(), score) {
            state.ordered.remove(&(old, member.to_string()));
        }
        state.ordered.insert((score, member.to_string()));
        Ok(())
    }

    async fn remove(&self, member: &str) -> Result<bool> {
        self.ensure_online()?;
        let mut state = self.index.lock();
        match state.scores.remove(member) {
            Some(score) => {
                state.ordered.remove(&(score, member.to_string()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn peek_earliest(&self) -> Result<Option<IndexEntry>> {
        self.ensure_online()?;
        let state = self.index.lock();
        Ok(state
            .ordered
            .first()
            .map(|(score, member)| IndexEntry::new(member.clone(), *score)))
    }

    async fn claim_due(&self, now: i64) -> Result<Vec<IndexEntry>> {
        self.ensure_online()?;
        let mut claimed = Vec::new();
        // 必须在锁内取出并移除，防止被别的实例重复领取
        let mut state = self.index.lock();
        while state.ordered.first().is_some_and(|(score, _)| *score <= now) {
            if let Some((score, member)) = state.ordered.pop_first() {
                state.scores.remove(&member);
                claimed.push(IndexEntry::new(member, score));
            }
        }
        Ok(claimed)
    }

    async fn range_by_score(&self, max: i64) -> Result<Vec<IndexEntry>> {
        self.ensure_online()?;
        let state = self.index.lock();
        Ok(state
            .ordered
            .iter()
            .take_while(|(score, _)| *score <= max)
            .map(|(score, member)| IndexEntry::new(member.clone(), *score))
            .collect())
    }
}
