use super::scripts::Scripts;
use crate::common::config::SchedulerConfig;
use crate::common::error::{Result, SchedulerError};
use deadpool_redis::{Config, Pool, Runtime, redis};
use redis as redis_driver;
use std::sync::Arc;

/// Redis 持久化实现
///
/// 包含 Redis 客户端连接池和预编译的 Lua 脚本。
/// - 到期索引: 一个 ZSET，成员是编码后的任务，score 是 due time (毫秒)
/// - 失效通知: 一个 Pub/Sub 频道
#[derive(Debug, Clone)]
pub struct RedisPersistence {
    /// Redis 客户端 (订阅需要独占连接，不走连接池)
    pub(super) client: redis_driver::Client,
    /// Redis 客户端 连接池
    pub(super) pool: Pool,

    /// Lua 脚本库
    pub(super) scripts: Arc<Scripts>,

    /// 有序集合 Key
    /// e.g. "SchedulerUtil" -> "SchedulerUtil.Tasks"
    pub(super) index_key: String,

    /// Pub/Sub 频道
    pub(super) channel: String,
}

impl RedisPersistence {
    /// 创建新实例
    ///
    /// 只建立连接池，不会立即连接 Redis，第一次操作时才会暴露连接错误。
    pub fn new(config: &SchedulerConfig, url: &str) -> Result<Self> {
        let mut cfg = Config::from_url(url);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(
            config.store.redis_pool_size,
        ));
        let client = redis_driver::Client::open(url)?;
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| SchedulerError::Config(format!("redis pool: {e}")))?;

        Ok(Self {
            pool,
            client,
            scripts: Arc::new(Scripts::new()),
            index_key: config.index_key(),
            channel: config.channel().to_string(),
        })
    }

    /// 有序集合 Key
    pub fn index_key(&self) -> &str {
        &self.index_key
    }

    /// Pub/Sub 频道
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// ZSET score 是 double，任务的 due time 都是整数毫秒
pub(super) fn score_to_millis(score: f64) -> i64 {
    score.round() as i64
}
