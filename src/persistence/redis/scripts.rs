use deadpool_redis::redis::Script;

/// Redis Lua 脚本库
///
/// 预加载所有脚本，避免每次调用时重新编译。
#[derive(Debug, Clone)]
pub(super) struct Scripts {
    /// ZRANGEBYSCORE + ZREM，多实例并发领取时每个成员只会被一个实例拿到
    pub claim_due: Script,
}

impl Scripts {
    pub fn new() -> Self {
        Self {
            claim_due: Script::new(include_str!("../../scripts/redis_claim_due.lua")),
        }
    }
}
