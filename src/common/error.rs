use thiserror::Error;

/// 调度器统一结果类型
///
/// 使用此别名可以简化函数签名：`fn do_something() -> Result<()>`
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Error, Debug)]
pub enum SchedulerError {
    // ==========================================
    // 1. 注册与调用错误 (Registration & Caller)
    // ==========================================
    /// Handler 名称非法
    ///
    /// - 触发场景: 名称为空、包含分隔符 `:`，或者形如 `RETRY-<数字>` (与重试前缀冲突)。
    /// - 后果: 注册被拒绝，注册表保持不变。
    /// - 处理: 调用方修改名称，永远不会重试。
    #[error("Scheduler handler name may not contain `:` or look like a retry prefix: {0:?}")]
    InvalidName(String),

    /// 未知 Handler
    ///
    /// - 触发场景: `schedule` / `cancel` 引用了一个当前进程没有注册的名称。
    /// - 后果: 索引不会被修改。
    /// - 处理: 先注册 Handler，或由调用方自行忽略。
    #[error("Unknown scheduler handler: {0}")]
    UnknownHandler(String),

    /// 配置错误
    ///
    /// - 触发场景: Builder 校验不通过 (空命名空间、horizon 为 0 等)。
    #[error("Configuration error: {0}")]
    Config(String),

    // ==========================================
    // 2. 执行错误 (Execution)
    // ==========================================
    /// 任务自身逻辑错误
    ///
    /// - 触发场景: Handler 返回 `Err`、Panic、或者 JSON 参数解析失败。
    /// - 后果: 只在执行循环内部被捕获，交给插件和重试策略，永远不会抛给当初提交任务的调用方。
    #[error("Handler `{handler}` failed: {source:#}")]
    HandlerFailed {
        handler: String,
        #[source]
        source: anyhow::Error,
    },

    /// 索引成员格式损坏
    ///
    /// - 触发场景: 有序集合里出现了不是本调度器写入的成员，或者被人手工改坏了。
    /// - 后果: 该成员已被领取 (已从索引删除)，直接丢弃。
    #[error("Malformed task member: {0:?}")]
    MalformedMember(String),

    /// 序列化/反序列化失败
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    // ==========================================
    // 3. 基础设施错误 (Store Unavailable)
    // ==========================================
    /// Redis 交互失败
    ///
    /// - 触发场景: 网络抖动、Redis 重启、或 Redis 处于 Loading 状态。
    /// - 处理: 调度核心不会自己重试，错误直接传回调用方。
    #[cfg(feature = "distributed")]
    #[error("Redis interaction failed: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    /// Redis 连接池错误
    #[cfg(feature = "distributed")]
    #[error("Redis pool failed: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// 存储不可用 (后端无关)
    ///
    /// - 说明: 内存后端模拟宕机，或者自定义后端包装自身驱动错误时使用。
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl SchedulerError {
    /// 判断是否属于 "存储不可用" 一族
    ///
    /// 调用方据此区分：是自己的用法错误 (名称/注册问题)，还是后端暂时故障。
    /// 后者可以稍后重新 `schedule`，或者等待下一次失效通知让定时器恢复。
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            #[cfg(feature = "distributed")]
            SchedulerError::Redis(_) | SchedulerError::Pool(_) => true,

            SchedulerError::StoreUnavailable(_) => true,

            SchedulerError::InvalidName(_)
            | SchedulerError::UnknownHandler(_)
            | SchedulerError::Config(_)
            | SchedulerError::HandlerFailed { .. }
            | SchedulerError::MalformedMember(_)
            | SchedulerError::Serialization(_) => false,
        }
    }

    /// 包装 Handler 的执行错误
    pub(crate) fn handler_failed(handler: &str, source: anyhow::Error) -> Self {
        SchedulerError::HandlerFailed {
            handler: handler.to_string(),
            source,
        }
    }
}
