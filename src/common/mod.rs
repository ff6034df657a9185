pub mod config;
pub mod error;
pub mod model;
pub mod time;
pub mod traits;
pub(crate) mod utils;

// 导出配置
pub use config::{BackoffKind, RetryConfig, SchedulerConfig, StoreConfig, TimerConfig};

// 导出错误类型
pub use error::{Result, SchedulerError};

// 导出核心模型
pub use model::{DrainReport, ScheduledTask, SchedulerStats, TaskMember, validate_handler_name};

// 导出用户需实现的 Trait
pub use traits::TaskHandler;

pub use time::TimeUtils;
// 内部工具的快捷访问
pub(crate) use utils::calculate_backoff;
