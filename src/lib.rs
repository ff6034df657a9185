// 1. 基础模块
pub mod common;

// 2. 核心接口与实现
pub mod driver;
pub mod persistence;
pub mod policy;

// 3. 调度器核心
pub mod scheduler;

pub use common::{
    DrainReport, Result, ScheduledTask, SchedulerConfig, SchedulerError, SchedulerStats,
    TaskHandler,
};
pub use driver::{DriverPlugin, TimerState};
pub use persistence::MemoryPersistence;
#[cfg(feature = "distributed")]
pub use persistence::RedisPersistence;
pub use scheduler::{JobContext, Scheduler, SchedulerBuilder};
