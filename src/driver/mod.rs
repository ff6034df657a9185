pub mod builder;
pub mod context;
pub mod core;
mod listener;
pub mod metrics;
pub mod pacemaker;
pub mod plugin;
pub mod plugins;

pub use context::DriverContext;
pub use self::core::TaskDriver;
pub use pacemaker::{TaskPacemaker, TimerState};
pub use plugin::{DriverPlugin, DropReason, NoOpPlugin};

pub use builder::TaskDriverBuilder;
pub use metrics::DriverMetrics;
