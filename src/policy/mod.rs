mod expbackoff;
mod fixed;
mod retry;

pub use expbackoff::ExponentialBackoff;
pub use fixed::FixedDelay;
pub use retry::{RetryContext, RetryDecision, RetryPolicy, from_config};
