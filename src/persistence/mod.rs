pub mod memory;
pub mod model;
#[cfg(feature = "distributed")]
pub mod redis;
pub mod traits;

pub use memory::MemoryPersistence;
pub use model::{ChannelEvent, IndexEntry, Subscription};
#[cfg(feature = "distributed")]
pub use redis::RedisPersistence;
pub use traits::{DueIndex, InvalidationChannel};
