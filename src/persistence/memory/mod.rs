mod channel;
mod core;
mod index;

pub use self::core::MemoryPersistence;
