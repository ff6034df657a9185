mod channel;
mod core;
mod index;
mod scripts;

pub use self::core::RedisPersistence;
