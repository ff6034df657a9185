pub mod builder;
pub mod client;
pub mod context;
pub mod registry;
pub mod router;
pub mod worker;

pub use builder::SchedulerBuilder;
pub use context::JobContext;
pub use registry::HandlerRegistry;
pub use router::{JsonDecoder, PayloadDecoder, RawDecoder};
pub use worker::Scheduler;
