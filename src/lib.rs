pub mod broker;
pub mod clock;
pub mod config;
pub mod error;
pub mod graceful_shutdown;
pub mod processor;
pub mod scheduler;
pub mod task;
pub mod tracing_config;
pub mod worker;

mod redis_pool;

pub use redis_pool::RedisPool;
