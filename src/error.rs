use envoption::EnvOptionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    RedisPoolError(#[from] deadpool::managed::PoolError<redis::RedisError>),

    #[error("Redis pool creation error: {0}")]
    RedisPoolCreationError(#[from] deadpool_redis::CreatePoolError),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Environment variable error: {0}")]
    EnvOptionError(String),

    #[error("unknown task name {0:?}")]
    BadName(String),

    #[error("unknown task type {0:?}")]
    BadType(String),

    #[error("recurring task period must be at least 1 second, got {0:?}")]
    BadPeriod(String),

    #[error("task {0} already exists")]
    AlreadyExists(String),

    #[error("task {0} not found")]
    NotFound(String),

    #[error("no tasks available in queue {0}")]
    NoTasks(String),

    #[error("unknown processor for task name {0:?}")]
    UnknownProcessor(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("processor error: {0}")]
    ProcessorError(anyhow::Error),
}

impl<T: std::error::Error> From<EnvOptionError<T>> for Error {
    fn from(e: EnvOptionError<T>) -> Self {
        Self::EnvOptionError(e.to_string())
    }
}
