use std::{ops::Deref, sync::Arc};

use crate::error::Result;

#[derive(Clone)]
pub struct RedisPool(Arc<deadpool_redis::Pool>);

impl Deref for RedisPool {
    type Target = deadpool_redis::Pool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl RedisPool {
    pub fn new(url: impl Into<String>) -> Result<RedisPool> {
        let pool = deadpool_redis::Config {
            url: Some(url.into()),
            connection: None,
            pool: None,
        }
        .create_pool()?;

        Ok(RedisPool(Arc::new(pool)))
    }

    pub fn pool(&self) -> &deadpool_redis::Pool {
        &self.0
    }
}
