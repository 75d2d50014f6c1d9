use std::sync::Arc;

use tracing::{event, Level};

use gotama::broker::Broker;
use gotama::clock::RealClock;
use gotama::config::Config;
use gotama::error::Result;
use gotama::graceful_shutdown::GracefulShutdown;
use gotama::scheduler::Scheduler;
use gotama::worker::WorkerPool;
use gotama::RedisPool;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    gotama::tracing_config::configure("gotama-worker");

    let shutdown = GracefulShutdown::new();
    let config = Config::from_env()?;

    let redis_pool = RedisPool::new(config.redis_url.clone())?;
    let clock = Arc::new(RealClock);
    let broker = Broker::new(redis_pool, clock.clone());
    broker.ping().await?;

    event!(
        Level::INFO,
        concurrency = config.worker_concurrency,
        "starting worker pool"
    );
    let worker_pool = WorkerPool::spawn(
        broker.clone(),
        clock.clone(),
        config.worker_concurrency,
        config.scheduler_tick,
        config.worker_task_deadline,
        shutdown.consumer(),
    );

    let scheduler = Scheduler::spawn(broker.clone(), config.scheduler_tick, shutdown.consumer());

    shutdown.consumer().wait_for_shutdown().await;
    event!(Level::INFO, "shutdown signal received, waiting for runners to finish");

    worker_pool.join().await;
    scheduler.join().await;
    broker.close();

    Ok(())
}
