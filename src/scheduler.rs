use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{event, Level};

use crate::broker::Broker;
use crate::graceful_shutdown::GracefulShutdownConsumer;
use crate::task::QUEUE_DEFAULT;

/// One periodic loop that promotes due retry and recurring tasks back into
/// `pending`. The tick is fixed; drift beyond one period is acceptable
/// because `pending_since + period` is the authoritative due-time check,
/// not wall-clock precision of the tick itself.
pub struct Scheduler {
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn spawn(broker: Broker, tick: Duration, mut shutdown: GracefulShutdownConsumer) -> Scheduler {
        event!(Level::INFO, period = ?tick, "scheduler started");
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.wait_for_shutdown() => {
                        event!(Level::INFO, "scheduler received shutdown");
                        return;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = broker.enqueue_scheduled_tasks(QUEUE_DEFAULT).await {
                            event!(Level::ERROR, error = %e, "scheduler error during enqueueing scheduled tasks");
                        }
                    }
                }
            }
        });
        Scheduler { handle }
    }

    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            event!(Level::ERROR, error = %e, "scheduler task panicked");
        }
    }
}
