use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;
use tracing::{event, Level};

use crate::broker::{handle_task_error, handle_task_success, Broker};
use crate::clock::Clock;
use crate::error::Error;
use crate::graceful_shutdown::GracefulShutdownConsumer;
use crate::processor::processor_factory;
use crate::task::{Status, QUEUE_DEFAULT};

/// Spawns `concurrency` independent runner tasks against one broker, each
/// ticking once per `tick` and racing a single task's execution against
/// `task_deadline`. Shutdown cancels each runner's own tick loop at its next
/// iteration boundary; an in-flight task is left to finish or hit its own
/// deadline rather than being aborted mid-execution.
pub struct WorkerPool {
    handles: FuturesUnordered<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        broker: Broker,
        clock: Arc<dyn Clock>,
        concurrency: u32,
        tick: Duration,
        task_deadline: Duration,
        shutdown: GracefulShutdownConsumer,
    ) -> WorkerPool {
        let handles = FuturesUnordered::new();
        for id in 0..concurrency {
            let broker = broker.clone();
            let clock = clock.clone();
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(tick);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown.wait_for_shutdown() => {
                            event!(Level::INFO, runner = id, "worker runner received shutdown");
                            return;
                        }
                        _ = interval.tick() => {
                            run_one_tick(id, &broker, clock.as_ref(), task_deadline).await;
                        }
                    }
                }
            }));
        }
        WorkerPool { handles }
    }

    /// Waits for every runner to exit. Call after the pool's shutdown
    /// consumer has fired.
    pub async fn join(mut self) {
        while let Some(res) = self.handles.next().await {
            if let Err(e) = res {
                event!(Level::ERROR, error = %e, "worker runner task panicked");
            }
        }
    }
}

/// Dequeues at most one task and drives it to completion. The dequeue and
/// the `running` transition happen outside the panic barrier so that a
/// panicking processor still leaves `msg` in hand for `handle_task_error` --
/// per Open Question R2, a caught panic is treated as a processor error and
/// routed through the same error path as an `Err` return, rather than left
/// stuck in `running`.
async fn run_one_tick(runner_id: u32, broker: &Broker, clock: &dyn Clock, task_deadline: Duration) {
    let mut msg = match broker.dequeue_task(QUEUE_DEFAULT).await {
        Ok(msg) => msg,
        Err(Error::NoTasks(_)) => return,
        Err(e) => {
            event!(Level::ERROR, runner = runner_id, error = %e, "worker dequeue error");
            return;
        }
    };

    msg.status = Status::Running;
    if let Err(e) = broker.update_task(&msg).await {
        event!(Level::ERROR, runner = runner_id, task_id = %msg.id, error = %e, "worker failed to mark task running");
        return;
    }

    let processor = match processor_factory(msg.name) {
        Ok(p) => p,
        Err(e) => {
            if let Err(e2) = handle_task_error(broker, clock, &mut msg, e.to_string()).await {
                event!(Level::ERROR, runner = runner_id, task_id = %msg.id, error = %e2, "worker failed to record processor error");
            }
            return;
        }
    };

    let deadline = tokio::time::Instant::now() + task_deadline;
    let outcome = AssertUnwindSafe(tokio::time::timeout_at(deadline, processor.process_task(&msg)))
        .catch_unwind()
        .await;

    let record_result = match outcome {
        Ok(Ok(Ok(()))) => handle_task_success(broker, clock, &mut msg).await,
        Ok(Ok(Err(e))) => handle_task_error(broker, clock, &mut msg, e.to_string()).await,
        Ok(Err(_elapsed)) => {
            handle_task_error(broker, clock, &mut msg, "task deadline exceeded".to_string()).await
        }
        Err(panic) => {
            let panic_msg = panic_message(&panic);
            event!(Level::ERROR, runner = runner_id, task_id = %msg.id, panic = %panic_msg, "processor panicked, recovering");
            handle_task_error(broker, clock, &mut msg, panic_msg).await
        }
    };

    if let Err(e) = record_result {
        event!(Level::ERROR, runner = runner_id, task_id = %msg.id, error = %e, "worker failed to record task outcome");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_unwraps_str_and_string_payloads() {
        let s: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(s.as_ref()), "boom");

        let s: Box<dyn std::any::Any + Send> = Box::new("boom".to_string());
        assert_eq!(panic_message(s.as_ref()), "boom");

        let s: Box<dyn std::any::Any + Send> = Box::new(42);
        assert_eq!(panic_message(s.as_ref()), "unknown panic payload");
    }
}
