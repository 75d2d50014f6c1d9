mod scripts;

use std::sync::Arc;

use chrono::Utc;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::redis_pool::RedisPool;
use crate::task::{Message, Status, Type};

/// Name of the global set tracking every queue that has ever been used.
const KEY_QUEUES: &str = "queues";

fn queue_key_prefix(qname: &str) -> String {
    format!("gotama:{}:", qname)
}

fn task_key_prefix(qname: &str) -> String {
    format!("{}t:", queue_key_prefix(qname))
}

fn task_key(qname: &str, id: &str) -> String {
    format!("{}{}", task_key_prefix(qname), id)
}

fn pending_key(qname: &str) -> String {
    format!("{}pending", queue_key_prefix(qname))
}

fn running_key(qname: &str) -> String {
    format!("{}running", queue_key_prefix(qname))
}

fn failed_key(qname: &str) -> String {
    format!("{}failed", queue_key_prefix(qname))
}

fn scheduled_key(qname: &str) -> String {
    format!("{}scheduled", queue_key_prefix(qname))
}

fn retry_key(qname: &str) -> String {
    format!("{}retry", queue_key_prefix(qname))
}

/// The state-machine store: every mutation to a task's status and queue
/// membership goes through one of this struct's atomic operations, each
/// backed by a single server-side script so no interleaving with another
/// operation on the same task is possible.
#[derive(Clone)]
pub struct Broker(Arc<BrokerInner>);

struct BrokerInner {
    pool: RedisPool,
    clock: Arc<dyn Clock>,

    enqueue_task: scripts::EnqueueTaskScript,
    dequeue_task: scripts::DequeueTaskScript,
    update_task: scripts::UpdateTaskScript,
    mark_complete: scripts::MarkTaskAsCompleteScript,
    requeue_retry: scripts::RequeueTaskRetryScript,
    requeue_failed: scripts::RequeueTaskFailedScript,
    remove_task: scripts::RemoveTaskScript,
    enqueue_scheduled: scripts::EnqueueScheduledTasksScript,
    get_all_tasks: scripts::GetAllTasksScript,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker").finish()
    }
}

impl Broker {
    pub fn new(pool: RedisPool, clock: Arc<dyn Clock>) -> Broker {
        Broker(Arc::new(BrokerInner {
            pool,
            clock,
            enqueue_task: scripts::EnqueueTaskScript::new(),
            dequeue_task: scripts::DequeueTaskScript::new(),
            update_task: scripts::UpdateTaskScript::new(),
            mark_complete: scripts::MarkTaskAsCompleteScript::new(),
            requeue_retry: scripts::RequeueTaskRetryScript::new(),
            requeue_failed: scripts::RequeueTaskFailedScript::new(),
            remove_task: scripts::RemoveTaskScript::new(),
            enqueue_scheduled: scripts::EnqueueScheduledTasksScript::new(),
            get_all_tasks: scripts::GetAllTasksScript::new(),
        }))
    }

    /// Liveness check against the store.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.0.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }

    /// Idempotent resource release, mirroring the original's `RDB.Close`
    /// (`redis/rdb.go`) and the Ping/Close operation pair from §4.2. Takes
    /// `self` by value rather than exposing an explicit pool-shutdown call:
    /// the pool's connections are released once every other clone of this
    /// broker (worker runners, scheduler) has already dropped its own
    /// handle, which the wiring binary guarantees by calling this only
    /// after `WorkerPool::join`/`Scheduler::join` have returned.
    pub fn close(self) {}

    pub async fn enqueue_task(&self, msg: &Message) -> Result<()> {
        let mut conn = self.0.pool.get().await?;

        redis::cmd("SADD")
            .arg(KEY_QUEUES)
            .arg(&msg.queue)
            .query_async::<_, ()>(&mut *conn)
            .await?;

        let encoded = msg.encode()?;
        self.0
            .enqueue_task
            .run(
                &mut conn,
                &task_key(&msg.queue, &msg.id),
                &pending_key(&msg.queue),
                &scheduled_key(&msg.queue),
                &encoded,
                &msg.id,
                self.0.clock.now().timestamp_millis(),
                msg.period.as_millis() as i64,
                msg.task_type.as_str(),
            )
            .await
    }

    pub async fn dequeue_task(&self, queue: &str) -> Result<Message> {
        let mut conn = self.0.pool.get().await?;
        let encoded = self
            .0
            .dequeue_task
            .run(
                &mut conn,
                &pending_key(queue),
                &running_key(queue),
                &retry_key(queue),
                &task_key_prefix(queue),
                queue,
            )
            .await?;
        Message::decode(&encoded)
    }

    pub async fn update_task(&self, msg: &Message) -> Result<()> {
        let mut conn = self.0.pool.get().await?;
        let encoded = msg.encode()?;
        self.0
            .update_task
            .run(
                &mut conn,
                &task_key(&msg.queue, &msg.id),
                &scheduled_key(&msg.queue),
                &encoded,
                msg.period.as_millis() as i64,
                msg.task_type.as_str(),
                &msg.id,
            )
            .await
    }

    pub async fn mark_task_as_complete(&self, msg: &Message) -> Result<()> {
        let mut conn = self.0.pool.get().await?;
        self.0
            .mark_complete
            .run(&mut conn, &running_key(&msg.queue), &task_key(&msg.queue, &msg.id), &msg.id)
            .await
    }

    pub async fn requeue_task_retry(&self, msg: &Message) -> Result<()> {
        let mut conn = self.0.pool.get().await?;
        self.0
            .requeue_retry
            .run(
                &mut conn,
                &running_key(&msg.queue),
                &retry_key(&msg.queue),
                &task_key(&msg.queue, &msg.id),
                &msg.id,
            )
            .await
    }

    pub async fn requeue_task_failed(&self, msg: &Message) -> Result<()> {
        let mut conn = self.0.pool.get().await?;
        self.0
            .requeue_failed
            .run(
                &mut conn,
                &running_key(&msg.queue),
                &failed_key(&msg.queue),
                &task_key(&msg.queue, &msg.id),
                &msg.id,
            )
            .await
    }

    pub async fn remove_task(&self, queue: &str, id: &str) -> Result<()> {
        let mut conn = self.0.pool.get().await?;
        self.0
            .remove_task
            .run(
                &mut conn,
                &task_key(queue, id),
                &pending_key(queue),
                &scheduled_key(queue),
                &retry_key(queue),
                id,
            )
            .await
    }

    pub async fn get_task(&self, queue: &str, id: &str) -> Result<Message> {
        let mut conn = self.0.pool.get().await?;
        let encoded: Option<String> = redis::cmd("HGET")
            .arg(task_key(queue, id))
            .arg("msg")
            .query_async(&mut *conn)
            .await?;
        let encoded = encoded.ok_or_else(|| Error::NotFound(id.to_string()))?;
        Message::decode(&encoded)
    }

    pub async fn get_all_tasks(
        &self,
        queue: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(i64, Vec<Message>)> {
        let mut conn = self.0.pool.get().await?;
        let glob = format!("{}*", task_key_prefix(queue));
        self.0.get_all_tasks.run(&mut conn, &glob, offset, limit).await
    }

    /// The scheduler's atomic promotion pass: moves due retry and recurring
    /// tasks back into `pending`.
    pub async fn enqueue_scheduled_tasks(&self, queue: &str) -> Result<()> {
        let mut conn = self.0.pool.get().await?;
        self.0
            .enqueue_scheduled
            .run(
                &mut conn,
                &scheduled_key(queue),
                &pending_key(queue),
                &task_key_prefix(queue),
                &retry_key(queue),
                self.0.clock.now().timestamp_millis(),
            )
            .await
    }
}

/// Pushed up from the worker pool: the terminal-or-retry transition for a
/// task whose processor returned an error (or panicked, see §9 R2).
pub async fn handle_task_error(
    broker: &Broker,
    clock: &dyn Clock,
    msg: &mut Message,
    err: String,
) -> Result<()> {
    msg.status = Status::Failed;
    msg.error = Some(err);
    msg.failed_at = Some(clock.now());
    msg.num_retries += 1;
    broker.update_task(msg).await?;

    if msg.num_retries < msg.max_retries {
        broker.requeue_task_retry(msg).await
    } else {
        broker.requeue_task_failed(msg).await
    }
}

/// The success transition for a task whose processor returned `Ok`.
pub async fn handle_task_success(broker: &Broker, clock: &dyn Clock, msg: &mut Message) -> Result<()> {
    msg.status = Status::Succeeded;
    msg.completed_at = Some(clock.now());
    if msg.task_type == Type::Recurring {
        msg.num_retries = 0;
    }
    broker.update_task(msg).await?;
    broker.mark_task_as_complete(msg).await
}

#[cfg(all(test, feature = "test-redis"))]
mod tests {
    use super::*;
    use crate::clock::RealClock;
    use crate::task::Request;

    async fn test_broker() -> Broker {
        dotenv::dotenv().ok();
        let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set for broker tests");
        let pool = RedisPool::new(url).unwrap();
        Broker::new(pool, Arc::new(RealClock))
    }

    async fn cleanup(broker: &Broker, queue: &str) {
        let mut conn = broker.0.pool.get().await.unwrap();
        let pattern = format!("gotama:{}:*", queue);
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut *conn)
            .await
            .unwrap();
        if !keys.is_empty() {
            redis::cmd("DEL")
                .arg(keys)
                .query_async::<_, ()>(&mut *conn)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_claims_the_task() {
        let broker = test_broker().await;
        let queue = "test_enqueue_dequeue";
        cleanup(&broker, queue).await;

        let req = Request {
            name: "EMAIL".to_string(),
            task_type: "ONCE".to_string(),
            period: "".to_string(),
            payload: br#"{"to":"a@b.com"}"#.to_vec(),
        };
        let mut msg = Message::new_from_request(&req, Utc::now()).unwrap();
        msg.queue = queue.to_string();

        broker.enqueue_task(&msg).await.unwrap();
        assert!(matches!(
            broker.enqueue_task(&msg).await,
            Err(Error::AlreadyExists(_))
        ));

        let dequeued = broker.dequeue_task(queue).await.unwrap();
        assert_eq!(dequeued.id, msg.id);
        assert_eq!(dequeued.status, Status::Running);

        assert!(matches!(
            broker.dequeue_task(queue).await,
            Err(Error::NoTasks(_))
        ));

        cleanup(&broker, queue).await;
    }

    #[tokio::test]
    async fn retry_then_exhausted_goes_to_failed() {
        let broker = test_broker().await;
        let queue = "test_retry_exhausted";
        cleanup(&broker, queue).await;

        let req = Request {
            name: "FOO".to_string(),
            task_type: "ONCE".to_string(),
            period: "".to_string(),
            payload: br#"{"bar":1,"baz":2}"#.to_vec(),
        };
        let mut msg = Message::new_from_request(&req, Utc::now()).unwrap();
        msg.queue = queue.to_string();
        msg.max_retries = 1;
        broker.enqueue_task(&msg).await.unwrap();

        let mut claimed = broker.dequeue_task(queue).await.unwrap();
        handle_task_error(&broker, &RealClock, &mut claimed, "boom".into())
            .await
            .unwrap();
        let after_first = broker.get_task(queue, &claimed.id).await.unwrap();
        assert_eq!(after_first.status, Status::Retry);

        broker.enqueue_scheduled_tasks(queue).await.unwrap();
        let mut reclaimed = broker.dequeue_task(queue).await.unwrap();
        assert_eq!(reclaimed.num_retries, 1);

        handle_task_error(&broker, &RealClock, &mut reclaimed, "boom again".into())
            .await
            .unwrap();
        let after_second = broker.get_task(queue, &reclaimed.id).await.unwrap();
        assert_eq!(after_second.status, Status::Failed);
        assert_eq!(after_second.num_retries, 2);

        cleanup(&broker, queue).await;
    }
}
