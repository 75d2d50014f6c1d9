use lazy_static::lazy_static;

use crate::error::{Error, Result};

// KEYS[1] -> gotama:<qname>:t:<task_id>
// KEYS[2] -> gotama:<qname>:pending
// KEYS[3] -> gotama:<qname>:scheduled
// ARGV[1] -> encoded task message
// ARGV[2] -> task id
// ARGV[3] -> current unix time in millis
// ARGV[4] -> period in millis
// ARGV[5] -> task type, RECURRING or ONCE
//
// Returns 1 if enqueued, 0 if the task id already exists.
const ENQUEUE_TASK_SCRIPT: &str = r##"
if redis.call("EXISTS", KEYS[1]) == 1 then
    return 0
end
redis.call("HSET", KEYS[1],
           "msg", ARGV[1],
           "status", "pending",
           "pending_since", ARGV[3],
           "created_at", ARGV[3],
           "period", ARGV[4])
redis.call("LPUSH", KEYS[2], ARGV[2])
if ARGV[5] == "RECURRING" then
    redis.call("LPUSH", KEYS[3], ARGV[2])
end
return 1
"##;

lazy_static! {
    static ref SCRIPT: redis::Script = redis::Script::new(ENQUEUE_TASK_SCRIPT);
}

pub struct EnqueueTaskScript(&'static redis::Script);

impl EnqueueTaskScript {
    pub fn new() -> Self {
        EnqueueTaskScript(&SCRIPT)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        conn: &mut deadpool_redis::Connection,
        task_key: &str,
        pending_key: &str,
        scheduled_key: &str,
        encoded: &str,
        id: &str,
        now_millis: i64,
        period_millis: i64,
        task_type: &str,
    ) -> Result<()> {
        let created: i64 = self
            .0
            .key(task_key)
            .key(pending_key)
            .key(scheduled_key)
            .arg(encoded)
            .arg(id)
            .arg(now_millis)
            .arg(period_millis)
            .arg(task_type)
            .invoke_async(&mut **conn)
            .await?;

        if created == 0 {
            return Err(Error::AlreadyExists(id.to_string()));
        }
        Ok(())
    }
}

impl Default for EnqueueTaskScript {
    fn default() -> Self {
        Self::new()
    }
}
