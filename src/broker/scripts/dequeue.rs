use lazy_static::lazy_static;

use crate::error::{Error, Result};

// KEYS[1] -> gotama:<qname>:pending
// KEYS[2] -> gotama:<qname>:running
// KEYS[3] -> gotama:<qname>:retry
// ARGV[1] -> task key prefix, gotama:<qname>:t:
//
// Returns nil if no processable task is found in the given queue. Otherwise
// returns the encoded task message.
//
// This also LREMs the claimed id out of the retry list. The original source
// only removes a promoted-retry id from `retry` once it is re-enqueued and
// dequeued again here -- without this the retry list would accumulate one
// stale entry per retried task forever, since `EnqueueScheduledTasks`
// deliberately leaves the id in place (see the scheduled-tasks script's own
// comment for why cleanup is pushed to this end instead).
const DEQUEUE_TASK_SCRIPT: &str = r##"
if redis.call("EXISTS", KEYS[1]) == 1 then
    local id = redis.call("RPOPLPUSH", KEYS[1], KEYS[2])
    if id then
        local key = ARGV[1] .. id
        redis.call("HSET", key, "status", "running")
        redis.call("LREM", KEYS[3], 0, id)
        return redis.call("HGET", key, "msg")
    end
end
return nil
"##;

lazy_static! {
    static ref SCRIPT: redis::Script = redis::Script::new(DEQUEUE_TASK_SCRIPT);
}

pub struct DequeueTaskScript(&'static redis::Script);

impl DequeueTaskScript {
    pub fn new() -> Self {
        DequeueTaskScript(&SCRIPT)
    }

    pub async fn run(
        &self,
        conn: &mut deadpool_redis::Connection,
        pending_key: &str,
        running_key: &str,
        retry_key: &str,
        task_key_prefix: &str,
        queue: &str,
    ) -> Result<String> {
        let encoded: Option<String> = self
            .0
            .key(pending_key)
            .key(running_key)
            .key(retry_key)
            .arg(task_key_prefix)
            .invoke_async(&mut **conn)
            .await?;

        encoded.ok_or_else(|| Error::NoTasks(queue.to_string()))
    }
}

impl Default for DequeueTaskScript {
    fn default() -> Self {
        Self::new()
    }
}
