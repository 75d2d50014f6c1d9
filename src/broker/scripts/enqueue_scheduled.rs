use lazy_static::lazy_static;

use crate::error::Result;

// KEYS[1] -> gotama:<qname>:scheduled
// KEYS[2] -> gotama:<qname>:pending
// KEYS[3] -> gotama:<qname>:t: (task key prefix)
// KEYS[4] -> gotama:<qname>:retry
// ARGV[1] -> current unix time in millis
//
// Two passes, one atomic script so no task is promoted twice under
// concurrent ticks:
//   1. retry ids still marked `retry` are appended to the tail of pending
//      (RPUSH -- deprioritized against fresh enqueues at the head). The id
//      is deliberately left in `retry`; `DequeueTask` removes it once the
//      task is actually claimed again.
//   2. scheduled (recurring) ids whose period has elapsed and that are not
//      currently failed/retry/running/pending are pushed to the head of
//      pending (LPUSH -- higher priority than retry promotions).
const ENQUEUE_SCHEDULED_TASKS_SCRIPT: &str = r##"
local retry_task_ids = redis.call("LRANGE", KEYS[4], 0, -1)

for _, task_id in ipairs(retry_task_ids) do
    local task_key = KEYS[3] .. task_id
    local status = redis.call("HGET", task_key, "status")

    if status == "retry" then
        redis.call("RPUSH", KEYS[2], task_id)
        redis.call("HSET", task_key, "pending_since", ARGV[1])
        redis.call("HSET", task_key, "status", "pending")
    end
end

local scheduled_task_ids = redis.call("LRANGE", KEYS[1], 0, -1)

for _, task_id in ipairs(scheduled_task_ids) do
    local task_key = KEYS[3] .. task_id
    local pending_since = tonumber(redis.call("HGET", task_key, "pending_since"))
    local status = redis.call("HGET", task_key, "status")
    local period = tonumber(redis.call("HGET", task_key, "period"))
    local current_time = tonumber(ARGV[1])

    if status ~= "failed" and status ~= "retry" and status ~= "running" and status ~= "pending" and current_time > pending_since + period then
        redis.call("LPUSH", KEYS[2], task_id)
        redis.call("HSET", task_key, "pending_since", ARGV[1])
        redis.call("HSET", task_key, "status", "pending")
    end
end

return redis.status_reply("OK")
"##;

lazy_static! {
    static ref SCRIPT: redis::Script = redis::Script::new(ENQUEUE_SCHEDULED_TASKS_SCRIPT);
}

pub struct EnqueueScheduledTasksScript(&'static redis::Script);

impl EnqueueScheduledTasksScript {
    pub fn new() -> Self {
        EnqueueScheduledTasksScript(&SCRIPT)
    }

    pub async fn run(
        &self,
        conn: &mut deadpool_redis::Connection,
        scheduled_key: &str,
        pending_key: &str,
        task_key_prefix: &str,
        retry_key: &str,
        now_millis: i64,
    ) -> Result<()> {
        let _: redis::Value = self
            .0
            .key(scheduled_key)
            .key(pending_key)
            .key(task_key_prefix)
            .key(retry_key)
            .arg(now_millis)
            .invoke_async(&mut **conn)
            .await?;

        Ok(())
    }
}

impl Default for EnqueueScheduledTasksScript {
    fn default() -> Self {
        Self::new()
    }
}
