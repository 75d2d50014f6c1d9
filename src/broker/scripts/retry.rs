use lazy_static::lazy_static;

use crate::error::{Error, Result};

// KEYS[1] -> gotama:<qname>:running
// KEYS[2] -> gotama:<qname>:retry
// KEYS[3] -> gotama:<qname>:t:<task_id>
// ARGV[1] -> task id
//
// Returns 1 if the id was in `running`, 0 otherwise.
const SCHEDULE_TASK_RETRY_SCRIPT: &str = r##"
if redis.call("LREM", KEYS[1], 0, ARGV[1]) == 0 then
    return 0
end
redis.call("LREM", KEYS[2], 0, ARGV[1])
redis.call("LPUSH", KEYS[2], ARGV[1])
redis.call("HSET", KEYS[3], "status", "retry")
return 1
"##;

lazy_static! {
    static ref SCRIPT: redis::Script = redis::Script::new(SCHEDULE_TASK_RETRY_SCRIPT);
}

pub struct RequeueTaskRetryScript(&'static redis::Script);

impl RequeueTaskRetryScript {
    pub fn new() -> Self {
        RequeueTaskRetryScript(&SCRIPT)
    }

    pub async fn run(
        &self,
        conn: &mut deadpool_redis::Connection,
        running_key: &str,
        retry_key: &str,
        task_key: &str,
        id: &str,
    ) -> Result<()> {
        let moved: i64 = self
            .0
            .key(running_key)
            .key(retry_key)
            .key(task_key)
            .arg(id)
            .invoke_async(&mut **conn)
            .await?;

        if moved == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl Default for RequeueTaskRetryScript {
    fn default() -> Self {
        Self::new()
    }
}
