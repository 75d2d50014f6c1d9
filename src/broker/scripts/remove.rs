use lazy_static::lazy_static;

use crate::error::{Error, Result};

// KEYS[1] -> gotama:<qname>:t:<task_id>
// KEYS[2] -> gotama:<qname>:pending
// KEYS[3] -> gotama:<qname>:scheduled
// KEYS[4] -> gotama:<qname>:retry
// ARGV[1] -> task id
//
// Returns 1 if the task record existed and was deleted, 0 otherwise.
// `running` is deliberately untouched -- a claimed task cannot be removed
// out from under its worker.
const REMOVE_TASK_SCRIPT: &str = r##"
redis.call("LREM", KEYS[2], 0, ARGV[1])
redis.call("LREM", KEYS[3], 0, ARGV[1])
redis.call("LREM", KEYS[4], 0, ARGV[1])
return redis.call("DEL", KEYS[1])
"##;

lazy_static! {
    static ref SCRIPT: redis::Script = redis::Script::new(REMOVE_TASK_SCRIPT);
}

pub struct RemoveTaskScript(&'static redis::Script);

impl RemoveTaskScript {
    pub fn new() -> Self {
        RemoveTaskScript(&SCRIPT)
    }

    pub async fn run(
        &self,
        conn: &mut deadpool_redis::Connection,
        task_key: &str,
        pending_key: &str,
        scheduled_key: &str,
        retry_key: &str,
        id: &str,
    ) -> Result<()> {
        let deleted: i64 = self
            .0
            .key(task_key)
            .key(pending_key)
            .key(scheduled_key)
            .key(retry_key)
            .arg(id)
            .invoke_async(&mut **conn)
            .await?;

        if deleted == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl Default for RemoveTaskScript {
    fn default() -> Self {
        Self::new()
    }
}
