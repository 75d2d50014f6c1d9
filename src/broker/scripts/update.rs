use lazy_static::lazy_static;

use crate::error::{Error, Result};

// KEYS[1] -> gotama:<qname>:t:<task_id>
// KEYS[2] -> gotama:<qname>:scheduled
// ARGV[1] -> encoded task message
// ARGV[2] -> period in millis
// ARGV[3] -> task type, ONCE or RECURRING
// ARGV[4] -> task id
//
// Returns 1 if updated, 0 if the task id does not exist.
const UPDATE_TASK_SCRIPT: &str = r##"
if redis.call("EXISTS", KEYS[1]) == 0 then
    return 0
end
redis.call("HSET", KEYS[1],
           "msg", ARGV[1],
           "period", ARGV[2])
redis.call("LREM", KEYS[2], 0, ARGV[4])
if ARGV[3] == "RECURRING" then
    redis.call("LPUSH", KEYS[2], ARGV[4])
end
return 1
"##;

lazy_static! {
    static ref SCRIPT: redis::Script = redis::Script::new(UPDATE_TASK_SCRIPT);
}

pub struct UpdateTaskScript(&'static redis::Script);

impl UpdateTaskScript {
    pub fn new() -> Self {
        UpdateTaskScript(&SCRIPT)
    }

    pub async fn run(
        &self,
        conn: &mut deadpool_redis::Connection,
        task_key: &str,
        scheduled_key: &str,
        encoded: &str,
        period_millis: i64,
        task_type: &str,
        id: &str,
    ) -> Result<()> {
        let updated: i64 = self
            .0
            .key(task_key)
            .key(scheduled_key)
            .arg(encoded)
            .arg(period_millis)
            .arg(task_type)
            .arg(id)
            .invoke_async(&mut **conn)
            .await?;

        if updated == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl Default for UpdateTaskScript {
    fn default() -> Self {
        Self::new()
    }
}
