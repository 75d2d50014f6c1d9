use lazy_static::lazy_static;

use crate::error::{Error, Result};

// KEYS[1] -> gotama:<qname>:running
// KEYS[2] -> gotama:<qname>:t:<task_id>
// ARGV[1] -> task id
//
// Returns 1 if the id was in `running`, 0 otherwise (double-completion guard).
const MARK_TASK_AS_COMPLETE_SCRIPT: &str = r##"
if redis.call("LREM", KEYS[1], 0, ARGV[1]) == 0 then
    return 0
end
redis.call("HSET", KEYS[2], "status", "succeeded")
return 1
"##;

lazy_static! {
    static ref SCRIPT: redis::Script = redis::Script::new(MARK_TASK_AS_COMPLETE_SCRIPT);
}

pub struct MarkTaskAsCompleteScript(&'static redis::Script);

impl MarkTaskAsCompleteScript {
    pub fn new() -> Self {
        MarkTaskAsCompleteScript(&SCRIPT)
    }

    pub async fn run(
        &self,
        conn: &mut deadpool_redis::Connection,
        running_key: &str,
        task_key: &str,
        id: &str,
    ) -> Result<()> {
        let completed: i64 = self
            .0
            .key(running_key)
            .key(task_key)
            .arg(id)
            .invoke_async(&mut **conn)
            .await?;

        if completed == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl Default for MarkTaskAsCompleteScript {
    fn default() -> Self {
        Self::new()
    }
}
