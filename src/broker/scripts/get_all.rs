use lazy_static::lazy_static;

use crate::error::Result;
use crate::task::Message;

// KEYS[1] -> gotama:<qname>:t:* (glob pattern)
// ARGV[1] -> offset
// ARGV[2] -> limit
//
// Returns {total_keys, paginated_encoded_msgs}, sorted by (created_at DESC,
// key ASC) for a stable, defined order.
const GET_ALL_TASKS_SCRIPT: &str = r##"
local keys = redis.call("KEYS", KEYS[1])
local sorted_keys = {}
for i, key in ipairs(keys) do
    local created_at = redis.call("HGET", key, "created_at")
    local msg = redis.call("HGET", key, "msg")
    sorted_keys[i] = {tonumber(created_at) or 0, key, msg}
end
local function customSort(a, b)
    if a[1] == b[1] then
        return a[2] < b[2]
    else
        return a[1] > b[1]
    end
end
table.sort(sorted_keys, customSort)

local total_keys = #sorted_keys
local start_index = ARGV[1] + 1
local end_index = math.min(ARGV[1] + ARGV[2], total_keys)
local paginated_keys = {}
for i = start_index, end_index do
    paginated_keys[i - start_index + 1] = sorted_keys[i][3]
end
return {total_keys, paginated_keys}
"##;

lazy_static! {
    static ref SCRIPT: redis::Script = redis::Script::new(GET_ALL_TASKS_SCRIPT);
}

pub struct GetAllTasksScript(&'static redis::Script);

impl GetAllTasksScript {
    pub fn new() -> Self {
        GetAllTasksScript(&SCRIPT)
    }

    pub async fn run(
        &self,
        conn: &mut deadpool_redis::Connection,
        task_key_glob: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(i64, Vec<Message>)> {
        let (total, encoded): (i64, Vec<String>) = self
            .0
            .key(task_key_glob)
            .arg(offset)
            .arg(limit)
            .invoke_async(&mut **conn)
            .await?;

        let mut messages = Vec::with_capacity(encoded.len());
        for raw in encoded {
            messages.push(Message::decode(&raw)?);
        }

        Ok((total, messages))
    }
}

impl Default for GetAllTasksScript {
    fn default() -> Self {
        Self::new()
    }
}
