mod complete;
mod dequeue;
mod enqueue;
mod enqueue_scheduled;
mod fail;
mod get_all;
mod remove;
mod retry;
mod update;

pub use complete::MarkTaskAsCompleteScript;
pub use dequeue::DequeueTaskScript;
pub use enqueue::EnqueueTaskScript;
pub use enqueue_scheduled::EnqueueScheduledTasksScript;
pub use fail::RequeueTaskFailedScript;
pub use get_all::GetAllTasksScript;
pub use remove::RemoveTaskScript;
pub use retry::RequeueTaskRetryScript;
pub use update::UpdateTaskScript;
