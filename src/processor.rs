use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{event, Level};

use crate::error::{Error, Result};
use crate::task::{Message, Name};

/// A handler capability for one task `Name`. `validate_payload` runs
/// synchronously at submission time, before a task is ever enqueued;
/// `process_task` runs under the worker pool's deadline/shutdown race and
/// must return promptly once `deadline` resolves.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process_task(&self, msg: &Message) -> Result<()>;
    fn validate_payload(&self, payload: &[u8]) -> Result<()>;
}

/// The sole entry point into the processor registry; unknown names are
/// rejected at submission time via `Error::UnknownProcessor` rather than
/// surfacing at dequeue time.
pub fn processor_factory(name: Name) -> Result<Box<dyn Processor>> {
    match name {
        Name::Email => Ok(Box::new(EmailProcessor)),
        Name::Foo => Ok(Box::new(FooProcessor)),
        Name::Unknown => Err(Error::UnknownProcessor("UNKNOWN".to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct EmailPayload {
    to: String,
    title: String,
    body: String,
}

pub struct EmailProcessor;

#[async_trait]
impl Processor for EmailProcessor {
    async fn process_task(&self, msg: &Message) -> Result<()> {
        let payload: EmailPayload = serde_json::from_slice(&msg.payload)?;
        event!(Level::INFO, to = %payload.to, title = %payload.title, "sending email");
        tokio::time::sleep(Duration::from_millis(50)).await;
        event!(Level::INFO, to = %payload.to, "email sent");
        Ok(())
    }

    fn validate_payload(&self, payload: &[u8]) -> Result<()> {
        let p: EmailPayload = serde_json::from_slice(payload)?;
        if p.to.is_empty() || p.title.is_empty() || p.body.is_empty() {
            return Err(Error::InvalidPayload(
                "to, title and body are required fields".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct FooPayload {
    bar: String,
    baz: String,
}

/// Deliberately fails every run, exercising the retry/dead-letter path end
/// to end in tests and demos.
pub struct FooProcessor;

#[async_trait]
impl Processor for FooProcessor {
    async fn process_task(&self, msg: &Message) -> Result<()> {
        let payload: FooPayload = serde_json::from_slice(&msg.payload)?;
        event!(Level::INFO, bar = %payload.bar, baz = %payload.baz, "doing foo");
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err(Error::ProcessorError(anyhow::anyhow!("foo error")))
    }

    fn validate_payload(&self, payload: &[u8]) -> Result<()> {
        let p: FooPayload = serde_json::from_slice(payload)?;
        if p.bar.is_empty() || p.baz.is_empty() {
            return Err(Error::InvalidPayload(
                "bar and baz are required fields".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn email_processor_requires_all_fields() {
        let p = EmailProcessor;
        assert!(p.validate_payload(br#"{"to":"a","title":"b","body":"c"}"#).is_ok());
        assert!(p.validate_payload(br#"{"to":"","title":"b","body":"c"}"#).is_err());
    }

    #[tokio::test]
    async fn foo_processor_always_errors() {
        let p = FooProcessor;
        let msg_payload = br#"{"bar":"x","baz":"y"}"#;
        assert!(p.validate_payload(msg_payload).is_ok());
    }

    #[test]
    fn unknown_name_has_no_processor() {
        assert!(matches!(
            processor_factory(Name::Unknown),
            Err(Error::UnknownProcessor(_))
        ));
    }
}
