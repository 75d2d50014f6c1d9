use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const QUEUE_DEFAULT: &str = "default";

/// Maximum number of retries a `ONCE` task gets before it is dead-lettered.
pub const MAX_RETRY: u32 = 3;

/// Handler selector. `Unknown` is the distinguished parse-failure sentinel --
/// it is never assigned to a stored task, only returned from a failed parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Name {
    Unknown,
    Email,
    Foo,
}

impl Name {
    pub fn as_str(&self) -> &'static str {
        match self {
            Name::Unknown => panic!("task name unknown"),
            Name::Email => "EMAIL",
            Name::Foo => "FOO",
        }
    }

    pub fn parse(name: &str) -> Result<Name> {
        match name.to_uppercase().as_str() {
            "EMAIL" => Ok(Name::Email),
            "FOO" => Ok(Name::Foo),
            _ => Err(Error::BadName(name.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Running,
    Succeeded,
    Failed,
    Retry,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Succeeded => "succeeded",
            Status::Failed => "failed",
            Status::Retry => "retry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Type {
    Once,
    Recurring,
}

impl Type {
    pub fn as_str(&self) -> &'static str {
        match self {
            Type::Once => "ONCE",
            Type::Recurring => "RECURRING",
        }
    }

    pub fn parse(t: &str) -> Result<Type> {
        match t.to_uppercase().as_str() {
            "ONCE" => Ok(Type::Once),
            "RECURRING" => Ok(Type::Recurring),
            _ => Err(Error::BadType(t.to_string())),
        }
    }
}

/// A submitted task, as received from a management collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub period: String,
    pub payload: Vec<u8>,
}

/// The unit of work, and the authoritative stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub name: Name,
    pub queue: String,
    pub status: Status,
    #[serde(rename = "type")]
    pub task_type: Type,
    #[serde(with = "serde_millis")]
    pub period: Duration,
    pub payload: Vec<u8>,
    pub result: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub pending_since: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub num_retries: u32,
    pub max_retries: u32,
    pub error: Option<String>,
}

impl Message {
    /// Validates the request and constructs a new, unpersisted message in
    /// `PENDING` status on the default queue.
    pub fn new_from_request(req: &Request, now: DateTime<Utc>) -> Result<Message> {
        let name = Name::parse(&req.name)?;
        let task_type = Type::parse(&req.task_type)?;
        let period = parse_period(&req.period, task_type)?;

        Ok(Message {
            id: Uuid::new_v4().to_string(),
            name,
            queue: QUEUE_DEFAULT.to_string(),
            status: Status::Pending,
            task_type,
            period,
            payload: req.payload.clone(),
            result: None,
            created_at: now,
            pending_since: now,
            completed_at: None,
            failed_at: None,
            num_retries: 0,
            max_retries: MAX_RETRY,
            error: None,
        })
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(encoded: &str) -> Result<Message> {
        Ok(serde_json::from_str(encoded)?)
    }
}

fn parse_period(raw: &str, task_type: Type) -> Result<Duration> {
    if raw.is_empty() {
        return Ok(Duration::from_millis(0));
    }
    let raw_trim = raw.trim();
    let millis: u64 = if let Some(digits) = raw_trim.strip_suffix("ms") {
        digits
            .parse()
            .map_err(|_| Error::BadPeriod(raw.to_string()))?
    } else if let Some(digits) = raw_trim.strip_suffix('s') {
        digits
            .parse::<u64>()
            .map_err(|_| Error::BadPeriod(raw.to_string()))?
            * 1000
    } else {
        return Err(Error::BadPeriod(raw.to_string()));
    };

    let period = Duration::from_millis(millis);
    if task_type == Type::Recurring && period < Duration::from_secs(1) {
        return Err(Error::BadPeriod(raw.to_string()));
    }
    Ok(period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.ymd(2021, 1, 1).and_hms(0, 0, 0)
    }

    #[test]
    fn builds_message_from_valid_request() {
        let req = Request {
            name: "email".to_string(),
            task_type: "once".to_string(),
            period: "".to_string(),
            payload: br#"{"to":"a@b.com"}"#.to_vec(),
        };
        let msg = Message::new_from_request(&req, now()).unwrap();
        assert_eq!(msg.name, Name::Email);
        assert_eq!(msg.task_type, Type::Once);
        assert_eq!(msg.status, Status::Pending);
        assert_eq!(msg.max_retries, MAX_RETRY);
        assert_eq!(msg.num_retries, 0);
    }

    #[test]
    fn rejects_unknown_name() {
        let req = Request {
            name: "bogus".to_string(),
            task_type: "once".to_string(),
            period: "".to_string(),
            payload: vec![],
        };
        assert!(matches!(
            Message::new_from_request(&req, now()),
            Err(Error::BadName(_))
        ));
    }

    #[test]
    fn rejects_recurring_period_under_one_second() {
        let req = Request {
            name: "foo".to_string(),
            task_type: "recurring".to_string(),
            period: "500ms".to_string(),
            payload: vec![],
        };
        assert!(matches!(
            Message::new_from_request(&req, now()),
            Err(Error::BadPeriod(_))
        ));
    }

    #[test]
    fn encode_decode_round_trips() {
        let req = Request {
            name: "foo".to_string(),
            task_type: "recurring".to_string(),
            period: "2s".to_string(),
            payload: br#"{"bar":1}"#.to_vec(),
        };
        let msg = Message::new_from_request(&req, now()).unwrap();
        let encoded = msg.encode().unwrap();
        let decoded = Message::decode(&encoded).unwrap();
        assert_eq!(decoded.id, msg.id);
        assert_eq!(decoded.name, msg.name);
        assert_eq!(decoded.period, msg.period);
    }
}
