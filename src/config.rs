use std::time::Duration;

use crate::error::{Error, Result};

/// Environment-variable-driven configuration, read once at startup.
///
/// Mirrors the shape of the original `config.API` (a flat `Get(key) ->
/// string`) but exposes typed accessors the way this crate's other
/// components expect, following `envoption::with_default`'s pattern of
/// parse-with-fallback rather than a stringly interface throughout.
#[derive(Clone, Debug)]
pub struct Config {
    pub worker_concurrency: u32,
    pub worker_task_deadline: Duration,
    pub scheduler_tick: Duration,
    pub log_level: String,
    pub redis_url: String,
    pub manager_port: u16,
}

impl Config {
    /// Reads configuration from the process environment. `REDIS_URL` is the
    /// only variable without a default; everything else falls back to the
    /// values the original source hardcodes.
    pub fn from_env() -> Result<Self> {
        let redis_url =
            std::env::var("REDIS_URL").map_err(|_| Error::EnvOptionError("REDIS_URL".into()))?;
        let worker_concurrency: u32 = envoption::with_default("WORKER_CONCURRENCY", 10u32)?;
        let manager_port: u16 = envoption::with_default("MANAGER_PORT", 8080u16)?;
        let log_level: String =
            envoption::with_default("LOG_LEVEL", "info".to_string())?;

        let worker_task_deadline = parse_duration_env("WORKER_TASK_DEADLINE", "30s")?;
        let scheduler_tick = parse_duration_env("SCHEDULER_TICK", "1s")?;

        Ok(Config {
            worker_concurrency,
            worker_task_deadline,
            scheduler_tick,
            log_level,
            redis_url,
            manager_port,
        })
    }
}

/// Parses the handful of duration suffixes this crate's config actually
/// uses (`s`, `ms`) -- a minimal stand-in for the original's duration
/// strings, since nothing in the teacher's stack pulls in a general-purpose
/// duration-parsing crate.
fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Some(digits) = raw.strip_suffix("ms") {
        let millis: u64 = digits
            .parse()
            .map_err(|_| Error::EnvOptionError(format!("bad duration {:?}", raw)))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(digits) = raw.strip_suffix('s') {
        let secs: u64 = digits
            .parse()
            .map_err(|_| Error::EnvOptionError(format!("bad duration {:?}", raw)))?;
        return Ok(Duration::from_secs(secs));
    }
    Err(Error::EnvOptionError(format!(
        "duration {:?} must end in 's' or 'ms'",
        raw
    )))
}

fn parse_duration_env(key: &str, default: &str) -> Result<Duration> {
    let raw: String = envoption::with_default(key, default.to_string())?;
    parse_duration(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds_and_millis() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn rejects_unsuffixed_duration() {
        assert!(parse_duration("30").is_err());
    }
}
