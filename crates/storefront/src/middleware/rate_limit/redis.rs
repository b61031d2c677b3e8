//! Sliding-window limiter on a hosted Redis REST API (Upstash-compatible).
//!
//! Each check is one `/pipeline` request: read the previous window's
//! counter, increment the current one, and refresh its expiry. The decision
//! is made locally from the two counts. Rejected requests are counted too,
//! so a client that keeps hammering stays limited.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use super::window::{RateLimitOutcome, SlidingWindow};
use crate::config::RedisRestConfig;

/// Upper bound on a limiter round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

const KEY_PREFIX: &str = "animart:ratelimit";

/// Errors talking to the Redis REST API.
#[derive(Debug, Error)]
pub enum RedisRestError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("redis error: {0}")]
    Command(String),

    #[error("unexpected response: {0}")]
    Response(String),
}

#[derive(Debug, Deserialize)]
struct CommandResult {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Redis REST sliding-window limiter.
#[derive(Clone)]
pub struct RedisRestLimiter {
    client: Client,
    pipeline_url: Url,
    token: SecretString,
}

impl std::fmt::Debug for RedisRestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRestLimiter")
            .field("pipeline_url", &self.pipeline_url.as_str())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RedisRestLimiter {
    /// Create a limiter sharing the application's HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the pipeline URL cannot be derived.
    pub fn new(client: Client, config: &RedisRestConfig) -> Result<Self, url::ParseError> {
        let mut base = config.url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client,
            pipeline_url: base.join("pipeline")?,
            token: config.token.clone(),
        })
    }

    /// Count a request for `identifier` and decide whether it may proceed.
    ///
    /// # Errors
    ///
    /// Returns `RedisRestError` if the API is unreachable, slow, or replies
    /// with something other than the expected counters.
    #[instrument(skip(self, window), fields(limit = window.limit))]
    pub async fn check(
        &self,
        class: &str,
        identifier: &str,
        window: &SlidingWindow,
        now_ms: u64,
    ) -> Result<RateLimitOutcome, RedisRestError> {
        let index = window.index(now_ms);
        let current_key = counter_key(class, identifier, index);
        let previous_key = counter_key(class, identifier, index.saturating_sub(1));

        let commands = serde_json::json!([
            ["GET", previous_key],
            ["INCR", current_key],
            ["PEXPIRE", current_key, window.counter_ttl_ms().to_string()],
        ]);

        let results: Vec<CommandResult> = self
            .client
            .post(self.pipeline_url.clone())
            .bearer_auth(self.token.expose_secret())
            .timeout(REQUEST_TIMEOUT)
            .json(&commands)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let (previous, current) = parse_counts(&results)?;
        Ok(window.evaluate(previous, current, now_ms))
    }
}

fn counter_key(class: &str, identifier: &str, index: u64) -> String {
    format!("{KEY_PREFIX}:{class}:{identifier}:{index}")
}

/// Extract `(previous, current)` from the pipeline's GET and INCR replies.
fn parse_counts(results: &[CommandResult]) -> Result<(u64, u64), RedisRestError> {
    if let Some(err) = results.iter().find_map(|r| r.error.as_deref()) {
        return Err(RedisRestError::Command(err.to_owned()));
    }
    let [get, incr, ..] = results else {
        return Err(RedisRestError::Response(format!(
            "expected 3 results, got {}",
            results.len()
        )));
    };

    let previous = match &get.result {
        Value::Null => 0,
        Value::String(s) => s
            .parse()
            .map_err(|_| RedisRestError::Response(format!("non-numeric counter {s:?}")))?,
        Value::Number(n) => n.as_u64().unwrap_or(0),
        other => return Err(RedisRestError::Response(format!("GET returned {other}"))),
    };
    let current = incr
        .result
        .as_u64()
        .ok_or_else(|| RedisRestError::Response(format!("INCR returned {}", incr.result)))?;

    Ok((previous, current))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn results(json: &str) -> Vec<CommandResult> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_counts_missing_previous() {
        let r = results(r#"[{"result":null},{"result":1},{"result":1}]"#);
        assert_eq!(parse_counts(&r).unwrap(), (0, 1));
    }

    #[test]
    fn test_parse_counts_string_previous() {
        let r = results(r#"[{"result":"12"},{"result":4},{"result":1}]"#);
        assert_eq!(parse_counts(&r).unwrap(), (12, 4));
    }

    #[test]
    fn test_parse_counts_reports_command_error() {
        let r = results(r#"[{"result":null},{"error":"WRONGTYPE"},{"result":0}]"#);
        assert!(matches!(
            parse_counts(&r),
            Err(RedisRestError::Command(e)) if e == "WRONGTYPE"
        ));
    }

    #[test]
    fn test_parse_counts_short_reply() {
        let r = results(r#"[{"result":null}]"#);
        assert!(matches!(parse_counts(&r), Err(RedisRestError::Response(_))));
    }

    #[test]
    fn test_pipeline_url_keeps_base_path() {
        let config = RedisRestConfig {
            url: Url::parse("https://eu1.upstash.io/db").unwrap(),
            token: SecretString::from("AXk3Jq9LmP2vR8tZ"),
        };
        let limiter = RedisRestLimiter::new(Client::new(), &config).unwrap();
        assert_eq!(
            limiter.pipeline_url.as_str(),
            "https://eu1.upstash.io/db/pipeline"
        );
    }

    #[test]
    fn test_counter_key_layout() {
        assert_eq!(
            counter_key("auth", "203.0.113.9", 42),
            "animart:ratelimit:auth:203.0.113.9:42"
        );
    }
}
