use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::error::AppError;

/// Policy applied when an inbound frame fails to decode as a message
/// envelope. Both are valid deployments; `BroadcastVerbatim` keeps
/// compatibility with clients that speak plain text, `Drop` keeps the wire
/// strictly structured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Rebroadcast the raw payload, unchanged, to every other open
    /// connection.
    BroadcastVerbatim,
    /// Log the failure and discard the frame.
    Drop,
}

impl DecodePolicy {
    fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "broadcast" => Ok(Self::BroadcastVerbatim),
            "drop" => Ok(Self::Drop),
            other => Err(AppError::Config(format!(
                "DECODE_POLICY must be 'broadcast' or 'drop', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Period between heartbeat cycles.
    pub heartbeat_interval: Duration,
    /// How long a session may go without a liveness response before it is
    /// evicted.
    pub liveness_window: Duration,
    pub decode_policy: DecodePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let heartbeat_interval = duration_from_env("HEARTBEAT_INTERVAL_SECS", 30);
        let liveness_window = duration_from_env("LIVENESS_WINDOW_SECS", 60);

        let decode_policy = match env::var("DECODE_POLICY") {
            Ok(value) => DecodePolicy::parse(&value)?,
            Err(_) => DecodePolicy::BroadcastVerbatim,
        };

        Ok(Self {
            port,
            heartbeat_interval,
            liveness_window,
            decode_policy,
        })
    }
}

fn duration_from_env(key: &str, default_secs: u64) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_policy_parses_known_values() {
        assert_eq!(
            DecodePolicy::parse("broadcast").unwrap(),
            DecodePolicy::BroadcastVerbatim
        );
        assert_eq!(DecodePolicy::parse("drop").unwrap(), DecodePolicy::Drop);
        // Case and surrounding whitespace are forgiven.
        assert_eq!(
            DecodePolicy::parse(" Broadcast ").unwrap(),
            DecodePolicy::BroadcastVerbatim
        );
    }

    #[test]
    fn decode_policy_rejects_unknown_values() {
        let err = DecodePolicy::parse("reject").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn duration_falls_back_to_default() {
        let d = duration_from_env("RELAY_TEST_UNSET_DURATION", 30);
        assert_eq!(d, Duration::from_secs(30));
    }
}
