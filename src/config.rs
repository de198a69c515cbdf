use std::{net::SocketAddr, str::FromStr, time::Duration};

use crate::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.confluent.cloud";

/// Settings read once at startup
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Base URL of the Confluent Cloud API
    pub api_url: String,

    /// Address of the metrics and health server
    pub listen_addr: SocketAddr,

    /// How long a settled resource waits before it is checked again
    pub resync_interval: Duration,

    /// How long a failed resource waits before the next attempt
    pub error_requeue: Duration,

    /// Upper bound for a single remote request
    pub request_timeout: Duration,

    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{other}`, expected `compact` or `json`")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            resync_interval: Duration::from_secs(300),
            error_requeue: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            log_format: LogFormat::Compact,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = match get("CONFLUENT_API_URL") {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.trim_end_matches('/').to_owned()
            }
            Some(url) => {
                return Err(Error::Config {
                    key: "CONFLUENT_API_URL",
                    reason: format!("`{url}` is not an http(s) URL"),
                })
            }
            None => defaults.api_url,
        };

        Ok(Self {
            api_url,
            listen_addr: parse(&get, "LISTEN_ADDR")?.unwrap_or(defaults.listen_addr),
            resync_interval: seconds(&get, "RESYNC_INTERVAL_SECS")?.unwrap_or(defaults.resync_interval),
            error_requeue: seconds(&get, "ERROR_REQUEUE_SECS")?.unwrap_or(defaults.error_requeue),
            request_timeout: seconds(&get, "REQUEST_TIMEOUT_SECS")?.unwrap_or(defaults.request_timeout),
            log_format: parse(&get, "LOG_FORMAT")?.unwrap_or(defaults.log_format),
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| Error::Config {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn seconds(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<Duration>> {
    match parse::<u64>(get, key)? {
        Some(0) => Err(Error::Config {
            key,
            reason: "must be at least one second".into(),
        }),
        secs => Ok(secs.map(Duration::from_secs)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn unset_keys_use_defaults() {
        assert_eq!(from_pairs(&[]).unwrap(), Config::default());
    }

    #[test]
    fn values_are_parsed() {
        let config = from_pairs(&[
            ("CONFLUENT_API_URL", "http://localhost:9000/"),
            ("LISTEN_ADDR", "127.0.0.1:9090"),
            ("RESYNC_INTERVAL_SECS", "60"),
            ("ERROR_REQUEUE_SECS", " 5 "),
            ("REQUEST_TIMEOUT_SECS", "10"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();

        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.listen_addr, SocketAddr::from(([127, 0, 0, 1], 9090)));
        assert_eq!(config.resync_interval, Duration::from_secs(60));
        assert_eq!(config.error_requeue, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn empty_values_count_as_unset() {
        assert_eq!(from_pairs(&[("LISTEN_ADDR", "")]).unwrap(), Config::default());
    }

    #[test]
    fn invalid_values_name_their_key() {
        for (key, value) in [
            ("RESYNC_INTERVAL_SECS", "soon"),
            ("ERROR_REQUEUE_SECS", "0"),
            ("LISTEN_ADDR", "localhost"),
            ("CONFLUENT_API_URL", "api.confluent.cloud"),
            ("LOG_FORMAT", "yaml"),
        ] {
            match from_pairs(&[(key, value)]) {
                Err(Error::Config { key: reported, .. }) => assert_eq!(reported, key),
                other => panic!("{key}={value} should be rejected, got {other:?}"),
            }
        }
    }
}
