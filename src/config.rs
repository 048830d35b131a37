//! Stream configuration.
//!
//! Defaults target a local PulseOps server. Every field can be overridden
//! with the `with_*` builders, and the common ones through environment
//! variables via [`StreamConfig::from_env`].

use std::time::Duration;

use crate::adapters::DEFAULT_CONNECT_TIMEOUT;
use crate::connection::{ReconnectBackoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
use crate::credentials::{Credential, DEFAULT_SIGNAL_CAPACITY};
use crate::error::ConfigError;

pub const DEFAULT_STREAM_URL: &str = "http://localhost:8080/api/stream";
pub const DEFAULT_CREDENTIAL_PARAM: &str = "apiKey";
pub const DEFAULT_CREDENTIAL_KEY: &str = "pulseops_api_key";

pub const ENV_STREAM_URL: &str = "PULSEFEED_STREAM_URL";
pub const ENV_CREDENTIAL_KEY: &str = "PULSEFEED_CREDENTIAL_KEY";
pub const ENV_BASE_DELAY_MS: &str = "PULSEFEED_BASE_DELAY_MS";
pub const ENV_MAX_DELAY_MS: &str = "PULSEFEED_MAX_DELAY_MS";

/// Configuration for the live event stream.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use pulsefeed::config::StreamConfig;
///
/// let config = StreamConfig::default()
///     .with_endpoint("https://pulse.example.com/api/stream")
///     .with_backoff(Duration::from_millis(500), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Event stream endpoint, without the credential
    pub endpoint: String,
    /// Query parameter that carries the credential
    pub credential_param: String,
    /// Credential store key holding the credential
    pub credential_key: String,
    /// First reconnect delay
    pub base_delay: Duration,
    /// Reconnect delay ceiling
    pub max_delay: Duration,
    /// Time allowed for the channel to be established
    pub connect_timeout: Duration,
    /// Buffer size of the storage change broadcast
    pub signal_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_STREAM_URL.to_string(),
            credential_param: DEFAULT_CREDENTIAL_PARAM.to_string(),
            credential_key: DEFAULT_CREDENTIAL_KEY.to_string(),
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_credential_param(mut self, param: impl Into<String>) -> Self {
        self.credential_param = param.into();
        self
    }

    pub fn with_credential_key(mut self, key: impl Into<String>) -> Self {
        self.credential_key = key.into();
        self
    }

    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_signal_capacity(mut self, capacity: usize) -> Self {
        self.signal_capacity = capacity;
        self
    }

    /// Defaults overridden by `PULSEFEED_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_STREAM_URL) {
            config.endpoint = non_empty(ENV_STREAM_URL, url)?;
        }
        if let Some(key) = lookup(ENV_CREDENTIAL_KEY) {
            config.credential_key = non_empty(ENV_CREDENTIAL_KEY, key)?;
        }
        if let Some(ms) = lookup(ENV_BASE_DELAY_MS) {
            config.base_delay = parse_millis(ENV_BASE_DELAY_MS, &ms)?;
        }
        if let Some(ms) = lookup(ENV_MAX_DELAY_MS) {
            config.max_delay = parse_millis(ENV_MAX_DELAY_MS, &ms)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the builders cannot enforce on their own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_delay > self.max_delay {
            return Err(ConfigError::InvertedBackoff {
                base_ms: self.base_delay.as_millis() as u64,
                max_ms: self.max_delay.as_millis() as u64,
            });
        }
        Ok(())
    }

    pub fn backoff(&self) -> ReconnectBackoff {
        ReconnectBackoff::with_config(self.base_delay, self.max_delay)
    }

    /// Channel URL with the URL-encoded credential appended.
    pub fn channel_url(&self, credential: &Credential) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}={}",
            self.endpoint,
            separator,
            self.credential_param,
            urlencoding::encode(credential.expose())
        )
    }
}

fn non_empty(var: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ConfigError::Empty { var })
    } else {
        Ok(trimmed.to_string())
    }
}

fn parse_millis(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidMillis {
            var,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let vars: HashMap<&'static str, String> =
            vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_stream_config_default() {
        let config = StreamConfig::default();
        assert_eq!(config.endpoint, "http://localhost:8080/api/stream");
        assert_eq!(config.credential_param, "apiKey");
        assert_eq!(config.credential_key, "pulseops_api_key");
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.signal_capacity, DEFAULT_SIGNAL_CAPACITY);
    }

    #[test]
    fn test_stream_config_builder() {
        let config = StreamConfig::new()
            .with_endpoint("https://pulse.example.com/events")
            .with_credential_param("token")
            .with_credential_key("pulse_token")
            .with_backoff(Duration::from_millis(250), Duration::from_secs(5))
            .with_connect_timeout(Duration::from_secs(3))
            .with_signal_capacity(8);

        assert_eq!(config.endpoint, "https://pulse.example.com/events");
        assert_eq!(config.credential_param, "token");
        assert_eq!(config.credential_key, "pulse_token");
        assert_eq!(config.backoff().base_delay(), Duration::from_millis(250));
        assert_eq!(config.backoff().max_delay(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.signal_capacity, 8);
    }

    #[test]
    fn test_channel_url_encodes_credential() {
        let config = StreamConfig::default();
        let credential = Credential::new("k/y+z=1 2").unwrap();

        assert_eq!(
            config.channel_url(&credential),
            "http://localhost:8080/api/stream?apiKey=k%2Fy%2Bz%3D1%202"
        );
    }

    #[test]
    fn test_channel_url_appends_to_existing_query() {
        let config = StreamConfig::default().with_endpoint("http://host/stream?v=2");
        let credential = Credential::new("abc").unwrap();

        assert_eq!(config.channel_url(&credential), "http://host/stream?v=2&apiKey=abc");
    }

    #[test]
    fn test_from_lookup_without_overrides_is_default() {
        let config = StreamConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StreamConfig::default());
    }

    #[test]
    fn test_from_lookup_applies_overrides() {
        let config = StreamConfig::from_lookup(lookup(&[
            (ENV_STREAM_URL, " https://pulse.example.com/api/stream "),
            (ENV_CREDENTIAL_KEY, "other_key"),
            (ENV_BASE_DELAY_MS, "200"),
            (ENV_MAX_DELAY_MS, "5000"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "https://pulse.example.com/api/stream");
        assert_eq!(config.credential_key, "other_key");
        assert_eq!(config.base_delay, Duration::from_millis(200));
        assert_eq!(config.max_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = StreamConfig::from_lookup(lookup(&[(ENV_BASE_DELAY_MS, "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidMillis {
                var: ENV_BASE_DELAY_MS,
                value: "soon".to_string()
            }
        );

        let err = StreamConfig::from_lookup(lookup(&[(ENV_STREAM_URL, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Empty { var: ENV_STREAM_URL });

        let err = StreamConfig::from_lookup(lookup(&[
            (ENV_BASE_DELAY_MS, "10000"),
            (ENV_MAX_DELAY_MS, "1000"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvertedBackoff {
                base_ms: 10_000,
                max_ms: 1_000
            }
        );
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        std::env::set_var(ENV_CREDENTIAL_KEY, "env_key");
        std::env::set_var(ENV_MAX_DELAY_MS, "60000");

        let config = StreamConfig::from_env();

        std::env::remove_var(ENV_CREDENTIAL_KEY);
        std::env::remove_var(ENV_MAX_DELAY_MS);

        let config = config.unwrap();
        assert_eq!(config.credential_key, "env_key");
        assert_eq!(config.max_delay, Duration::from_secs(60));
    }
}
