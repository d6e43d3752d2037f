//! Configuration types for the mimic proxy.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,

    /// Name of the cookie carrying the client id. The value is opaque to the
    /// engine; it is only used as the rule-store and event-addressing key.
    #[serde(default = "default_client_cookie")]
    pub client_cookie: String,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Total timeout for one outbound request, seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Redirects followed transparently before the forward fails.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Capacity of each per-client broadcast channel. Slow observers that
    /// fall further behind than this lose oldest events first.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_client_cookie() -> String {
    "__mcid".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            client_cookie: default_client_cookie(),
            upstream: UpstreamConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.client_cookie.is_empty() {
            anyhow::bail!("client_cookie must not be empty");
        }
        if self.upstream.timeout_secs == 0 {
            anyhow::bail!("upstream.timeout_secs must be positive");
        }
        if self.events.channel_capacity == 0 {
            anyhow::bail!("events.channel_capacity must be positive");
        }
        Ok(())
    }
}
