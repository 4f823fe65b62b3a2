//! Proxy configuration
//!
//! Settings are read from `KAFKA_RELAY_*` environment variables with
//! defaults from [`crate::constants`]. Out-of-range or unparseable values
//! are fatal at startup; nothing is re-read at runtime.

use crate::constants::{
    ALL_INTERFACES, DEFAULT_ADVERTISE_PORT_SHIFT, DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT,
    DEFAULT_LISTEN_PORT, DEFAULT_MAX_FRAME_BYTES, MAX_CONFIGURABLE_FRAME_BYTES,
};
use crate::error::{RelayError, Result};

/// Configuration for one proxy instance.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Interface to bind; `None` means all interfaces
    pub listen_host: Option<String>,
    /// TCP port for the client-facing listener
    pub listen_port: u16,
    /// Upstream broker host
    pub broker_host: String,
    /// Upstream broker port
    pub broker_port: u16,
    /// Enable byte-level logging on each channel
    pub log_network: bool,
    /// Enable structured frame-level logging
    pub log_frames: bool,
    /// Maximum accepted frame size, length prefix excluded
    pub max_frame_bytes: usize,
    /// Port shift used by the default advertised-address mapping
    pub advertise_port_shift: i32,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            listen_host: None,
            listen_port: DEFAULT_LISTEN_PORT,
            broker_host: DEFAULT_BROKER_HOST.to_string(),
            broker_port: DEFAULT_BROKER_PORT,
            log_network: false,
            log_frames: false,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            advertise_port_shift: DEFAULT_ADVERTISE_PORT_SHIFT,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from `KAFKA_RELAY_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Split out from [`ProxyConfig::load`] so tests can inject values
    /// without touching the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ProxyConfig::default();
        Ok(ProxyConfig {
            listen_host: get("KAFKA_RELAY_LISTEN_HOST").filter(|h| !h.is_empty()),
            listen_port: parse_port(
                "KAFKA_RELAY_LISTEN_PORT",
                get("KAFKA_RELAY_LISTEN_PORT"),
                defaults.listen_port,
            )?,
            broker_host: get("KAFKA_RELAY_BROKER_HOST")
                .filter(|h| !h.is_empty())
                .unwrap_or(defaults.broker_host),
            broker_port: parse_port(
                "KAFKA_RELAY_BROKER_PORT",
                get("KAFKA_RELAY_BROKER_PORT"),
                defaults.broker_port,
            )?,
            log_network: parse_bool(
                "KAFKA_RELAY_LOG_NETWORK",
                get("KAFKA_RELAY_LOG_NETWORK"),
                defaults.log_network,
            )?,
            log_frames: parse_bool(
                "KAFKA_RELAY_LOG_FRAMES",
                get("KAFKA_RELAY_LOG_FRAMES"),
                defaults.log_frames,
            )?,
            max_frame_bytes: parse_frame_limit(
                "KAFKA_RELAY_MAX_FRAME_BYTES",
                get("KAFKA_RELAY_MAX_FRAME_BYTES"),
                defaults.max_frame_bytes,
            )?,
            advertise_port_shift: parse_i32(
                "KAFKA_RELAY_ADVERTISE_PORT_SHIFT",
                get("KAFKA_RELAY_ADVERTISE_PORT_SHIFT"),
                defaults.advertise_port_shift,
            )?,
        })
    }

    /// Address the listener binds to.
    pub fn listen_addr(&self) -> String {
        let host = self.listen_host.as_deref().unwrap_or(ALL_INTERFACES);
        format!("{}:{}", host, self.listen_port)
    }

    /// Address of the upstream broker.
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.broker_host, self.broker_port)
    }
}

fn parse_port(key: &str, value: Option<String>, default: u16) -> Result<u16> {
    match value {
        None => Ok(default),
        Some(raw) => match raw.parse::<u16>() {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(RelayError::invalid_config(
                key,
                format!("'{}' is not a valid TCP port", raw),
            )),
        },
    }
}

fn parse_i32(key: &str, value: Option<String>, default: i32) -> Result<i32> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse::<i32>().map_err(|_| {
            RelayError::invalid_config(key, format!("'{}' is not a valid integer", raw))
        }),
    }
}

fn parse_bool(key: &str, value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1") | Some("true") | Some("on") => Ok(true),
        Some("0") | Some("false") | Some("off") => Ok(false),
        Some(raw) => Err(RelayError::invalid_config(
            key,
            format!("'{}' is not a boolean (use true/false)", raw),
        )),
    }
}

fn parse_frame_limit(key: &str, value: Option<String>, default: usize) -> Result<usize> {
    match value {
        None => Ok(default),
        Some(raw) => match raw.parse::<usize>() {
            Ok(bytes) if bytes > 0 && bytes <= MAX_CONFIGURABLE_FRAME_BYTES => Ok(bytes),
            Ok(bytes) => Err(RelayError::invalid_config(
                key,
                format!(
                    "{} bytes is outside the supported range 1-{}",
                    bytes, MAX_CONFIGURABLE_FRAME_BYTES
                ),
            )),
            Err(_) => Err(RelayError::invalid_config(
                key,
                format!("'{}' is not a valid byte count", raw),
            )),
        },
    }
}
