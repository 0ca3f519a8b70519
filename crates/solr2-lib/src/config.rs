//! Server configuration: TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::UsbSettings;
use crate::engine::EngineSettings;
use crate::protocol::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address. Default: "0.0.0.0".
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port. Default: 8766.
    #[serde(default = "default_port")]
    pub port: u16,

    /// USB interface carrying the LED endpoint.
    #[serde(default = "default_usb_interface")]
    pub usb_interface: u8,

    /// Interrupt OUT endpoint address (bit 7 clear).
    #[serde(default = "default_usb_endpoint")]
    pub usb_endpoint: u8,

    /// Bound on a single USB write.
    #[serde(default = "default_usb_timeout_ms")]
    pub usb_timeout_ms: u64,

    /// Sleep after each packet. 0 disables.
    #[serde(default)]
    pub tx_delay_ms: u64,

    /// Times each packet is written.
    #[serde(default = "default_repeat")]
    pub repeat: u32,

    /// Entries per packet (1..=15).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Log packets instead of writing to USB.
    #[serde(default)]
    pub dry_run: bool,

    /// Debug-level logging.
    #[serde(default)]
    pub debug: bool,

    /// Streaming tick. 0 disables streaming.
    #[serde(default)]
    pub stream_interval_ms: u64,

    /// Streaming idles after this long without commands, unless an effect
    /// is running. 0 never idles.
    #[serde(default = "default_stream_idle_timeout_ms")]
    pub stream_idle_timeout_ms: u64,
}

fn default_host() -> String {
    DEFAULT_LISTEN_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_usb_interface() -> u8 {
    DEFAULT_USB_INTERFACE
}
fn default_usb_endpoint() -> u8 {
    DEFAULT_USB_ENDPOINT
}
fn default_usb_timeout_ms() -> u64 {
    DEFAULT_USB_TIMEOUT_MS
}
fn default_repeat() -> u32 {
    1
}
fn default_max_entries() -> usize {
    MAX_ENTRIES_PER_PACKET
}
fn default_stream_idle_timeout_ms() -> u64 {
    DEFAULT_STREAM_IDLE_TIMEOUT_MS
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            usb_interface: default_usb_interface(),
            usb_endpoint: default_usb_endpoint(),
            usb_timeout_ms: default_usb_timeout_ms(),
            tx_delay_ms: 0,
            repeat: default_repeat(),
            max_entries: default_max_entries(),
            dry_run: false,
            debug: false,
            stream_interval_ms: 0,
            stream_idle_timeout_ms: default_stream_idle_timeout_ms(),
        }
    }
}

/// Validation errors that [`ServerConfig::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    ZeroRepeat,
    MaxEntriesOutOfRange(usize),
    /// The endpoint has the IN direction bit set.
    NotAnOutEndpoint(u8),
    ZeroPort,
    ZeroUsbTimeout,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ZeroRepeat => write!(f, "repeat must be at least 1"),
            ValidationError::MaxEntriesOutOfRange(n) => write!(
                f,
                "max_entries must be within 1..={MAX_ENTRIES_PER_PACKET} (got {n})"
            ),
            ValidationError::NotAnOutEndpoint(ep) => {
                write!(f, "usb_endpoint 0x{ep:02X} is not an OUT endpoint")
            }
            ValidationError::ZeroPort => write!(f, "port cannot be 0"),
            ValidationError::ZeroUsbTimeout => write!(f, "usb_timeout_ms cannot be 0"),
        }
    }
}

impl ServerConfig {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("solr2"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all problems found.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.repeat == 0 {
            errors.push(ValidationError::ZeroRepeat);
        }
        if !(1..=MAX_ENTRIES_PER_PACKET).contains(&self.max_entries) {
            errors.push(ValidationError::MaxEntriesOutOfRange(self.max_entries));
        }
        if self.usb_endpoint & 0x80 != 0 {
            errors.push(ValidationError::NotAnOutEndpoint(self.usb_endpoint));
        }
        if self.port == 0 {
            errors.push(ValidationError::ZeroPort);
        }
        if self.usb_timeout_ms == 0 {
            errors.push(ValidationError::ZeroUsbTimeout);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// `host:port` for binding.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn usb_settings(&self) -> UsbSettings {
        UsbSettings {
            interface: self.usb_interface,
            endpoint: self.usb_endpoint,
            timeout: Duration::from_millis(self.usb_timeout_ms),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_entries: self.max_entries,
            stream_interval: Duration::from_millis(self.stream_interval_ms),
            idle_timeout: Duration::from_millis(self.stream_idle_timeout_ms),
        }
    }

    pub fn tx_delay(&self) -> Duration {
        Duration::from_millis(self.tx_delay_ms)
    }
}

/// Parse an endpoint address given as `0x02` or `2`.
pub fn parse_endpoint(s: &str) -> std::result::Result<u8, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|_| format!("invalid endpoint '{s}' (use e.g. 0x02 or 2)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Defaults ──

    #[test]
    fn defaults() {
        let c = ServerConfig::default();
        assert_eq!(c.host, "0.0.0.0");
        assert_eq!(c.port, 8766);
        assert_eq!(c.usb_interface, 1);
        assert_eq!(c.usb_endpoint, 0x02);
        assert_eq!(c.usb_timeout_ms, 1000);
        assert_eq!(c.tx_delay_ms, 0);
        assert_eq!(c.repeat, 1);
        assert_eq!(c.max_entries, 15);
        assert!(!c.dry_run);
        assert!(!c.debug);
        assert_eq!(c.stream_interval_ms, 0);
        assert_eq!(c.stream_idle_timeout_ms, 3000);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c: ServerConfig = toml::from_str("port = 9000\nstream_interval_ms = 20").unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.stream_interval_ms, 20);
        assert_eq!(c.host, "0.0.0.0");
        assert_eq!(c.max_entries, 15);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let c: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(c, ServerConfig::default());
    }

    #[test]
    fn wrong_type_toml_is_error() {
        let result: std::result::Result<ServerConfig, _> = toml::from_str("port = \"high\"");
        assert!(result.is_err());
    }

    // ── Persistence ──

    #[test]
    fn missing_file_gives_defaults_without_warning() {
        let dir = tempfile::tempdir().unwrap();
        let (c, warnings) = ServerConfig::load_from(&dir.path().join("absent.toml"));
        assert_eq!(c, ServerConfig::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn malformed_file_gives_defaults_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is { not valid toml").unwrap();
        let (c, warnings) = ServerConfig::load_from(&path);
        assert_eq!(c, ServerConfig::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("config parse error"));
    }

    #[test]
    fn config_path_ends_with_toml() {
        if let Some(p) = ServerConfig::path() {
            assert!(p.ends_with("solr2/config.toml"));
        }
    }

    // ── Validation ──

    #[test]
    fn validate_collects_all_errors() {
        let c = ServerConfig {
            repeat: 0,
            max_entries: 16,
            usb_endpoint: 0x81,
            port: 0,
            usb_timeout_ms: 0,
            ..ServerConfig::default()
        };
        let errors = c.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroRepeat,
                ValidationError::MaxEntriesOutOfRange(16),
                ValidationError::NotAnOutEndpoint(0x81),
                ValidationError::ZeroPort,
                ValidationError::ZeroUsbTimeout,
            ]
        );
    }

    #[test]
    fn validate_zero_max_entries() {
        let c = ServerConfig {
            max_entries: 0,
            ..ServerConfig::default()
        };
        assert_eq!(
            c.validate().unwrap_err()[0].to_string(),
            "max_entries must be within 1..=15 (got 0)"
        );
    }

    // ── Conversions ──

    #[test]
    fn derived_settings() {
        let c = ServerConfig {
            host: "127.0.0.1".into(),
            usb_timeout_ms: 250,
            stream_interval_ms: 20,
            ..ServerConfig::default()
        };
        assert_eq!(c.listen_addr(), "127.0.0.1:8766");
        assert_eq!(c.usb_settings().timeout, Duration::from_millis(250));
        assert_eq!(c.engine_settings().stream_interval, Duration::from_millis(20));
        assert_eq!(c.engine_settings().idle_timeout, Duration::from_millis(3000));
    }

    #[test]
    fn parse_endpoint_forms() {
        assert_eq!(parse_endpoint("0x02"), Ok(2));
        assert_eq!(parse_endpoint("0X81"), Ok(0x81));
        assert_eq!(parse_endpoint("2"), Ok(2));
        assert!(parse_endpoint("0x100").is_err());
        assert!(parse_endpoint("ep2").is_err());
    }
}
