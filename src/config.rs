use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::blacklist::Blacklist;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:1053";
pub const DEFAULT_UPSTREAM: &str = "8.8.8.8:53";
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    FileRead(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// How a blacklisted query is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum BlockMode {
    #[default]
    Nxdomain,
    Refused,
    Redirect,
}

impl From<&str> for BlockMode {
    /// Unknown names fall back to NXDOMAIN
    fn from(value: &str) -> Self {
        match value {
            "refused" => BlockMode::Refused,
            "redirect" => BlockMode::Redirect,
            _ => BlockMode::Nxdomain,
        }
    }
}

impl From<serde_json::Value> for BlockMode {
    /// Non-string values (null, numbers, ...) also fall back to NXDOMAIN
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(name) => BlockMode::from(name.as_str()),
            _ => BlockMode::Nxdomain,
        }
    }
}

impl fmt::Display for BlockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockMode::Nxdomain => "nxdomain",
            BlockMode::Refused => "refused",
            BlockMode::Redirect => "redirect",
        };
        f.write_str(name)
    }
}

/// The config file as written on disk, before validation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub listen: Option<String>,
    pub upstream: Option<String>,
    pub mode: BlockMode,
    pub blacklist: Vec<String>,
    pub redirect_ip: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_inflight: Option<usize>,
    pub log_level: Option<String>,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub listen: Option<String>,
    pub upstream: Option<String>,
    pub mode: Option<BlockMode>,
    pub log_level: Option<String>,
}

/// Validated proxy configuration, immutable once the server starts
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub listen: SocketAddr,
    pub upstream: SocketAddr,
    pub mode: BlockMode,
    pub blacklist: Blacklist,
    /// Address handed out in redirect mode
    pub redirect_ip: Ipv4Addr,
    pub upstream_timeout: Duration,
    pub max_inflight: Option<usize>,
    pub log_level: String,
}

impl RawConfig {
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read a config file. A missing file is only tolerated when the caller
    /// did not name it explicitly.
    pub fn from_file(path: &Path, required: bool) -> Result<Self, ConfigError> {
        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.display().to_string(), e.to_string()))?;
        Self::from_json(&contents)
    }

    pub fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(listen) = overrides.listen {
            self.listen = Some(listen);
        }
        if let Some(upstream) = overrides.upstream {
            self.upstream = Some(upstream);
        }
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = Some(level);
        }
    }

    pub fn validate(self) -> Result<ProxyConfig, ConfigError> {
        let listen = resolve_addr("listen", self.listen.as_deref().unwrap_or(DEFAULT_LISTEN))?;
        let upstream =
            resolve_addr("upstream", self.upstream.as_deref().unwrap_or(DEFAULT_UPSTREAM))?;

        let redirect_ip = match self.redirect_ip.as_deref() {
            Some(ip) => ip.parse().map_err(|_| {
                ConfigError::Validation(format!("redirect_ip `{}` is not an IPv4 address", ip))
            })?,
            None => Ipv4Addr::LOCALHOST,
        };

        let timeout_ms = self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.max_inflight == Some(0) {
            return Err(ConfigError::Validation(
                "max_inflight must be greater than 0".to_string(),
            ));
        }

        Ok(ProxyConfig {
            listen,
            upstream,
            mode: self.mode,
            blacklist: Blacklist::new(&self.blacklist),
            redirect_ip,
            upstream_timeout: Duration::from_millis(timeout_ms),
            max_inflight: self.max_inflight,
            log_level: self.log_level.unwrap_or_else(|| "info".to_string()),
        })
    }
}

impl ProxyConfig {
    /// Load, override and validate in one go
    pub fn load(path: &Path, required: bool, overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut raw = RawConfig::from_file(path, required)?;
        raw.apply_cli_overrides(overrides);
        raw.validate()
    }
}

fn resolve_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .to_socket_addrs()
        .map_err(|e| ConfigError::Validation(format!("{} `{}`: {}", field, value, e)))?
        .next()
        .ok_or_else(|| ConfigError::Validation(format!("{} `{}` resolved to nothing", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RawConfig::from_json("{}").unwrap().validate().unwrap();
        assert_eq!(config.listen, "0.0.0.0:1053".parse().unwrap());
        assert_eq!(config.upstream, "8.8.8.8:53".parse().unwrap());
        assert_eq!(config.mode, BlockMode::Nxdomain);
        assert!(config.blacklist.is_empty());
        assert_eq!(config.redirect_ip, Ipv4Addr::LOCALHOST);
        assert_eq!(config.upstream_timeout, Duration::from_secs(3));
        assert_eq!(config.max_inflight, None);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_full_config() {
        let json = r#"{
            "listen": "127.0.0.1:5353",
            "upstream": "1.1.1.1:53",
            "mode": "redirect",
            "blacklist": ["tracker.test", "ads.example.com"],
            "redirect_ip": "10.0.0.1",
            "timeout_ms": 500,
            "max_inflight": 64
        }"#;
        let config = RawConfig::from_json(json).unwrap().validate().unwrap();
        assert_eq!(config.listen, "127.0.0.1:5353".parse().unwrap());
        assert_eq!(config.mode, BlockMode::Redirect);
        assert_eq!(config.blacklist.len(), 2);
        assert!(config.blacklist.is_blocked("x.tracker.test"));
        assert_eq!(config.redirect_ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(config.upstream_timeout, Duration::from_millis(500));
        assert_eq!(config.max_inflight, Some(64));
    }

    #[test]
    fn test_unknown_mode_is_nxdomain() {
        let raw = RawConfig::from_json(r#"{"mode": "sinkhole"}"#).unwrap();
        assert_eq!(raw.mode, BlockMode::Nxdomain);
        let raw = RawConfig::from_json(r#"{"mode": "refused"}"#).unwrap();
        assert_eq!(raw.mode, BlockMode::Refused);
    }

    #[test]
    fn test_non_string_mode_is_nxdomain() {
        for json in [
            r#"{"mode": null}"#,
            r#"{"mode": 5}"#,
            r#"{"mode": ["redirect"]}"#,
            r#"{"mode": {"kind": "refused"}}"#,
        ] {
            let raw = RawConfig::from_json(json).unwrap();
            assert_eq!(raw.mode, BlockMode::Nxdomain, "{}", json);
        }
    }

    #[test]
    fn test_invalid_values_rejected() {
        for json in [
            r#"{"upstream": "8.8.8.8"}"#,
            r#"{"listen": "0.0.0.0:notaport"}"#,
            r#"{"redirect_ip": "::1"}"#,
            r#"{"timeout_ms": 0}"#,
            r#"{"max_inflight": 0}"#,
        ] {
            let result = RawConfig::from_json(json).unwrap().validate();
            assert!(
                matches!(result, Err(ConfigError::Validation(_))),
                "{} should fail validation",
                json
            );
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            RawConfig::from_json("{\"blacklist\": "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut raw = RawConfig::from_json(r#"{"listen": "127.0.0.1:1053", "mode": "refused"}"#)
            .unwrap();
        raw.apply_cli_overrides(CliOverrides {
            listen: Some("127.0.0.1:2053".to_string()),
            upstream: None,
            mode: Some(BlockMode::Redirect),
            log_level: Some("debug".to_string()),
        });
        let config = raw.validate().unwrap();
        assert_eq!(config.listen, "127.0.0.1:2053".parse().unwrap());
        assert_eq!(config.mode, BlockMode::Redirect);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"blacklist": ["example.com"], "mode": "refused"}}"#).unwrap();

        let config = ProxyConfig::load(file.path(), true, CliOverrides::default()).unwrap();
        assert_eq!(config.mode, BlockMode::Refused);
        assert!(config.blacklist.is_blocked("www.example.com"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        assert!(ProxyConfig::load(&path, false, CliOverrides::default()).is_ok());
        assert!(matches!(
            ProxyConfig::load(&path, true, CliOverrides::default()),
            Err(ConfigError::FileRead(_, _))
        ));
    }
}
