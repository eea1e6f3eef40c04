use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::ProbeTarget;

/// Everything the controller needs; nothing else is recognised by the core.
///
/// Only built through [`ControllerConfig::new`], so both durations are
/// always non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    target: ProbeTarget,
    probe_timeout: Duration,
    loop_interval: Duration,
}

impl ControllerConfig {
    pub fn new(
        target: impl Into<String>,
        probe_timeout: Duration,
        loop_interval: Duration,
    ) -> Result<Self, ConfigError> {
        if probe_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("probe timeout"));
        }
        if loop_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("loop interval"));
        }
        Ok(Self {
            target: ProbeTarget::new(target)?,
            probe_timeout,
            loop_interval,
        })
    }

    pub fn target(&self) -> &ProbeTarget {
        &self.target
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    pub fn loop_interval(&self) -> Duration {
        self.loop_interval
    }
}

/// Process-level settings loaded from the JSON config file.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    pub target: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_loop_interval")]
    pub loop_interval_ms: u64,
    #[serde(default)]
    pub dns: DnsUpstream,
    #[serde(default)]
    pub api_port: Option<u16>,
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DnsUpstream {
    #[default]
    System,
    Cloudflare,
    Google,
    Quad9,
}

pub fn default_probe_timeout() -> u64 { 5000 }
pub fn default_loop_interval() -> u64 { 10_000 }
fn default_autostart() -> bool { true }

impl MonitorConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        ControllerConfig::new(
            self.target.clone(),
            Duration::from_millis(self.probe_timeout_ms),
            Duration::from_millis(self.loop_interval_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_classic_ping_loop() {
        let config = MonitorConfig::from_json(r#"{ "target": "example.com" }"#).unwrap();
        assert_eq!(config.probe_timeout_ms, 5000);
        assert_eq!(config.loop_interval_ms, 10_000);
        assert_eq!(config.dns, DnsUpstream::System);
        assert_eq!(config.api_port, None);
        assert!(config.autostart);

        let controller = config.controller_config().unwrap();
        assert_eq!(controller.target().as_str(), "example.com");
        assert_eq!(controller.probe_timeout(), Duration::from_secs(5));
        assert_eq!(controller.loop_interval(), Duration::from_secs(10));
    }

    #[test]
    fn explicit_values_are_honoured() {
        let config = MonitorConfig::from_json(
            r#"{
                "target": "192.0.2.10",
                "probe_timeout_ms": 250,
                "loop_interval_ms": 1000,
                "dns": "cloudflare",
                "api_port": 3000,
                "autostart": false
            }"#,
        )
        .unwrap();
        assert_eq!(config.dns, DnsUpstream::Cloudflare);
        assert_eq!(config.api_port, Some(3000));
        assert!(!config.autostart);
        assert_eq!(
            config.controller_config().unwrap().probe_timeout(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero = MonitorConfig::from_json(r#"{ "target": "a", "loop_interval_ms": 0 }"#).unwrap();
        assert!(matches!(
            zero.controller_config(),
            Err(ConfigError::ZeroDuration("loop interval"))
        ));

        let empty = MonitorConfig::from_json(r#"{ "target": " " }"#).unwrap();
        assert!(matches!(empty.controller_config(), Err(ConfigError::EmptyTarget)));

        assert!(matches!(
            MonitorConfig::from_json(r#"{ "probe_timeout_ms": 10 }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_durations_cannot_be_configured() {
        assert!(matches!(
            ControllerConfig::new("example.com", Duration::ZERO, Duration::from_secs(1)),
            Err(ConfigError::ZeroDuration("probe timeout"))
        ));
        assert!(matches!(
            ControllerConfig::new("example.com", Duration::from_secs(1), Duration::ZERO),
            Err(ConfigError::ZeroDuration("loop interval"))
        ));

        let config = ControllerConfig::new(
            "example.com",
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
        .unwrap();
        assert!(!config.probe_timeout().is_zero());
        assert!(!config.loop_interval().is_zero());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "target": "localhost", "dns": "quad9" }}"#).unwrap();
        let config = MonitorConfig::load(file.path()).unwrap();
        assert_eq!(config.target, "localhost");
        assert_eq!(config.dns, DnsUpstream::Quad9);

        assert!(matches!(
            MonitorConfig::load("/nonexistent/netpulse.json"),
            Err(ConfigError::Read { .. })
        ));
    }
}
