use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::RunwatchError;
use crate::progress::TerminalDetector;

/// Upper bound for a single long-poll wait, in seconds.
pub const MAX_WAIT_SECS: u64 = 60;

/// Lower bound for the cooldown after a failed fetch, in milliseconds.
pub const MIN_ERROR_COOLDOWN_MS: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub backend: BackendConfig,
    pub poll: PollConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub start_path: String,
    pub progress_path: String,
    pub events_path: String,
    /// "user:pass" for HTTP basic auth
    pub basic_auth: Option<String>,
    pub connect_timeout_ms: u64,
    /// Added on top of the long-poll wait to form the HTTP timeout
    pub request_slack_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5701".to_string(),
            start_path: "/webhook/payment-test/start".to_string(),
            progress_path: "/webhook/payment-test/progress".to_string(),
            events_path: "/webhook/payment-test/events".to_string(),
            basic_auth: None,
            connect_timeout_ms: 10000,
            request_slack_ms: 10000,
        }
    }
}

/// What the poll loop does after a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Wait the cooldown, then poll again
    Retry,
    /// Stop the loop with a fatal error
    Stop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub wait_secs: u64,
    pub min_gap_ms: u64,
    pub subtract_elapsed: bool,
    pub backoff_step_ms: u64,
    pub backoff_cap_ms: u64,
    pub max_empty_hits: u32,
    pub max_delay_ms: u64,
    pub stale_ticks: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub error_policy: ErrorPolicy,
    pub error_cooldown_ms: u64,
    pub max_consecutive_errors: Option<u32>,
    pub terminal_patterns: Vec<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            wait_secs: 25,
            min_gap_ms: 2000,
            subtract_elapsed: true,
            backoff_step_ms: 500,
            backoff_cap_ms: 5000,
            max_empty_hits: 10,
            max_delay_ms: 7000,
            stale_ticks: Some(10),
            timeout_secs: Some(180),
            error_policy: ErrorPolicy::Retry,
            error_cooldown_ms: 3000,
            max_consecutive_errors: None,
            terminal_patterns: default_terminal_patterns(),
        }
    }
}

pub fn default_terminal_patterns() -> Vec<String> {
    ["final", "rapor", "report", "tamamlan", "payment.*success", "ödeme.*başar"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl PollConfig {
    /// Reject settings that would stall or busy-loop the poller.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.wait_secs == 0 || self.wait_secs > MAX_WAIT_SECS {
            return Err(RunwatchError::InvalidConfig(format!(
                "wait_secs must be between 1 and {}, got {}",
                MAX_WAIT_SECS, self.wait_secs
            )));
        }
        if self.error_cooldown_ms < MIN_ERROR_COOLDOWN_MS {
            return Err(RunwatchError::InvalidConfig(format!(
                "error_cooldown_ms must be at least {}, got {}",
                MIN_ERROR_COOLDOWN_MS, self.error_cooldown_ms
            )));
        }
        if self.max_delay_ms < self.min_gap_ms {
            return Err(RunwatchError::InvalidConfig(format!(
                "max_delay_ms ({}) is below min_gap_ms ({})",
                self.max_delay_ms, self.min_gap_ms
            )));
        }
        if self.stale_ticks == Some(0) {
            return Err(RunwatchError::InvalidConfig("stale_ticks must be positive".to_string()));
        }
        if self.timeout_secs == Some(0) {
            return Err(RunwatchError::InvalidConfig("timeout_secs must be positive".to_string()));
        }
        if self.max_consecutive_errors == Some(0) {
            return Err(RunwatchError::InvalidConfig(
                "max_consecutive_errors must be positive".to_string(),
            ));
        }
        TerminalDetector::from_patterns(&self.terminal_patterns)?;
        Ok(())
    }

    pub fn min_gap(&self) -> Duration {
        Duration::from_millis(self.min_gap_ms)
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_millis(self.error_cooldown_ms.max(MIN_ERROR_COOLDOWN_MS))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub dir: PathBuf,
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("runwatch"),
            max_entries: 50,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            backend: BackendConfig::default(),
            poll: PollConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(config_path)?;
        config.apply_env_overrides();
        config.poll.validate().context("Invalid poll configuration")?;
        Ok(config)
    }

    fn load_file(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("RUNWATCH_BASE_URL") {
            if !url.trim().is_empty() {
                self.backend.base_url = url;
            }
        }
        if let Ok(auth) = std::env::var("RUNWATCH_BASIC_AUTH") {
            if !auth.trim().is_empty() {
                self.backend.basic_auth = Some(auth);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_poll_config_defaults_are_valid() {
        let config = PollConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.wait_secs, 25);
        assert_eq!(config.min_gap(), Duration::from_millis(2000));
        assert_eq!(config.stale_ticks, Some(10));
        assert_eq!(config.timeout(), Some(Duration::from_secs(180)));
    }

    #[test]
    fn test_wait_bound_rejected() {
        let config = PollConfig {
            wait_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PollConfig {
            wait_secs: 61,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_cooldown_rejected() {
        let config = PollConfig {
            error_cooldown_ms: 10,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("error_cooldown_ms"));
    }

    #[test]
    fn test_max_delay_below_gap_rejected() {
        let config = PollConfig {
            min_gap_ms: 3000,
            max_delay_ms: 1000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let config = PollConfig {
            terminal_patterns: vec!["(unclosed".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_error_cooldown_floor() {
        let config = PollConfig {
            error_cooldown_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.error_cooldown(), Duration::from_millis(MIN_ERROR_COOLDOWN_MS));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "backend:\n  base_url: http://n8n.internal:5678\n\
             poll:\n  wait_secs: 10\n  stale_ticks: 6\n  timeout_secs: null\n  error_policy: stop"
        )
        .unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.backend.base_url, "http://n8n.internal:5678");
        assert_eq!(config.backend.events_path, "/webhook/payment-test/events");
        assert_eq!(config.poll.wait_secs, 10);
        assert_eq!(config.poll.stale_ticks, Some(6));
        assert_eq!(config.poll.timeout_secs, None);
        assert_eq!(config.poll.error_policy, ErrorPolicy::Stop);
        assert_eq!(config.poll.min_gap_ms, 2000);
    }

    #[test]
    fn test_load_rejects_invalid_poll_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "poll:\n  wait_secs: 600").unwrap();
        assert!(Config::load(Some(&file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let path = PathBuf::from("/nonexistent/runwatch.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
