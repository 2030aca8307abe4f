//! Runtime configuration
//!
//! Defaults, then an optional TOML file, then environment variables (a local
//! `.env` is honoured through `dotenvy`).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ReconnectPolicy;
use crate::realtime::ManagerOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub schema: String,
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            schema: "public".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Unset means retry forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff_multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Lifetimes of the transient UI flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub highlight_ms: u64,
    pub animation_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            highlight_ms: 2_000,
            animation_ms: 1_500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WellnessConfig {
    pub limit: usize,
}

impl Default for WellnessConfig {
    fn default() -> Self {
        Self { limit: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Write a daily rolling log file here in addition to stderr
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub demo_mode: bool,
    pub backend: BackendConfig,
    pub reconnect: ReconnectConfig,
    pub timing: TimingConfig,
    pub wellness: WellnessConfig,
    pub log: LogConfig,
}

impl SyncConfig {
    /// Load defaults, the optional TOML file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config `{}`", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config `{}`", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `HOUSE_SYNC_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("HOUSE_SYNC_URL") {
            self.backend.url = Some(url);
        }
        if let Some(key) = lookup("HOUSE_SYNC_API_KEY") {
            self.backend.api_key = Some(key);
        }
        if let Some(schema) = lookup("HOUSE_SYNC_SCHEMA") {
            self.backend.schema = schema;
        }
        if let Some(demo) = lookup("HOUSE_SYNC_DEMO") {
            self.demo_mode = parse_flag(&demo)
                .with_context(|| format!("HOUSE_SYNC_DEMO has invalid value `{demo}`"))?;
        }
        if let Some(level) = lookup("HOUSE_SYNC_LOG") {
            self.log.level = level;
        }
        if let Some(dir) = lookup("HOUSE_SYNC_LOG_DIR") {
            self.log.directory = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let reconnect = &self.reconnect;
        if reconnect.initial_delay_ms == 0 {
            bail!("reconnect.initial_delay_ms must be greater than zero");
        }
        if reconnect.max_delay_ms < reconnect.initial_delay_ms {
            bail!("reconnect.max_delay_ms must not be below reconnect.initial_delay_ms");
        }
        if reconnect.multiplier < 1.0 {
            bail!("reconnect.multiplier must be at least 1.0");
        }
        if self.wellness.limit == 0 {
            bail!("wellness.limit must be greater than zero");
        }
        if let Some(url) = &self.backend.url {
            let parsed = Url::parse(url)
                .with_context(|| format!("backend.url `{url}` is not a valid url"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                bail!("backend.url must use http or https, got `{}`", parsed.scheme());
            }
        }
        Ok(())
    }

    /// Demo mode: explicitly requested, or no backend to talk to.
    pub fn is_demo_mode_active(&self) -> bool {
        self.demo_mode || self.backend.url.is_none()
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            schema: self.backend.schema.clone(),
            policy: self.reconnect.policy(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_reconnect_schedule() {
        let config = SyncConfig::default();
        let policy = config.reconnect.policy();

        assert_eq!(policy.initial_delay, Duration::from_millis(1_000));
        assert_eq!(policy.max_delay, Duration::from_millis(30_000));
        assert_eq!(policy.max_attempts, None);
        assert_eq!(config.timing.highlight_ms, 2_000);
        assert_eq!(config.timing.animation_ms, 1_500);
        assert!(config.is_demo_mode_active());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SyncConfig::from_toml(
            r#"
            [backend]
            url = "https://example.test"

            [wellness]
            limit = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.schema, "public");
        assert_eq!(config.wellness.limit, 10);
        assert_eq!(config.reconnect.max_delay_ms, 30_000);
        assert!(!config.is_demo_mode_active());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("HOUSE_SYNC_URL", "https://env.test"),
            ("HOUSE_SYNC_DEMO", "yes"),
            ("HOUSE_SYNC_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backend.url.as_deref(), Some("https://env.test"));
        assert!(config.demo_mode);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_invalid_demo_flag() {
        let mut config = SyncConfig::default();
        let result =
            config.apply_env(|key| (key == "HOUSE_SYNC_DEMO").then(|| "maybe".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = SyncConfig::default();
        config.reconnect.max_delay_ms = 10;
        assert!(config.validate().is_err());

        let mut config = SyncConfig::default();
        config.backend.url = Some("ftp://example.test".to_string());
        assert!(config.validate().is_err());

        let mut config = SyncConfig::default();
        config.wellness.limit = 0;
        assert!(config.validate().is_err());
    }
}
