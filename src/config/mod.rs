//! Application configuration.
//!
//! Loaded once at startup and read from anywhere via [`get`], following the
//! `WellConfig`/`config::init()`/`config::get()` convention this codebase
//! has used since its drilling-intelligence days: a missing config is a
//! fatal startup bug, not a recoverable condition, so `get()` panics if
//! called before `init()`.
//!
//! ## Loading order
//!
//! 1. `TEP_SENTINEL_CONFIG` environment variable (path to TOML file)
//! 2. `tep_sentinel.toml` in the current working directory
//! 3. Built-in defaults

pub mod defaults;
pub mod validation;

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// One configured LLM provider adapter (§6 "LLM provider adapters").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Human-readable provider name, used as the key in `per_provider`.
    pub name: String,
    /// Base URL of the provider's HTTP API.
    pub base_url: String,
    /// Model identifier to request.
    pub model: String,
    /// Name of the environment variable holding the API credential, if any.
    pub api_key_env: Option<String>,
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server_addr: String,
    pub data_dir: String,
    pub window_size: usize,
    pub n_consec: usize,
    pub top_k: usize,
    pub alpha: f64,
    pub dispatch_min_interval_secs: u64,
    pub jaccard_threshold: f64,
    pub provider_timeout_secs: u64,
    pub dispatch_queue_depth: usize,
    pub sse_queue_depth: usize,
    pub sse_k_error: u32,
    pub sse_heartbeat_secs: u64,
    pub interval_real_secs: f64,
    pub interval_fast_secs: f64,
    pub interval_demo_secs: f64,
    pub providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:8080".to_string(),
            data_dir: defaults::DATA_DIR.to_string(),
            window_size: defaults::WINDOW_SIZE,
            n_consec: defaults::N_CONSEC,
            top_k: defaults::TOP_K,
            alpha: defaults::ALPHA,
            dispatch_min_interval_secs: defaults::DISPATCH_MIN_INTERVAL_SECS,
            jaccard_threshold: defaults::JACCARD_THRESHOLD,
            provider_timeout_secs: defaults::PROVIDER_TIMEOUT_SECS,
            dispatch_queue_depth: defaults::DISPATCH_QUEUE_DEPTH,
            sse_queue_depth: defaults::SSE_QUEUE_DEPTH,
            sse_k_error: defaults::SSE_K_ERROR,
            sse_heartbeat_secs: defaults::SSE_HEARTBEAT_SECS,
            interval_real_secs: defaults::INTERVAL_REAL_SECS,
            interval_fast_secs: defaults::INTERVAL_FAST_SECS,
            interval_demo_secs: defaults::INTERVAL_DEMO_SECS,
            providers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from `TEP_SENTINEL_CONFIG` > `tep_sentinel.toml` > defaults, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = if let Ok(path) = std::env::var("TEP_SENTINEL_CONFIG") {
            Self::from_file(&path)?
        } else if Path::new("tep_sentinel.toml").exists() {
            Self::from_file("tep_sentinel.toml")?
        } else {
            tracing::info!("no tep_sentinel.toml found, using built-in defaults");
            Self::default()
        };

        validation::validate(&cfg)?;
        Ok(cfg)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&text)?;
        tracing::info!(path, "loaded config");
        Ok(cfg)
    }

    /// Real-time interval for a given speed preset.
    pub fn interval_secs(&self, preset: crate::types::SpeedPreset) -> f64 {
        match preset {
            crate::types::SpeedPreset::Real => self.interval_real_secs,
            crate::types::SpeedPreset::Fast => self.interval_fast_secs,
            crate::types::SpeedPreset::Demo => self.interval_demo_secs,
        }
    }
}

/// Initialize the global configuration. Must be called exactly once at startup.
pub fn init(config: AppConfig) {
    if APP_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global configuration.
///
/// Panics if `init()` has not been called — a missing config is a fatal
/// startup bug, not a recoverable condition.
pub fn get() -> &'static AppConfig {
    APP_CONFIG
        .get()
        .expect("config::get() called before config::init() — this is a startup bug")
}

/// Check whether the config has been initialized (useful for tests).
pub fn is_initialized() -> bool {
    APP_CONFIG.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roundtrips_through_toml() {
        let cfg = AppConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn interval_lookup_matches_preset() {
        let cfg = AppConfig::default();
        assert_eq!(
            cfg.interval_secs(crate::types::SpeedPreset::Real),
            defaults::INTERVAL_REAL_SECS
        );
        assert_eq!(
            cfg.interval_secs(crate::types::SpeedPreset::Demo),
            defaults::INTERVAL_DEMO_SECS
        );
    }
}
