//! Config validation — rejects nonsensical values at load time rather than
//! letting them surface as confusing runtime behavior later.

use super::{AppConfig, ProviderConfig};
use crate::errors::ConfigError;

pub fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    if cfg.window_size == 0 {
        return Err(ConfigError::Invalid("window_size must be > 0".into()));
    }
    if cfg.n_consec == 0 {
        return Err(ConfigError::Invalid("n_consec must be > 0".into()));
    }
    if cfg.top_k == 0 {
        return Err(ConfigError::Invalid("top_k must be > 0".into()));
    }
    if !(0.0..=1.0).contains(&cfg.jaccard_threshold) {
        return Err(ConfigError::Invalid(
            "jaccard_threshold must be within [0.0, 1.0]".into(),
        ));
    }
    if cfg.dispatch_min_interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "dispatch_min_interval_secs must be > 0".into(),
        ));
    }
    if cfg.provider_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "provider_timeout_secs must be > 0".into(),
        ));
    }
    if cfg.dispatch_queue_depth == 0 {
        return Err(ConfigError::Invalid(
            "dispatch_queue_depth must be > 0".into(),
        ));
    }
    if cfg.sse_queue_depth == 0 {
        return Err(ConfigError::Invalid("sse_queue_depth must be > 0".into()));
    }
    if cfg.interval_real_secs <= 0.0
        || cfg.interval_fast_secs <= 0.0
        || cfg.interval_demo_secs <= 0.0
    {
        return Err(ConfigError::Invalid(
            "speed preset intervals must be positive".into(),
        ));
    }
    for p in &cfg.providers {
        validate_provider(p)?;
    }
    Ok(())
}

fn validate_provider(p: &ProviderConfig) -> Result<(), ConfigError> {
    if p.name.trim().is_empty() {
        return Err(ConfigError::Invalid("provider name cannot be empty".into()));
    }
    if p.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "provider {} is missing base_url",
            p.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn rejects_zero_window() {
        let mut cfg = AppConfig::default();
        cfg.window_size = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_bad_jaccard() {
        let mut cfg = AppConfig::default();
        cfg.jaccard_threshold = 1.5;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_provider_without_base_url() {
        let mut cfg = AppConfig::default();
        cfg.providers.push(ProviderConfig {
            name: "bad".into(),
            base_url: "".into(),
            model: "x".into(),
            api_key_env: None,
        });
        assert!(validate(&cfg).is_err());
    }
}
