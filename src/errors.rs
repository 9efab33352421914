//! Crate-wide error taxonomy.
//!
//! Each subsystem gets its own `thiserror` enum, matching the error
//! taxonomy in the design spec: Config, Input, Simulator, Detector,
//! Dispatcher, Storage, Transport. `anyhow::Result` is used only at the
//! binary/orchestration boundary; library code returns these typed errors.

use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0}")]
    NotFound(String),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by operator-facing control endpoints (§7 "Input").
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("value out of range: {0}")]
    OutOfRange(String),
    #[error("value is NaN: {0}")]
    NotANumber(String),
    #[error("unknown index: {0}")]
    UnknownIndex(String),
}

/// Errors from the black-box simulator invocation (§7 "Simulator").
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("transient numerical failure: {0}")]
    Transient(String),
    #[error("fatal simulator handle failure: {0}")]
    Fatal(String),
}

/// Errors from baseline loading/validation (§7 "Config" + detector shape checks).
#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("malformed baseline artifact: {0}")]
    Malformed(String),
    #[error("shape mismatch: expected F={expected_f} P={expected_p}, got F={got_f} P={got_p}")]
    ShapeMismatch {
        expected_f: usize,
        expected_p: usize,
        got_f: usize,
        got_p: usize,
    },
    #[error("non-positive std for feature {0}")]
    NonPositiveStd(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors from the PCA detector's evaluation step (§7 "Detector").
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectorError {
    #[error("feature {0} missing from frame")]
    MissingFeature(String),
    #[error("non-finite T^2 statistic")]
    NonFiniteStatistic,
    #[error("window not yet full: have {have}, need {need}")]
    WindowNotReady { have: usize, need: usize },
}

/// Errors from the LLM dispatcher (§7 "Dispatcher").
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("provider {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },
    #[error("provider {provider} refused the request: {message}")]
    Refused { provider: String, message: String },
    #[error("transport error talking to {provider}: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("dispatch queue is full")]
    QueueFull,
}

/// Errors from the analysis store (§7 "Storage").
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid date: {0}")]
    InvalidDate(String),
}
