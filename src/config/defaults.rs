//! Built-in default values, mirrored from spec defaults so the
//! behavior is identical whether or not an operator supplies a TOML file.

/// Sliding window length (§3 Window, §8 invariant 2).
pub const WINDOW_SIZE: usize = 20;

/// Consecutive anomalous/normal frames required to open/close an event (§4.B).
pub const N_CONSEC: usize = 2;

/// Top-K contributing features tracked per anomaly event (§4.B).
pub const TOP_K: usize = 6;

/// False-alarm rate used to pick the default T^2 threshold at training time (§3).
pub const ALPHA: f64 = 0.01;

/// Minimum interval between LLM dispatches, in seconds (§4.F).
pub const DISPATCH_MIN_INTERVAL_SECS: u64 = 70;

/// Jaccard similarity threshold for re-dispatch while an event stays open (§4.F, §9).
pub const JACCARD_THRESHOLD: f64 = 1.0;

/// Per-provider LLM call timeout, in seconds (§4.F).
pub const PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Bounded dispatch work queue depth (§4.F).
pub const DISPATCH_QUEUE_DEPTH: usize = 16;

/// Per-subscriber bounded SSE outbound queue depth (§4.E).
pub const SSE_QUEUE_DEPTH: usize = 64;

/// Consecutive write errors before a subscriber is disconnected (§4.E).
pub const SSE_K_ERROR: u32 = 3;

/// SSE heartbeat interval while idle, in seconds (§4.E).
pub const SSE_HEARTBEAT_SECS: u64 = 15;

/// Real-time interval between simulator steps for each speed preset, in seconds (§3).
pub const INTERVAL_REAL_SECS: f64 = 180.0;
pub const INTERVAL_FAST_SECS: f64 = 18.0;
pub const INTERVAL_DEMO_SECS: f64 = 1.0;

/// Number of measurement variables (XMEAS), manipulated variables (XMV),
/// and disturbance channels (IDV) in the Tennessee Eastman Process (GLOSSARY).
pub const N_XMEAS: usize = 41;
pub const N_XMV: usize = 11;
pub const N_IDV: usize = 20;

/// Default feature count modeled by the baseline (§3 BaselineModel).
pub const N_FEATURES: usize = 52;

/// Default data directory, relative to the working directory.
pub const DATA_DIR: &str = "./data";
