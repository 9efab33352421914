//! `AnalysisRecord` — one LLM comparative result (§3, §4.F).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Per-provider call outcome (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Ok,
    Timeout,
    Refused,
    Error,
}

/// Result of calling a single configured LLM provider during a dispatch (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderResult {
    pub status: ProviderStatus,
    pub response_time_ms: u64,
    pub text: String,
    pub word_count: usize,
    pub error_message: Option<String>,
}

/// Aggregate derived from `per_provider`, keyed by provider name (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PerformanceSummary {
    pub fastest_provider: Option<String>,
    pub ok_count: usize,
    pub error_count: usize,
}

impl PerformanceSummary {
    pub fn from_results(results: &HashMap<String, ProviderResult>) -> Self {
        let mut fastest: Option<(&str, u64)> = None;
        let mut ok_count = 0;
        let mut error_count = 0;
        for (name, r) in results {
            if r.status == ProviderStatus::Ok {
                ok_count += 1;
                let is_faster = match fastest {
                    Some((_, t)) => r.response_time_ms < t,
                    None => true,
                };
                if is_faster {
                    fastest = Some((name.as_str(), r.response_time_ms));
                }
            } else {
                error_count += 1;
            }
        }
        Self {
            fastest_provider: fastest.map(|(n, _)| n.to_string()),
            ok_count,
            error_count,
        }
    }
}

/// One LLM comparative analysis result, written once and immutable (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRecord {
    pub record_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub event_id: Uuid,
    pub prompt_summary: String,
    pub per_provider: HashMap<String, ProviderResult>,
    pub performance_summary: PerformanceSummary,
}

impl AnalysisRecord {
    /// Overall completion status per §7: at least one `ok` -> Completed;
    /// all-error/timeout/refused still persists as Completed so operators
    /// can see the outage, rather than being silently dropped.
    pub fn has_any_success(&self) -> bool {
        self.per_provider
            .values()
            .any(|r| r.status == ProviderStatus::Ok)
    }
}
