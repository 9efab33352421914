//! Assembles the `prompt_context` handed to each provider (§4.F step 1).

use crate::baseline::BaselineModel;
use crate::types::{AnomalyEvent, SensorFrame, SpeedPreset};

/// One top-contributing feature, enriched with its deviation from the
/// baseline and a short window-derived trend (§4.F step 1: "per-feature
/// deviation from baseline" and "top-K contributing features with recent
/// trend").
#[derive(Debug, Clone)]
pub struct FeatureDetail {
    pub name: String,
    pub share: f64,
    pub baseline_deviation: f64,
    pub trend: &'static str,
}

/// Everything a provider needs to produce a comparable fault explanation.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub event_id: uuid::Uuid,
    pub frame: SensorFrame,
    pub top_features: Vec<FeatureDetail>,
    pub speed_preset: SpeedPreset,
}

impl PromptContext {
    /// `model` supplies the per-feature mean/std used for the baseline
    /// deviation (z-score); `recent` is the Frame Buffer's current snapshot,
    /// oldest first, used to derive each top feature's short-term trend.
    pub fn build(
        event: &AnomalyEvent,
        frame: &SensorFrame,
        speed_preset: SpeedPreset,
        model: &BaselineModel,
        recent: &[SensorFrame],
    ) -> Self {
        let current = frame.named_features();
        let earliest = recent.first().map(SensorFrame::named_features);

        let top_features = event
            .top_features
            .iter()
            .map(|f| {
                let baseline_deviation = model
                    .feature_names
                    .iter()
                    .position(|name| name == &f.name)
                    .and_then(|idx| current.get(&f.name).map(|&v| (v - model.mean[idx]) / model.std[idx]))
                    .unwrap_or(0.0);

                let trend = earliest
                    .as_ref()
                    .and_then(|first| first.get(&f.name))
                    .zip(current.get(&f.name))
                    .map(|(&first_value, &last_value)| match last_value.partial_cmp(&first_value) {
                        Some(std::cmp::Ordering::Greater) => "rising",
                        Some(std::cmp::Ordering::Less) => "falling",
                        _ => "flat",
                    })
                    .unwrap_or("flat");

                FeatureDetail {
                    name: f.name.clone(),
                    share: f.share,
                    baseline_deviation,
                    trend,
                }
            })
            .collect();

        Self {
            event_id: event.event_id,
            frame: frame.clone(),
            top_features,
            speed_preset,
        }
    }

    /// Flattened natural-language prompt sent to each provider.
    pub fn render(&self) -> String {
        let features = self
            .top_features
            .iter()
            .map(|f| {
                format!(
                    "{} (share={:.3}, deviation={:.2}σ, trend={})",
                    f.name, f.share, f.baseline_deviation, f.trend
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "An anomaly was detected at simulator step {} (t={:.0}s, speed preset: {}). \
             Top contributing features: {}. \
             Explain the likely process fault and recommend an operator action.",
            self.frame.step, self.frame.sim_time_seconds, self.speed_preset, features
        )
    }

    /// Short summary stored on the `AnalysisRecord` (`prompt_summary`, §3).
    pub fn summary(&self) -> String {
        let names: Vec<&str> = self.top_features.iter().map(|f| f.name.as_str()).collect();
        format!("step {} — {}", self.frame.step, names.join(", "))
    }
}
