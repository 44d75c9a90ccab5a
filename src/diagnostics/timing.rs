use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Wall-clock duration of one stage of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub label: String,
    pub elapsed_ms: f64,
}

impl StageTiming {
    pub fn new(label: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
        }
    }
}

/// Per-stage timings of a run. `total_ms` is the sum of the recorded stages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    /// Record a stage, merging into an existing entry with the same label.
    pub fn push(&mut self, label: &str, elapsed_ms: f64) {
        match self.stages.iter_mut().find(|s| s.label == label) {
            Some(stage) => stage.elapsed_ms += elapsed_ms,
            None => self.stages.push(StageTiming::new(label, elapsed_ms)),
        }
        self.total_ms += elapsed_ms;
    }

    /// Record the time elapsed since `start`.
    pub fn record_since(&mut self, label: &str, start: Instant) {
        self.push(label, start.elapsed().as_secs_f64() * 1000.0);
    }

    /// Drop a stage and subtract it from the total.
    pub fn remove(&mut self, label: &str) {
        if let Some(pos) = self.stages.iter().position(|s| s.label == label) {
            let stage = self.stages.remove(pos);
            self.total_ms -= stage.elapsed_ms;
        }
    }

    pub fn stage(&self, label: &str) -> Option<&StageTiming> {
        self.stages.iter().find(|s| s.label == label)
    }
}
