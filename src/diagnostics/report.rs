use super::timing::TimingBreakdown;
use crate::params::StrategyKind;
use crate::scheduler::ScanPoint;
use serde::Serialize;

/// Quality map statistics.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitySummary {
    pub levels: usize,
    /// Observed `(min, max)` of the raw quality values.
    pub range: (f64, f64),
    /// Pixel count per level, lowest level first.
    pub histogram: Vec<usize>,
}

/// Outcome of a completed (or partially stepped) run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemodReport {
    pub width: usize,
    pub height: usize,
    pub strategy: StrategyKind,
    pub seed: ScanPoint,
    pub quality: QualitySummary,
    /// Points popped from the scheduler.
    pub pops: usize,
    /// Points ever queued, seed included.
    pub enqueued: usize,
    pub demodulated: usize,
    /// Demodulated pixels that did not expand their neighbours because their
    /// frequency was below the scan threshold.
    pub stopped: usize,
    pub timings: TimingBreakdown,
}

impl DemodReport {
    /// True when every pixel of the image was demodulated.
    pub fn is_complete(&self) -> bool {
        self.demodulated == self.width * self.height
    }
}
