//! Parameter types configuring a demodulation run.
//!
//! Everything deserializes with `#[serde(default)]`, so a config file only
//! has to name the knobs it changes. Defaults reproduce the classic setup:
//! 32 quality levels, automatic seeding and the adaptive Gabor strategy with
//! three refinement passes at the seed and one elsewhere.

use crate::demod::gabor::GaborOptions;
use crate::demod::tracker::TrackerOptions;
use crate::scheduler::ScanPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the first pixel of a run is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SeedSelection {
    /// First strict maximum of the quality levels in row-major order.
    Auto,
    /// Caller-chosen pixel.
    Explicit { x: usize, y: usize },
    /// Whole-field Gabor filter tuned to `(wx, wy)`; the pixel with the
    /// largest response magnitude wins, first in row-major order on ties.
    TunedResponse { wx: f64, wy: f64 },
}

impl Default for SeedSelection {
    fn default() -> Self {
        SeedSelection::Auto
    }
}

impl From<ScanPoint> for SeedSelection {
    fn from(p: ScanPoint) -> Self {
        SeedSelection::Explicit { x: p.x, y: p.y }
    }
}

/// Per-pixel demodulation strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Gabor,
    Tracker,
    /// Regularized 2D tracker; rejected when a run is built.
    RegularizedTracker,
}

impl Default for StrategyKind {
    fn default() -> Self {
        StrategyKind::Gabor
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Gabor => "gabor",
            StrategyKind::Tracker => "tracker",
            StrategyKind::RegularizedTracker => "regularized_tracker",
        })
    }
}

/// Run-wide parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemodParams {
    /// Number of quality levels (>= 1).
    pub levels: usize,
    pub seed: SeedSelection,
    pub strategy: StrategyKind,
    pub gabor: GaborOptions,
    pub tracker: TrackerOptions,
    /// Gaussian smoothing applied before the quality map is built. The
    /// demodulators still see the unsmoothed intensity.
    pub prefilter_sigma: Option<f64>,
    /// Background removal `I − G_σ * I` applied to the intensity before
    /// anything else.
    pub remove_dc_sigma: Option<f64>,
    /// Pixels whose radial frequency falls below this value are demodulated
    /// but do not expand their neighbours.
    pub scan_min_freq: Option<f64>,
}

impl Default for DemodParams {
    fn default() -> Self {
        Self {
            levels: 32,
            seed: SeedSelection::Auto,
            strategy: StrategyKind::Gabor,
            gabor: GaborOptions::default(),
            tracker: TrackerOptions::default(),
            prefilter_sigma: None,
            remove_dc_sigma: None,
            scan_min_freq: None,
        }
    }
}

impl DemodParams {
    pub fn with_levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_seed(mut self, seed: impl Into<SeedSelection>) -> Self {
        self.seed = seed.into();
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_gabor(mut self, gabor: GaborOptions) -> Self {
        self.gabor = gabor;
        self
    }

    pub fn with_tracker(mut self, tracker: TrackerOptions) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_prefilter(mut self, sigma: f64) -> Self {
        self.prefilter_sigma = Some(sigma);
        self
    }

    pub fn with_dc_removal(mut self, sigma: f64) -> Self {
        self.remove_dc_sigma = Some(sigma);
        self
    }

    pub fn with_scan_min_freq(mut self, min_freq: f64) -> Self {
        self.scan_min_freq = Some(min_freq);
        self
    }
}
