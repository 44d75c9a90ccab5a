//! Per-pixel demodulation strategies.
//!
//! A strategy turns the raw intensity at a pixel plus the phase/frequency
//! state of already demodulated neighbours into a new phase and local
//! frequency for that pixel. The driver ([`crate::run::DemodRun`]) owns all
//! fields and hands them to the strategy read-only; it alone writes the
//! returned estimate back.
//!
//! Strategies
//! - [`gabor`] – 2D adaptive Gabor filter; the kernel is rebuilt per pixel
//!   from the predicted local frequency and refined for a fixed number of
//!   iterations.
//! - [`tracker`] – 1D frequency tracker. Phase follows the arc-cosine of the
//!   normalized intensity, with the branch chosen by a second-order
//!   smoothness potential against the neighbour it continues from.
//!
//! [`predict`] holds the neighbour frequency lookup used to seed kernel
//! adaptation.

pub mod gabor;
pub mod predict;
pub mod tracker;

use crate::error::DemodError;
use crate::image::Field;
use crate::scheduler::ScanPoint;
use nalgebra::{Complex, Vector2};

pub use gabor::{GaborDemodulator, GaborKernel};
pub use predict::FrequencyPrediction;
pub use tracker::TrackerDemodulator;

/// Local frequency estimate `(∂φ/∂x, ∂φ/∂y)` in radians per pixel.
pub type Frequency = Vector2<f64>;

/// All per-pixel state of a run. Every field has the intensity's size.
#[derive(Clone, Debug)]
pub struct DemodFields {
    /// Input fringe intensity (after optional background removal)
    pub intensity: Field<f64>,
    /// Real part of the filter response
    pub re: Field<f64>,
    /// Imaginary part of the filter response
    pub im: Field<f64>,
    /// Accepted phase
    pub phase: Field<f64>,
    /// Local frequency along x
    pub fx: Field<f64>,
    /// Local frequency along y
    pub fy: Field<f64>,
    /// Pixels whose phase/frequency have been accepted
    pub demodulated: Field<bool>,
}

impl DemodFields {
    pub fn new(intensity: Field<f64>) -> Self {
        let (w, h) = (intensity.w, intensity.h);
        Self {
            intensity,
            re: Field::new(w, h),
            im: Field::new(w, h),
            phase: Field::new(w, h),
            fx: Field::new(w, h),
            fy: Field::new(w, h),
            demodulated: Field::filled(w, h, false),
        }
    }

    pub fn width(&self) -> usize {
        self.intensity.w
    }

    pub fn height(&self) -> usize {
        self.intensity.h
    }

    #[inline]
    pub fn is_demodulated(&self, x: usize, y: usize) -> bool {
        self.demodulated.get(x, y)
    }

    #[inline]
    pub fn frequency(&self, x: usize, y: usize) -> Frequency {
        Frequency::new(self.fx.get(x, y), self.fy.get(x, y))
    }

    /// Store an accepted estimate for one pixel and mark it demodulated.
    pub fn accept(&mut self, p: ScanPoint, estimate: &PixelEstimate) {
        self.phase.set(p.x, p.y, estimate.phase);
        self.fx.set(p.x, p.y, estimate.freq.x);
        self.fy.set(p.x, p.y, estimate.freq.y);
        self.re.set(p.x, p.y, estimate.response.re);
        self.im.set(p.x, p.y, estimate.response.im);
        self.demodulated.set(p.x, p.y, true);
    }

    /// Clear every output field, keeping the intensity.
    pub fn reset(&mut self) {
        self.re.fill(0.0);
        self.im.fill(0.0);
        self.phase.fill(0.0);
        self.fx.fill(0.0);
        self.fy.fill(0.0);
        self.demodulated.fill(false);
    }

    /// Number of demodulated pixels.
    pub fn demodulated_count(&self) -> usize {
        self.demodulated.data.iter().filter(|&&d| d).count()
    }
}

/// Result of demodulating one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelEstimate {
    pub phase: f64,
    pub freq: Frequency,
    /// Complex response backing the estimate; the tracker reports `e^{iφ}`
    pub response: Complex<f64>,
}

/// Strategy contract: neighbours + intensity → phase and frequency.
pub trait Demodulator {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Estimate phase and frequency at `pixel`.
    ///
    /// `is_seed` is true for the first pixel of a run, which has no
    /// demodulated neighbour to continue from.
    fn demodulate(
        &mut self,
        fields: &DemodFields,
        pixel: ScanPoint,
        is_seed: bool,
    ) -> Result<PixelEstimate, DemodError>;
}
