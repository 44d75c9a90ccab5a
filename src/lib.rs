#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod demod;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod params;
pub mod run;

// Building blocks; public for tools and experiments.
pub mod config;
pub mod convolution;
pub mod quality;
pub mod scheduler;

// --- High-level re-exports -------------------------------------------------

// Main entry points: run driver + parameters.
pub use crate::params::{DemodParams, SeedSelection, StrategyKind};
pub use crate::run::{demodulate, DemodRun};

pub use crate::demod::{DemodFields, Demodulator, Frequency, PixelEstimate};
pub use crate::diagnostics::DemodReport;
pub use crate::error::DemodError;
pub use crate::scheduler::ScanPoint;

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use fringe_demod::prelude::*;
///
/// # fn main() -> Result<(), DemodError> {
/// let (w, h) = (128usize, 96usize);
/// let img = Field::from_fn(w, h, |x, y| (0.4 * x as f64 + 0.2 * y as f64).cos());
///
/// let mut run = DemodRun::new(img, DemodParams::default())?;
/// let report = run.run_to_completion()?;
/// println!("demodulated={} seed={:?}", report.demodulated, report.seed);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::{Field, ImageView};
    pub use crate::{DemodError, DemodParams, DemodRun, ScanPoint, StrategyKind};
}
