//! Demodulation driver.
//!
//! [`DemodRun`] owns every per-pixel field of a run, the bucket scheduler and
//! the selected strategy. Construction does all the setup: optional
//! background removal, the quality map, strategy selection and the seed.
//! Traversal then proceeds one pixel per [`DemodRun::next`] call:
//!
//! 1. pop the front of the highest non-empty quality level,
//! 2. demodulate it against the already accepted neighbours,
//! 3. store the estimate and mark the pixel demodulated,
//! 4. queue its undiscovered 8-neighbours.
//!
//! The scheduler is the only writer of the discovery mask, the run is the
//! only writer of phase, frequency and the demodulated mask. A pixel is
//! popped at most once, so nothing is ever overwritten.
use crate::convolution::{convolve_normalized, KernelPair};
use crate::demod::gabor::gabor_filter;
use crate::demod::{
    DemodFields, Demodulator, Frequency, GaborDemodulator, TrackerDemodulator,
};
use crate::diagnostics::{DemodReport, QualitySummary, TimingBreakdown};
use crate::error::DemodError;
use crate::image::{ElementType, Field};
use crate::params::{DemodParams, SeedSelection, StrategyKind};
use crate::quality::QualityMap;
use crate::scheduler::{BucketScheduler, ScanPoint};
use log::debug;
use std::time::{Duration, Instant};

const STAGE_TRAVERSAL: &str = "traversal";

pub struct DemodRun {
    params: DemodParams,
    fields: DemodFields,
    scheduler: BucketScheduler,
    demodulator: Box<dyn Demodulator>,
    seed: ScanPoint,
    stopped: usize,
    timings: TimingBreakdown,
    traversal: Duration,
}

impl DemodRun {
    /// Prepare a run over `image`; the seed follows `params.seed`.
    pub fn new(image: Field<f64>, params: DemodParams) -> Result<Self, DemodError> {
        Self::build(image, None, params)
    }

    /// Prepare a run starting at an explicit pixel.
    pub fn with_seed(
        image: Field<f64>,
        params: DemodParams,
        seed: ScanPoint,
    ) -> Result<Self, DemodError> {
        Self::build(image, None, params.with_seed(seed))
    }

    /// Prepare a run ordered by a caller-supplied raw quality map instead of
    /// the gradient magnitude. The map is quantized into `params.levels`.
    pub fn with_quality(
        image: Field<f64>,
        quality: Field<f64>,
        params: DemodParams,
    ) -> Result<Self, DemodError> {
        if !quality.same_size(&image) {
            return Err(DemodError::DimensionMismatch {
                width: image.w,
                height: image.h,
                found: quality.len(),
            });
        }
        Self::build(image, Some(quality), params)
    }

    fn build(
        image: Field<f64>,
        quality: Option<Field<f64>>,
        params: DemodParams,
    ) -> Result<Self, DemodError> {
        if image.is_empty() {
            return Err(DemodError::EmptyImage);
        }
        let mut timings = TimingBreakdown::default();

        let start = Instant::now();
        let intensity = match params.remove_dc_sigma {
            Some(sigma) => {
                let background = convolve_normalized(&image, &KernelPair::gaussian(sigma));
                image.sub(&background)?
            }
            None => image,
        };
        timings.record_since("preprocess", start);

        let start = Instant::now();
        let quality = match quality {
            Some(raw) => QualityMap::from_raw(raw, params.levels)?,
            None => match params.prefilter_sigma {
                Some(sigma) => {
                    let smooth = convolve_normalized(&intensity, &KernelPair::gaussian(sigma));
                    QualityMap::build(&smooth, params.levels)?
                }
                None => QualityMap::build(&intensity, params.levels)?,
            },
        };
        timings.record_since("quality", start);

        let demodulator = build_demodulator(&params, &intensity)?;

        let start = Instant::now();
        let explicit = match params.seed {
            SeedSelection::Auto => None,
            SeedSelection::Explicit { x, y } => Some(ScanPoint::new(x, y)),
            SeedSelection::TunedResponse { wx, wy } => Some(tuned_seed(
                &intensity,
                Frequency::new(wx, wy),
                params.gabor.precision,
            )?),
        };
        let mut scheduler = BucketScheduler::new(quality);
        let seed = scheduler.initialize_seed(explicit)?;
        timings.record_since("seed", start);

        debug!(
            "DemodRun::new {}x{} strategy={} levels={} quality range [{:.4}, {:.4}] seed=({}, {})",
            intensity.w,
            intensity.h,
            demodulator.name(),
            params.levels,
            scheduler.quality().range.0,
            scheduler.quality().range.1,
            seed.x,
            seed.y
        );

        Ok(Self {
            params,
            fields: DemodFields::new(intensity),
            scheduler,
            demodulator,
            seed,
            stopped: 0,
            timings,
            traversal: Duration::ZERO,
        })
    }

    /// Demodulate the next pixel in quality order.
    ///
    /// Returns the processed pixel, or `None` once the traversal is
    /// exhausted. Calling again after `None` keeps returning `None`.
    pub fn next(&mut self) -> Result<Option<ScanPoint>, DemodError> {
        let start = Instant::now();
        let Some(p) = self.scheduler.next() else {
            return Ok(None);
        };
        let is_seed = self.scheduler.pops() == 1;
        let estimate = self.demodulator.demodulate(&self.fields, p, is_seed)?;
        self.fields.accept(p, &estimate);

        let expand = match self.params.scan_min_freq {
            Some(min_freq) if !is_seed => estimate.freq.norm() >= min_freq,
            _ => true,
        };
        if expand {
            self.scheduler.enqueue_neighbors(p);
        } else {
            self.stopped += 1;
        }
        self.traversal += start.elapsed();
        Ok(Some(p))
    }

    /// Drain the scheduler.
    pub fn run_to_completion(&mut self) -> Result<DemodReport, DemodError> {
        while self.next()?.is_some() {}
        debug!(
            "DemodRun::run_to_completion pops={} enqueued={} demodulated={} stopped={} traversal_ms={:.3}",
            self.scheduler.pops(),
            self.scheduler.enqueued(),
            self.fields.demodulated_count(),
            self.stopped,
            self.traversal.as_secs_f64() * 1000.0
        );
        Ok(self.report())
    }

    /// Clear all outputs and re-queue the seed. Setup stages are kept.
    pub fn reset(&mut self) -> Result<(), DemodError> {
        self.fields.reset();
        self.scheduler.clear();
        self.scheduler.initialize_seed(Some(self.seed))?;
        self.stopped = 0;
        self.traversal = Duration::ZERO;
        self.timings.remove(STAGE_TRAVERSAL);
        Ok(())
    }

    /// Summary of the run so far.
    pub fn report(&self) -> DemodReport {
        let quality = self.scheduler.quality();
        let mut timings = self.timings.clone();
        timings.push(STAGE_TRAVERSAL, self.traversal.as_secs_f64() * 1000.0);
        DemodReport {
            width: self.fields.width(),
            height: self.fields.height(),
            strategy: self.params.strategy,
            seed: self.seed,
            quality: QualitySummary {
                levels: quality.level_count,
                range: quality.range,
                histogram: quality.histogram(),
            },
            pops: self.scheduler.pops(),
            enqueued: self.scheduler.enqueued(),
            demodulated: self.fields.demodulated_count(),
            stopped: self.stopped,
            timings,
        }
    }

    pub fn fields(&self) -> &DemodFields {
        &self.fields
    }

    pub fn into_fields(self) -> DemodFields {
        self.fields
    }

    pub fn phase(&self) -> &Field<f64> {
        &self.fields.phase
    }

    pub fn quality(&self) -> &QualityMap {
        self.scheduler.quality()
    }

    pub fn scheduler(&self) -> &BucketScheduler {
        &self.scheduler
    }

    pub fn seed(&self) -> ScanPoint {
        self.seed
    }

    pub fn params(&self) -> &DemodParams {
        &self.params
    }

    pub fn strategy_name(&self) -> &'static str {
        self.demodulator.name()
    }

    /// True once the scheduler has nothing left to pop.
    pub fn is_finished(&self) -> bool {
        self.scheduler.pending() == 0
    }
}

fn build_demodulator(
    params: &DemodParams,
    intensity: &Field<f64>,
) -> Result<Box<dyn Demodulator>, DemodError> {
    match params.strategy {
        StrategyKind::Gabor => Ok(Box::new(GaborDemodulator::new(params.gabor)?)),
        StrategyKind::Tracker => Ok(Box::new(TrackerDemodulator::new(
            params.tracker,
            intensity,
        ))),
        StrategyKind::RegularizedTracker => {
            Err(DemodError::Unavailable("regularized phase tracker"))
        }
    }
}

/// Pixel with the strongest whole-field Gabor response at `freq`.
///
/// Ties keep the first pixel in row-major order.
pub fn tuned_seed(
    image: &Field<f64>,
    freq: Frequency,
    element: ElementType,
) -> Result<ScanPoint, DemodError> {
    if image.is_empty() {
        return Err(DemodError::EmptyImage);
    }
    let (re, im) = gabor_filter(image, freq, element)?;
    let mut best = ScanPoint::new(0, 0);
    let mut best_mag = f64::NEG_INFINITY;
    for y in 0..re.h {
        for x in 0..re.w {
            let mag = re.get(x, y).hypot(im.get(x, y));
            if mag > best_mag {
                best_mag = mag;
                best = ScanPoint::new(x, y);
            }
        }
    }
    Ok(best)
}

/// Run a full demodulation and return the fields with the report.
pub fn demodulate(
    image: Field<f64>,
    params: DemodParams,
) -> Result<(DemodFields, DemodReport), DemodError> {
    let mut run = DemodRun::new(image, params)?;
    let report = run.run_to_completion()?;
    Ok((run.into_fields(), report))
}
