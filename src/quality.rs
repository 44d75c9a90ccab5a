//! Quality map: per-pixel reliability from local intensity differences.
//!
//! The raw reliability of a pixel is the magnitude of its first differences,
//! `sqrt(dx² + dy²)`. Along each axis the difference is taken against the
//! predecessor sample when there is one (`g[x] - g[x-1]`) and against the
//! successor otherwise (`g[x+1] - g[x]`, first column/row only). A line of
//! length one has no neighbour and contributes `0`.
//!
//! Raw values are binned into `levels` discrete levels using the observed
//! minimum `a` and maximum `b` of the map: with `step = (b - a) / levels`,
//! level `l` covers the closed interval `[a + l·step, a + (l+1)·step]`. A
//! value on a shared boundary goes to the lower level, so the maximum falls
//! into `levels - 1` and the minimum into `0`. When the map is constant
//! (`step == 0`) every pixel is level 0. Level 0 is the least reliable.
use crate::error::DemodError;
use crate::image::{Field, ImageView};
use log::debug;

/// Quantized quality levels together with the raw map they came from.
#[derive(Clone, Debug)]
pub struct QualityMap {
    /// Discrete level per pixel, in `[0, level_count)`
    pub levels: Field<usize>,
    /// Continuous reliability value per pixel
    pub raw: Field<f64>,
    /// Number of levels used for quantization
    pub level_count: usize,
    /// Observed `(min, max)` of the raw map
    pub range: (f64, f64),
}

impl QualityMap {
    /// Build the map from first differences of `image`.
    pub fn build(image: &Field<f64>, levels: usize) -> Result<Self, DemodError> {
        let raw = gradient_magnitude(image);
        Self::from_raw(raw, levels)
    }

    /// Quantize a caller-supplied raw reliability map.
    pub fn from_raw(raw: Field<f64>, levels: usize) -> Result<Self, DemodError> {
        if levels == 0 {
            return Err(DemodError::InvalidLevels);
        }
        let range = raw.min_max().unwrap_or((0.0, 0.0));
        let step = (range.1 - range.0) / levels as f64;
        if step == 0.0 && !raw.is_empty() {
            debug!(
                "QualityMap: constant raw map ({:.4}) over {}x{} -> all pixels at level 0",
                range.0, raw.w, raw.h
            );
        }
        let quantized = raw.map(|v| level_for(v, range.0, step, levels));
        Ok(Self {
            levels: quantized,
            raw,
            level_count: levels,
            range,
        })
    }

    #[inline]
    pub fn level(&self, x: usize, y: usize) -> usize {
        self.levels.get(x, y)
    }

    pub fn width(&self) -> usize {
        self.levels.w
    }

    pub fn height(&self) -> usize {
        self.levels.h
    }

    /// Number of pixels in each level, lowest first.
    pub fn histogram(&self) -> Vec<usize> {
        let mut hist = vec![0usize; self.level_count];
        for &l in &self.levels.data {
            hist[l] += 1;
        }
        hist
    }
}

/// Level of raw value `v` given the map minimum `a` and bucket width `step`.
///
/// Boundary values resolve to the lower bucket; the result is clamped to
/// `[0, levels - 1]`. Non-finite values land in level 0.
#[inline]
pub fn level_for(v: f64, a: f64, step: f64, levels: usize) -> usize {
    if levels == 0 || step <= 0.0 || !v.is_finite() {
        return 0;
    }
    let t = (v - a) / step;
    if t <= 0.0 {
        return 0;
    }
    let upper = t.ceil() as usize;
    upper.saturating_sub(1).min(levels - 1)
}

/// `sqrt(dx² + dy²)` from predecessor differences (successor on the first line).
pub fn gradient_magnitude(image: &Field<f64>) -> Field<f64> {
    let (w, h) = (image.w, image.h);
    let mut out = Field::new(w, h);
    for y in 0..h {
        let row = image.row(y);
        for x in 0..w {
            let g = row[x];
            let dx = if x >= 1 {
                g - row[x - 1]
            } else if x + 1 < w {
                row[x + 1] - g
            } else {
                0.0
            };
            let dy = if y >= 1 {
                g - image.get(x, y - 1)
            } else if y + 1 < h {
                image.get(x, y + 1) - g
            } else {
                0.0
            };
            out.set(x, y, (dx * dx + dy * dy).sqrt());
        }
    }
    out
}
