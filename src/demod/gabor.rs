//! Adaptive Gabor demodulation.
//!
//! Kernel
//! - 1D pair `exp(-i²/(2σ²))·cos(f·i)` / `exp(-i²/(2σ²))·sin(f·i)` for
//!   `i ∈ [-N, N]`, `N = floor(3σ)`.
//! - `σ = clamp(|1.5708 / f|, 1, 22)` per axis, so a quarter period of the
//!   tuned frequency spans one standard deviation. Near zero frequency the
//!   support saturates at `2·66 + 1` taps; at high frequency it shrinks to
//!   7 taps.
//!
//! Response
//! - The 2D complex kernel is the product of the x and y pairs; with the raw
//!   separable convolution this gives `Re = rr − ii` and `Im = ri + ir`
//!   (first letter: x kernel part, second: y kernel part).
//!
//! Frequency
//! - `ω = (Δim·Re − Im·Δre) / (Re² + Im²)`, the phase gradient of the
//!   response, using the backward neighbour when it exists and the forward
//!   neighbour on the first row/column. A zero response yields `0`.
//!
//! Per pixel the kernel is tuned to the predicted neighbour frequency, the
//! frequency is re-estimated from the response, and the cycle repeats a fixed
//! number of times (more at the seed). There is no convergence test.
use super::predict::FrequencyPrediction;
use super::{DemodFields, Demodulator, Frequency, PixelEstimate};
use crate::convolution::{convolve_at, convolve_taps};
use crate::error::DemodError;
use crate::image::{ElementType, Field};
use crate::scheduler::ScanPoint;
use log::warn;
use nalgebra::Complex;
use serde::{Deserialize, Serialize};

pub const SIGMA_MIN: f64 = 1.0;
pub const SIGMA_MAX: f64 = 22.0;
/// Longest kernel the σ clamp allows.
pub const MAX_KERNEL_LEN: usize = 2 * 66 + 1;

const QUARTER_PERIOD: f64 = 1.5708;

/// Options for the adaptive Gabor strategy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaborOptions {
    /// Tune/estimate cycles per pixel.
    pub iters: usize,
    /// Tune/estimate cycles at the seed pixel.
    pub seed_iters: usize,
    /// Upper bound on σ, itself capped at 22.
    pub max_sigma: f64,
    /// Frequency used when no demodulated neighbour exists.
    pub default_freq: [f64; 2],
    /// Estimated frequency components are clamped to `[-max_freq, max_freq]`.
    pub max_freq: f64,
    /// Floor on the magnitude of each estimated component; the sign is kept
    /// and an exact zero is raised to `+min_freq`. `0` disables the floor.
    pub min_freq: f64,
    /// Precision of the generated kernel taps.
    pub precision: ElementType,
    pub prediction: FrequencyPrediction,
}

impl Default for GaborOptions {
    fn default() -> Self {
        Self {
            iters: 1,
            seed_iters: 3,
            max_sigma: SIGMA_MAX,
            default_freq: [0.7, 0.7],
            max_freq: std::f64::consts::PI,
            min_freq: 0.0,
            precision: ElementType::F64,
            prediction: FrequencyPrediction::Peak,
        }
    }
}

impl GaborOptions {
    pub fn default_frequency(&self) -> Frequency {
        Frequency::new(self.default_freq[0], self.default_freq[1])
    }
}

/// σ for a kernel tuned to `freq`, within `[1, min(max_sigma, 22)]`.
pub fn sigma_for_frequency(freq: f64, max_sigma: f64) -> f64 {
    let upper = if max_sigma.is_nan() {
        SIGMA_MAX
    } else {
        max_sigma.clamp(SIGMA_MIN, SIGMA_MAX)
    };
    clamp_sigma((QUARTER_PERIOD / freq).abs(), upper)
}

/// Clamp `sigma` into `[1, upper]`; NaN maps to `upper`.
#[inline]
fn clamp_sigma(sigma: f64, upper: f64) -> f64 {
    if sigma.is_nan() {
        upper
    } else {
        sigma.clamp(SIGMA_MIN, upper)
    }
}

/// 1D Gabor kernel pair.
#[derive(Clone, Debug, PartialEq)]
pub struct GaborKernel {
    pub real: Vec<f64>,
    pub imag: Vec<f64>,
    pub freq: f64,
    pub sigma: f64,
}

impl GaborKernel {
    /// Sample the kernel pair for tuning frequency `freq` and scale `sigma`.
    ///
    /// `sigma` is clamped to `[SIGMA_MIN, SIGMA_MAX]` (NaN gives the upper
    /// bound), so the kernel never exceeds [`MAX_KERNEL_LEN`] taps. With
    /// [`ElementType::F32`] the taps are rounded to single precision.
    pub fn generate(freq: f64, sigma: f64, element: ElementType) -> Result<Self, DemodError> {
        let round: fn(f64) -> f64 = match element {
            ElementType::F64 => |v| v,
            ElementType::F32 => |v| v as f32 as f64,
            other => return Err(DemodError::UnsupportedType(other)),
        };
        let sigma = clamp_sigma(sigma, SIGMA_MAX);
        let n = (3.0 * sigma).floor() as isize;
        let denom = 2.0 * sigma * sigma;
        let mut real = Vec::with_capacity((2 * n + 1) as usize);
        let mut imag = Vec::with_capacity((2 * n + 1) as usize);
        for i in -n..=n {
            let fi = i as f64;
            let envelope = (-(fi * fi) / denom).exp();
            real.push(round(envelope * (freq * fi).cos()));
            imag.push(round(envelope * (freq * fi).sin()));
        }
        Ok(Self {
            real,
            imag,
            freq,
            sigma,
        })
    }

    /// Kernel tuned to `freq` with σ from [`sigma_for_frequency`].
    pub fn for_frequency(freq: f64, max_sigma: f64, element: ElementType) -> Result<Self, DemodError> {
        Self::generate(freq, sigma_for_frequency(freq, max_sigma), element)
    }

    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }
}

/// Complex Gabor response at one pixel.
pub fn response_at(
    image: &Field<f64>,
    kx: &GaborKernel,
    ky: &GaborKernel,
    x: usize,
    y: usize,
) -> Complex<f64> {
    let rr = convolve_at(image, &kx.real, &ky.real, x, y);
    let ii = convolve_at(image, &kx.imag, &ky.imag, x, y);
    let ri = convolve_at(image, &kx.real, &ky.imag, x, y);
    let ir = convolve_at(image, &kx.imag, &ky.real, x, y);
    Complex::new(rr - ii, ri + ir)
}

/// Whole-field Gabor filtering at a fixed tuning frequency.
///
/// Returns `(re, im)`.
pub fn gabor_filter(
    image: &Field<f64>,
    freq: Frequency,
    element: ElementType,
) -> Result<(Field<f64>, Field<f64>), DemodError> {
    let kx = GaborKernel::for_frequency(freq.x, SIGMA_MAX, element)?;
    let ky = GaborKernel::for_frequency(freq.y, SIGMA_MAX, element)?;
    let rr = convolve_taps(image, &kx.real, &ky.real);
    let ii = convolve_taps(image, &kx.imag, &ky.imag);
    let ri = convolve_taps(image, &kx.real, &ky.imag);
    let ir = convolve_taps(image, &kx.imag, &ky.real);
    let re = rr.sub(&ii)?;
    let mut im = ri;
    for (v, o) in im.data.iter_mut().zip(&ir.data) {
        *v += o;
    }
    Ok((re, im))
}

/// Phase gradient `Im(conj(z)·Δz) / |z|²`; `0` when `|z| == 0`.
#[inline]
pub fn estimate_frequency(z: Complex<f64>, dz: Complex<f64>) -> f64 {
    let magn = z.norm_sqr();
    if magn == 0.0 || !magn.is_finite() {
        return 0.0;
    }
    let w = (dz.im * z.re - z.im * dz.re) / magn;
    if w.is_finite() {
        w
    } else {
        0.0
    }
}

/// Neighbour used for the finite difference at `pos`: the predecessor when it
/// exists (backward), else the successor (forward).
#[inline]
fn difference_neighbour(pos: usize, len: usize) -> Option<(usize, bool)> {
    if pos >= 1 {
        Some((pos - 1, true))
    } else if pos + 1 < len {
        Some((pos + 1, false))
    } else {
        None
    }
}

#[inline]
fn difference(z: Complex<f64>, zn: Complex<f64>, backward: bool) -> Complex<f64> {
    if backward {
        z - zn
    } else {
        zn - z
    }
}

/// Local frequency at `(x, y)` from whole-field response components.
pub fn frequency_at(re: &Field<f64>, im: &Field<f64>, x: usize, y: usize) -> Frequency {
    let z = Complex::new(re.get(x, y), im.get(x, y));
    let fx = difference_neighbour(x, re.w).map_or(0.0, |(nx, backward)| {
        let zn = Complex::new(re.get(nx, y), im.get(nx, y));
        estimate_frequency(z, difference(z, zn, backward))
    });
    let fy = difference_neighbour(y, re.h).map_or(0.0, |(ny, backward)| {
        let zn = Complex::new(re.get(x, ny), im.get(x, ny));
        estimate_frequency(z, difference(z, zn, backward))
    });
    Frequency::new(fx, fy)
}

/// Local frequency fields `(fx, fy)` for a whole-field response.
pub fn frequency_fields(re: &Field<f64>, im: &Field<f64>) -> (Field<f64>, Field<f64>) {
    let mut fx = Field::new(re.w, re.h);
    let mut fy = Field::new(re.w, re.h);
    for y in 0..re.h {
        for x in 0..re.w {
            let f = frequency_at(re, im, x, y);
            fx.set(x, y, f.x);
            fy.set(x, y, f.y);
        }
    }
    (fx, fy)
}

/// Wrapped phase `atan2(im, re)` of a whole-field response.
pub fn phase_field(re: &Field<f64>, im: &Field<f64>) -> Field<f64> {
    Field::from_fn(re.w, re.h, |x, y| im.get(x, y).atan2(re.get(x, y)))
}

fn clamp_component(v: f64, min_freq: f64, max_freq: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.abs().clamp(min_freq, max_freq).copysign(v)
    }
}

/// Per-pixel adaptive Gabor strategy.
#[derive(Clone, Debug)]
pub struct GaborDemodulator {
    options: GaborOptions,
}

impl GaborDemodulator {
    pub fn new(mut options: GaborOptions) -> Result<Self, DemodError> {
        if !options.precision.is_float() {
            return Err(DemodError::UnsupportedType(options.precision));
        }
        if !(options.max_sigma >= SIGMA_MIN && options.max_sigma <= SIGMA_MAX) {
            warn!(
                "GaborDemodulator: max_sigma {} outside [{SIGMA_MIN}, {SIGMA_MAX}], clamping",
                options.max_sigma
            );
            options.max_sigma = sigma_for_frequency(0.0, options.max_sigma);
        }
        if !(options.max_freq > 0.0) {
            warn!(
                "GaborDemodulator: max_freq {} is not positive, using π",
                options.max_freq
            );
            options.max_freq = std::f64::consts::PI;
        }
        if !(options.min_freq >= 0.0 && options.min_freq <= options.max_freq) {
            warn!(
                "GaborDemodulator: min_freq {} outside [0, {}], disabling the floor",
                options.min_freq, options.max_freq
            );
            options.min_freq = 0.0;
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &GaborOptions {
        &self.options
    }

    /// One tune/estimate cycle at `p` starting from `freq`.
    fn refine(
        &self,
        image: &Field<f64>,
        p: ScanPoint,
        freq: Frequency,
    ) -> Result<(Complex<f64>, Frequency), DemodError> {
        let o = &self.options;
        let kx = GaborKernel::for_frequency(freq.x, o.max_sigma, o.precision)?;
        let ky = GaborKernel::for_frequency(freq.y, o.max_sigma, o.precision)?;
        let z = response_at(image, &kx, &ky, p.x, p.y);

        let fx = difference_neighbour(p.x, image.w).map_or(freq.x, |(nx, backward)| {
            let zn = response_at(image, &kx, &ky, nx, p.y);
            estimate_frequency(z, difference(z, zn, backward))
        });
        let fy = difference_neighbour(p.y, image.h).map_or(freq.y, |(ny, backward)| {
            let zn = response_at(image, &kx, &ky, p.x, ny);
            estimate_frequency(z, difference(z, zn, backward))
        });
        let next = Frequency::new(
            clamp_component(fx, o.min_freq, o.max_freq),
            clamp_component(fy, o.min_freq, o.max_freq),
        );
        Ok((z, next))
    }
}

impl Demodulator for GaborDemodulator {
    fn name(&self) -> &'static str {
        "gabor"
    }

    fn demodulate(
        &mut self,
        fields: &DemodFields,
        pixel: ScanPoint,
        is_seed: bool,
    ) -> Result<PixelEstimate, DemodError> {
        let default = self.options.default_frequency();
        let (mut freq, iters) = if is_seed {
            (default, self.options.seed_iters)
        } else {
            (
                self.options.prediction.predict_or(fields, pixel, default),
                self.options.iters,
            )
        };
        let mut response = Complex::new(0.0, 0.0);
        for _ in 0..iters.max(1) {
            let (z, next) = self.refine(&fields.intensity, pixel, freq)?;
            response = z;
            freq = next;
        }
        Ok(PixelEstimate {
            phase: response.im.atan2(response.re),
            freq,
            response,
        })
    }
}
