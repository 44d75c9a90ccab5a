//! Separable 2D convolution with truncated borders.
//!
//! The 2D kernel is the outer product of a row kernel `kx` and a column kernel
//! `ky`. Output is computed in two 1D passes (rows, then columns). Near the
//! borders the kernel window is truncated to the samples that exist: there is
//! no zero padding, replication or wrapping, the missing taps simply do not
//! contribute.
//!
//! Two flavours share that window rule:
//! - raw ([`convolve`], [`convolve_at`]): plain weighted sum. Border pixels
//!   see fewer taps and are not compensated. The Gabor path uses this form.
//! - normalized ([`convolve_normalized`], [`convolve_normalized_at`]): the
//!   sum is divided by the total weight of the taps that fell inside the
//!   image, so smoothing a constant image leaves it constant up to the edges.
//!   A window whose tap weight is exactly zero yields `0`.
//!
//! Kernels are applied as true convolutions (mirrored), which only matters for
//! asymmetric taps such as the odd part of a Gabor kernel. A kernel of length
//! `L` is centred at index `L / 2`.
//!
//! With the `parallel` feature both passes run row-parallel through rayon;
//! rows are independent so results are identical.
use crate::image::{Field, ImageView, ImageViewMut};

/// A separable kernel described by its row and column taps.
pub trait SeparableKernel {
    /// Taps applied along x (within a row).
    fn taps_x(&self) -> &[f64];
    /// Taps applied along y (within a column).
    fn taps_y(&self) -> &[f64];
}

/// Owned pair of 1D kernels.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelPair {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl KernelPair {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self { x, y }
    }

    /// Same taps along both axes.
    pub fn symmetric(taps: Vec<f64>) -> Self {
        Self {
            x: taps.clone(),
            y: taps,
        }
    }

    /// Normalized Gaussian smoothing kernel on both axes.
    pub fn gaussian(sigma: f64) -> Self {
        Self::symmetric(gaussian_taps(sigma))
    }
}

impl SeparableKernel for KernelPair {
    #[inline]
    fn taps_x(&self) -> &[f64] {
        &self.x
    }
    #[inline]
    fn taps_y(&self) -> &[f64] {
        &self.y
    }
}

/// Sampled Gaussian with radius `floor(3σ)` (at least 1) and unit sum.
pub fn gaussian_taps(sigma: f64) -> Vec<f64> {
    let sigma = if sigma.is_finite() && sigma > 0.0 {
        sigma
    } else {
        1.0
    };
    let radius = ((3.0 * sigma).floor() as usize).max(1);
    let r = radius as isize;
    let denom = 2.0 * sigma * sigma;
    let mut taps: Vec<f64> = (-r..=r)
        .map(|i| (-((i * i) as f64) / denom).exp())
        .collect();
    let sum: f64 = taps.iter().sum();
    taps.iter_mut().for_each(|t| *t /= sum);
    taps
}

/// Inclusive sample range and tap offset of a truncated window.
///
/// For output position `pos` in a signal of length `len`, samples
/// `lo..=hi` contribute and sample `s` pairs with tap `left + pos - s`.
#[inline]
fn window(pos: usize, len: usize, taps: usize) -> (usize, usize, usize) {
    let left = taps / 2;
    let right = taps - 1 - left;
    let lo = pos.saturating_sub(right);
    let hi = (pos + left).min(len - 1);
    (lo, hi, left)
}

fn filter_line(src: &[f64], dst: &mut [f64], taps: &[f64]) {
    let len = src.len();
    if len == 0 || taps.is_empty() {
        dst.iter_mut().for_each(|d| *d = 0.0);
        return;
    }
    for (pos, out) in dst.iter_mut().enumerate() {
        let (lo, hi, left) = window(pos, len, taps.len());
        let mut acc = 0.0;
        for (s, &v) in src.iter().enumerate().take(hi + 1).skip(lo) {
            acc += v * taps[left + pos - s];
        }
        *out = acc;
    }
}

/// Sum of the taps that remain inside a line of length `len` at `pos`.
fn window_weight(pos: usize, len: usize, taps: &[f64]) -> f64 {
    if len == 0 || taps.is_empty() {
        return 0.0;
    }
    let (lo, hi, left) = window(pos, len, taps.len());
    (lo..=hi).map(|s| taps[left + pos - s]).sum()
}

fn horizontal_pass(data: &Field<f64>, kx: &[f64], out: &mut Field<f64>) {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        let w = data.w;
        out.data
            .par_chunks_mut(w.max(1))
            .enumerate()
            .for_each(|(y, dst)| filter_line(data.row(y), dst, kx));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for y in 0..data.h {
            filter_line(data.row(y), out.row_mut(y), kx);
        }
    }
}

fn vertical_row(tmp: &Field<f64>, ky: &[f64], y: usize, dst: &mut [f64]) {
    dst.iter_mut().for_each(|d| *d = 0.0);
    if ky.is_empty() {
        return;
    }
    let (lo, hi, left) = window(y, tmp.h, ky.len());
    for s in lo..=hi {
        let weight = ky[left + y - s];
        for (d, &v) in dst.iter_mut().zip(tmp.row(s)) {
            *d += v * weight;
        }
    }
}

fn vertical_pass(tmp: &Field<f64>, ky: &[f64], out: &mut Field<f64>) {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        let w = tmp.w;
        out.data
            .par_chunks_mut(w.max(1))
            .enumerate()
            .for_each(|(y, dst)| vertical_row(tmp, ky, y, dst));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for y in 0..tmp.h {
            vertical_row(tmp, ky, y, out.row_mut(y));
        }
    }
}

/// Raw separable convolution over the whole field.
pub fn convolve(data: &Field<f64>, kernel: &impl SeparableKernel) -> Field<f64> {
    convolve_taps(data, kernel.taps_x(), kernel.taps_y())
}

/// Raw separable convolution with explicit row/column taps.
pub fn convolve_taps(data: &Field<f64>, kx: &[f64], ky: &[f64]) -> Field<f64> {
    let mut out = Field::new(data.w, data.h);
    if data.is_empty() {
        return out;
    }
    let mut tmp = Field::new(data.w, data.h);
    horizontal_pass(data, kx, &mut tmp);
    vertical_pass(&tmp, ky, &mut out);
    out
}

/// Normalized separable convolution over the whole field.
pub fn convolve_normalized(data: &Field<f64>, kernel: &impl SeparableKernel) -> Field<f64> {
    let (kx, ky) = (kernel.taps_x(), kernel.taps_y());
    let mut out = convolve_taps(data, kx, ky);
    let wx: Vec<f64> = (0..data.w).map(|x| window_weight(x, data.w, kx)).collect();
    for (y, row) in out.rows_mut().enumerate() {
        let wy = window_weight(y, data.h, ky);
        for (v, &wxx) in row.iter_mut().zip(&wx) {
            let weight = wxx * wy;
            *v = if weight != 0.0 { *v / weight } else { 0.0 };
        }
    }
    out
}

/// Raw convolution evaluated at a single pixel `(x, y)`.
///
/// Matches the value [`convolve_taps`] produces at that pixel.
pub fn convolve_at(data: &Field<f64>, kx: &[f64], ky: &[f64], x: usize, y: usize) -> f64 {
    convolve_at_weighted(data, kx, ky, x, y).0
}

/// Normalized convolution evaluated at a single pixel `(x, y)`.
pub fn convolve_normalized_at(
    data: &Field<f64>,
    kx: &[f64],
    ky: &[f64],
    x: usize,
    y: usize,
) -> f64 {
    let (sum, weight) = convolve_at_weighted(data, kx, ky, x, y);
    if weight != 0.0 {
        sum / weight
    } else {
        0.0
    }
}

fn convolve_at_weighted(
    data: &Field<f64>,
    kx: &[f64],
    ky: &[f64],
    x: usize,
    y: usize,
) -> (f64, f64) {
    if data.is_empty() || kx.is_empty() || ky.is_empty() || x >= data.w || y >= data.h {
        return (0.0, 0.0);
    }
    let (x0, x1, lx) = window(x, data.w, kx.len());
    let (y0, y1, ly) = window(y, data.h, ky.len());
    let wx: f64 = (x0..=x1).map(|s| kx[lx + x - s]).sum();
    let mut sum = 0.0;
    let mut weight = 0.0;
    for s in y0..=y1 {
        let row = data.row(s);
        let mut f = 0.0;
        for (xx, &v) in row.iter().enumerate().take(x1 + 1).skip(x0) {
            f += v * kx[lx + x - xx];
        }
        let wy = ky[ly + y - s];
        sum += f * wy;
        weight += wx * wy;
    }
    (sum, weight)
}
