//! 1D frequency tracker.
//!
//! The intensity is read as `g = cos(φ)` after normalizing to `[-1, 1]`. Given
//! the phase `φ` at one sample and `g` at the next, the next phase is one of
//! `±acos(g) + 2πk`; the step `ω` between them is wrapped into `(-π, π]`. Cosine
//! is even, so both signs are locally valid and the tracker keeps the one that
//! minimizes the second-order potential
//! `V = (φ(x−1) − 2φ(x) + φ(x+1))²`, i.e. the step closest to the previous one.
//!
//! Scanlines need a three-sample seed: the seed phase plus estimates for both
//! neighbours, see [`seed_neighbourhood`]. From there [`demodulate_scanline`]
//! walks outward to the bounds of the requested sub-range.
//!
//! The regularized 2D generalization is not provided; [`regularized_tracker`]
//! reports it as unavailable.
use super::{DemodFields, Demodulator, Frequency, PixelEstimate};
use crate::error::DemodError;
use crate::image::Field;
use crate::scheduler::ScanPoint;
use nalgebra::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Direction of a tracking step along a scanline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

impl Direction {
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Direction::Backward => -1.0,
            Direction::Forward => 1.0,
        }
    }
}

/// Arc-cosine with the argument clamped to `[-1, 1]`.
///
/// Arguments `≥ 1` give `0`, arguments `≤ -1` give `π`.
#[inline]
pub fn safe_acos(g: f64) -> f64 {
    if g >= 1.0 {
        0.0
    } else if g <= -1.0 {
        PI
    } else {
        g.acos()
    }
}

/// Second-order potential `(c0 − 2·c1 + c2)²` of a three-sample clique.
#[inline]
pub fn potential(clique: [f64; 3]) -> f64 {
    let d = clique[0] - 2.0 * clique[1] + clique[2];
    d * d
}

/// Wrap an angle into `(-π, π]`.
#[inline]
pub fn wrap_phase(a: f64) -> f64 {
    let w = (a + PI).rem_euclid(2.0 * PI) - PI;
    if w <= -PI {
        w + 2.0 * PI
    } else {
        w
    }
}

/// Both frequencies compatible with phase `p` at one sample and cosine `g` at
/// the adjacent sample in direction `dir`.
///
/// The adjacent phase is `p + dir·ω`; candidate 0 lands on `+acos(g)`,
/// candidate 1 on `−acos(g)` (mod 2π).
pub fn candidate_frequencies(g: f64, p: f64, dir: Direction) -> [f64; 2] {
    let a = safe_acos(g);
    let s = dir.sign();
    [wrap_phase(s * (a - p)), wrap_phase(s * (-a - p))]
}

/// Candidate step closest to `prev` (minimum potential).
#[inline]
fn pick_step(candidates: [f64; 2], prev: f64) -> f64 {
    if (candidates[1] - prev).abs() < (candidates[0] - prev).abs() {
        candidates[1]
    } else {
        candidates[0]
    }
}

/// Phases of the two neighbours of a seed sample.
///
/// `g` holds the cosine samples at `x−1, x, x+1`; the seed phase is taken
/// as given. Each neighbour gets the principal arc-cosine of its sample, so
/// both estimates lie in `[0, π]`.
pub fn seed_neighbourhood(g: [f64; 3], seed_phase: f64) -> [f64; 3] {
    [safe_acos(g[0]), seed_phase, safe_acos(g[2])]
}

/// Track phase along `phase`/`g` from an initialized seed.
///
/// `phase[seed-1..=seed+1]` must already hold the seed neighbourhood. Samples
/// in `li..=ls` outside that neighbourhood are overwritten; the range is
/// clipped to the slice. Sides with fewer than two samples of room are left
/// untouched.
pub fn demodulate_scanline(phase: &mut [f64], g: &[f64], seed: usize, li: usize, ls: usize) {
    let n = phase.len().min(g.len());
    if n == 0 {
        return;
    }
    let ls = ls.min(n - 1);
    if seed < li || seed > ls {
        return;
    }
    // forward
    let mut x = seed + 2;
    while x <= ls {
        let prev = phase[x - 1] - phase[x - 2];
        let cands = candidate_frequencies(g[x], phase[x - 1], Direction::Forward);
        phase[x] = phase[x - 1] + pick_step(cands, prev);
        x += 1;
    }
    // backward
    if seed >= li + 2 {
        for x in (li..=seed - 2).rev() {
            let prev = phase[x + 2] - phase[x + 1];
            let cands = candidate_frequencies(g[x], phase[x + 1], Direction::Backward);
            phase[x] = phase[x + 1] - pick_step(cands, prev);
        }
    }
}

/// Initialize the seed neighbourhood on a scanline and track `li..=ls`.
///
/// Only samples inside `li..=ls` (clipped to the slice) are written; a seed
/// outside that range leaves the line untouched.
fn track_line(phase: &mut [f64], g: &[f64], seed: usize, seed_phase: f64, li: usize, ls: usize) {
    let n = phase.len().min(g.len());
    if n == 0 {
        return;
    }
    let ls = ls.min(n - 1);
    if seed < li || seed > ls {
        return;
    }
    phase[seed] = seed_phase;
    let has_prev = seed > li;
    let has_next = seed < ls;
    if has_prev && has_next {
        let nb = seed_neighbourhood([g[seed - 1], g[seed], g[seed + 1]], seed_phase);
        phase[seed - 1] = nb[0];
        phase[seed + 1] = nb[2];
    } else if has_next {
        phase[seed + 1] = safe_acos(g[seed + 1]);
    } else if has_prev {
        phase[seed - 1] = safe_acos(g[seed - 1]);
    }
    demodulate_scanline(phase, g, seed, li, ls);
}

/// Track row `row` of `g` (cosine samples) between columns `li..=ls`.
pub fn demodulate_row(
    phase: &mut Field<f64>,
    g: &Field<f64>,
    row: usize,
    seed: usize,
    seed_phase: f64,
    li: usize,
    ls: usize,
) {
    if row >= g.h || !phase.same_size(g) {
        return;
    }
    let start = phase.idx(0, row);
    let line = &mut phase.data[start..start + g.w];
    let src = &g.data[start..start + g.w];
    track_line(line, src, seed, seed_phase, li, ls);
}

/// Track column `column` of `g` between rows `li..=ls`.
pub fn demodulate_column(
    phase: &mut Field<f64>,
    g: &Field<f64>,
    column: usize,
    seed: usize,
    seed_phase: f64,
    li: usize,
    ls: usize,
) {
    if column >= g.w || !phase.same_size(g) {
        return;
    }
    let mut line = phase.column(column);
    let src = g.column(column);
    track_line(&mut line, &src, seed, seed_phase, li, ls);
    phase.set_column(column, &line);
}

/// Regularized 2D phase tracker. Not provided.
pub fn regularized_tracker(
    _phase: &mut Field<f64>,
    _g: &Field<f64>,
    _lambda: f64,
    _neighbourhood: usize,
    _seed: ScanPoint,
) -> Result<(), DemodError> {
    Err(DemodError::Unavailable("regularized phase tracker"))
}

/// Map intensities linearly so the observed range becomes `[-1, 1]`.
///
/// A constant image maps to all zeros.
pub fn normalize_fringes(image: &Field<f64>) -> Field<f64> {
    let (lo, hi) = image.min_max().unwrap_or((0.0, 0.0));
    let mid = 0.5 * (lo + hi);
    let half = 0.5 * (hi - lo);
    image.map(|v| if half > 0.0 { (v - mid) / half } else { 0.0 })
}

/// Options for the scheduler-driven tracker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerOptions {
    /// Frequency assumed at the seed and on axes without a demodulated neighbour.
    pub default_freq: [f64; 2],
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            default_freq: [0.7, 0.7],
        }
    }
}

/// Tracker strategy plugged into the bucket scheduler.
///
/// Each pixel continues from a demodulated neighbour: the left/right one when
/// available, else up/down, else a diagonal one. Along the reference axis the
/// step is chosen by the potential against that neighbour's frequency; a
/// diagonal reference extrapolates with both components. Frequencies along
/// axes that have a demodulated neighbour are re-measured from the accepted
/// phase, the rest are carried over from the reference neighbour.
#[derive(Clone, Debug)]
pub struct TrackerDemodulator {
    options: TrackerOptions,
    cosine: Field<f64>,
}

impl TrackerDemodulator {
    pub fn new(options: TrackerOptions, intensity: &Field<f64>) -> Self {
        Self {
            options,
            cosine: normalize_fringes(intensity),
        }
    }

    /// Normalized cosine samples the tracker works on.
    pub fn cosine(&self) -> &Field<f64> {
        &self.cosine
    }

    fn default_frequency(&self) -> Frequency {
        Frequency::new(self.options.default_freq[0], self.options.default_freq[1])
    }
}

/// Axis neighbours in preference order: `(dx, dy, direction of the step
/// from neighbour to pixel)`.
const AXIS_REFS: [(isize, isize, Direction); 4] = [
    (-1, 0, Direction::Forward),
    (1, 0, Direction::Backward),
    (0, -1, Direction::Forward),
    (0, 1, Direction::Backward),
];

impl Demodulator for TrackerDemodulator {
    fn name(&self) -> &'static str {
        "tracker"
    }

    fn demodulate(
        &mut self,
        fields: &DemodFields,
        pixel: ScanPoint,
        is_seed: bool,
    ) -> Result<PixelEstimate, DemodError> {
        let g = self.cosine.get(pixel.x, pixel.y);
        let (px, py) = (pixel.x as isize, pixel.y as isize);
        let demodulated = |dx: isize, dy: isize| -> Option<(usize, usize)> {
            let (x, y) = (px + dx, py + dy);
            match fields.demodulated.get_signed(x, y) {
                Some(true) => Some((x as usize, y as usize)),
                _ => None,
            }
        };

        let reference = if is_seed {
            None
        } else {
            AXIS_REFS
                .iter()
                .find_map(|&(dx, dy, dir)| demodulated(dx, dy).map(|n| (n, dx, dy, Some(dir))))
                .or_else(|| {
                    [(-1, -1), (1, -1), (-1, 1), (1, 1)]
                        .iter()
                        .find_map(|&(dx, dy)| demodulated(dx, dy).map(|n| (n, dx, dy, None)))
                })
        };

        let Some(((nx, ny), dx, dy, dir)) = reference else {
            let phase = safe_acos(g);
            return Ok(PixelEstimate {
                phase,
                freq: self.default_frequency(),
                response: Complex::from_polar(1.0, phase),
            });
        };

        let phase_n = fields.phase.get(nx, ny);
        let freq_n = fields.frequency(nx, ny);
        let phase = match dir {
            Some(dir) => {
                let prev = if dx != 0 { freq_n.x } else { freq_n.y };
                let step = pick_step(candidate_frequencies(g, phase_n, dir), prev);
                phase_n + dir.sign() * step
            }
            None => {
                let predicted = phase_n - freq_n.x * dx as f64 - freq_n.y * dy as f64;
                let a = safe_acos(g);
                let d0 = wrap_phase(a - predicted);
                let d1 = wrap_phase(-a - predicted);
                predicted + if d1.abs() < d0.abs() { d1 } else { d0 }
            }
        };

        let mut freq = freq_n;
        if let Some((lx, ly)) = demodulated(-1, 0) {
            freq.x = wrap_phase(phase - fields.phase.get(lx, ly));
        } else if let Some((rx, ry)) = demodulated(1, 0) {
            freq.x = wrap_phase(fields.phase.get(rx, ry) - phase);
        }
        if let Some((ux, uy)) = demodulated(0, -1) {
            freq.y = wrap_phase(phase - fields.phase.get(ux, uy));
        } else if let Some((bx, by)) = demodulated(0, 1) {
            freq.y = wrap_phase(fields.phase.get(bx, by) - phase);
        }

        Ok(PixelEstimate {
            phase,
            freq,
            response: Complex::from_polar(1.0, phase),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageView;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn safe_acos_clamps_to_boundary_angles() {
        assert_eq!(safe_acos(1.0), 0.0);
        assert_eq!(safe_acos(1.7), 0.0);
        assert_eq!(safe_acos(-1.0), PI);
        assert_eq!(safe_acos(-42.0), PI);
        assert!((safe_acos(0.0) - FRAC_PI_2).abs() < 1e-15);
    }

    #[test]
    fn potential_of_a_linear_ramp_is_zero() {
        assert_eq!(potential([0.1, 0.4, 0.7]), 0.0);
        assert!((potential([0.0, 1.0, 0.0]) - 4.0).abs() < 1e-15);
    }

    #[test]
    fn seed_neighbourhood_satisfies_the_acos_relation() {
        let g = [0.0, 1.0, 0.0];
        let p = seed_neighbourhood(g, FRAC_PI_2);
        assert_eq!(p[1], FRAC_PI_2);
        for k in [0, 2] {
            assert!((0.0..=PI).contains(&p[k]), "phase {} outside [0, π]", p[k]);
            assert!((p[k] - safe_acos(g[k])).abs() < 1e-12);
            assert!((p[k].cos() - g[k]).abs() < 1e-12);
        }
        assert!(potential(p) < 1e-24);
    }

    #[test]
    fn candidates_reach_both_cosine_branches() {
        let p = 0.4;
        let g = 0.3f64;
        for dir in [Direction::Forward, Direction::Backward] {
            let c = candidate_frequencies(g, p, dir);
            for w in c {
                assert!(w > -PI && w <= PI);
                let next = p + dir.sign() * w;
                assert!((next.cos() - g).abs() < 1e-12);
            }
            assert!((c[0] - c[1]).abs() > 1e-6);
        }
    }

    #[test]
    fn wrap_phase_stays_in_half_open_interval() {
        for a in [-7.0, -PI, -3.0, 0.0, 3.0, PI, 7.0, 100.0] {
            let w = wrap_phase(a);
            assert!(w > -PI && w <= PI, "{a} wrapped to {w}");
            let turns = (w - a) / (2.0 * PI);
            assert!((turns - turns.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn scanline_tracks_a_linear_phase() {
        let w = 0.45;
        let n = 40;
        let truth: Vec<f64> = (0..n).map(|x| 0.3 + w * x as f64).collect();
        let g: Vec<f64> = truth.iter().map(|p| p.cos()).collect();
        let seed = 10;
        let mut phase = vec![0.0; n];
        phase[seed - 1] = truth[seed - 1];
        phase[seed] = truth[seed];
        phase[seed + 1] = truth[seed + 1];
        demodulate_scanline(&mut phase, &g, seed, 0, n - 1);
        for x in 0..n {
            assert!(
                (phase[x] - truth[x]).abs() < 1e-6,
                "x={x}: {} vs {}",
                phase[x],
                truth[x]
            );
        }
    }

    #[test]
    fn scanline_respects_the_sub_range() {
        let g: Vec<f64> = (0..20).map(|x| (0.5 * x as f64).cos()).collect();
        let mut phase = vec![-9.0; 20];
        phase[7] = 3.0;
        phase[8] = 3.5;
        phase[9] = 4.0;
        demodulate_scanline(&mut phase, &g, 8, 5, 12);
        assert_eq!(phase[4], -9.0);
        assert_eq!(phase[13], -9.0);
        assert!(phase[5..=12].iter().all(|&p| p != -9.0));
    }

    #[test]
    fn row_and_column_wrappers_match_the_scanline() {
        let g = Field::from_fn(16, 12, |x, y| (0.4 * x as f64 + 0.25 * y as f64).cos());
        let mut by_row = Field::new(16, 12);
        demodulate_row(&mut by_row, &g, 3, 8, 1.0, 0, 15);
        let row = by_row.row(3).to_vec();
        let mut line = vec![0.0; 16];
        track_line(&mut line, &g.data[3 * 16..4 * 16], 8, 1.0, 0, 15);
        assert_eq!(row, line);
        assert!(by_row.row(2).iter().all(|&p| p == 0.0));

        let mut by_col = Field::new(16, 12);
        let seed_phase = safe_acos(g.get(5, 6));
        demodulate_column(&mut by_col, &g, 5, 6, seed_phase, 0, 11);
        for y in 0..12 {
            assert!((by_col.get(5, y).cos() - g.get(5, y)).abs() < 1e-9);
        }
    }

    #[test]
    fn seed_on_the_range_bound_stays_inside_the_range() {
        let g = Field::from_fn(12, 1, |x, _| (0.5 * x as f64).cos());
        let mut phase = Field::filled(12, 1, -9.0);
        demodulate_row(&mut phase, &g, 0, 5, 1.0, 5, 8);
        let row = phase.row(0);
        assert_eq!(row[4], -9.0);
        assert_eq!(row[9], -9.0);
        assert_eq!(row[5], 1.0);
        assert!(row[6..=8].iter().all(|&p| p != -9.0));

        let gc = Field::from_fn(1, 12, |_, y| (0.5 * y as f64).cos());
        let mut col = Field::filled(1, 12, -9.0);
        demodulate_column(&mut col, &gc, 0, 8, 1.0, 5, 8);
        assert_eq!(col.get(0, 9), -9.0);
        assert_eq!(col.get(0, 4), -9.0);
        assert_eq!(col.get(0, 8), 1.0);
        assert!((5..8).all(|y| col.get(0, y) != -9.0));
    }

    #[test]
    fn seed_outside_the_range_leaves_the_line_untouched() {
        let g = Field::from_fn(12, 1, |x, _| (0.5 * x as f64).cos());
        let mut phase = Field::filled(12, 1, -9.0);
        demodulate_row(&mut phase, &g, 0, 10, 1.0, 2, 6);
        assert!(phase.data.iter().all(|&p| p == -9.0));
        demodulate_row(&mut phase, &g, 0, 1, 1.0, 2, 6);
        assert!(phase.data.iter().all(|&p| p == -9.0));
    }

    #[test]
    fn regularized_variant_is_unavailable() {
        let mut p = Field::new(4, 4);
        let g = Field::new(4, 4);
        assert_eq!(
            regularized_tracker(&mut p, &g, 1.0, 3, ScanPoint::new(0, 0)),
            Err(DemodError::Unavailable("regularized phase tracker"))
        );
    }

    #[test]
    fn normalization_maps_range_to_unit_interval() {
        let img = Field::from_vec(3, 1, vec![10.0, 20.0, 30.0]).unwrap();
        assert_eq!(normalize_fringes(&img).row(0), &[-1.0, 0.0, 1.0]);
        assert!(normalize_fringes(&Field::filled(2, 2, 5.0))
            .data
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn tracker_step_continues_from_the_left_neighbour() {
        let w = 0.5;
        let img = Field::from_fn(5, 1, |x, _| (0.2 + w * x as f64).cos());
        let mut fields = DemodFields::new(img);
        let mut tracker = TrackerDemodulator::new(TrackerOptions::default(), &fields.intensity);
        let g = tracker.cosine().clone();
        fields.accept(
            ScanPoint::new(1, 0),
            &PixelEstimate {
                phase: safe_acos(g.get(1, 0)),
                freq: Frequency::new(w, 0.0),
                response: Complex::new(1.0, 0.0),
            },
        );
        let est = tracker
            .demodulate(&fields, ScanPoint::new(2, 0), false)
            .unwrap();
        assert!((est.phase.cos() - g.get(2, 0)).abs() < 1e-12);
        assert!(est.freq.x > 0.0, "expected forward step, got {:?}", est.freq);
    }
}
