//! Neighbour frequency lookup used to tune the filter before demodulating a
//! pixel.
use super::{DemodFields, Frequency};
use crate::scheduler::ScanPoint;
use serde::{Deserialize, Serialize};

/// How the expected frequency of a pixel is derived from its demodulated
/// neighbours.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FrequencyPrediction {
    /// Demodulated 8-neighbour with the largest radial frequency `|ω|`.
    /// Ties keep the first neighbour in scan order.
    Peak,
    /// Mean frequency over demodulated pixels in a `(2r+1)²` window.
    Combined { radius: usize },
}

impl Default for FrequencyPrediction {
    fn default() -> Self {
        FrequencyPrediction::Peak
    }
}

impl FrequencyPrediction {
    /// Expected frequency at `p`, `None` when no neighbour is demodulated.
    pub fn predict(&self, fields: &DemodFields, p: ScanPoint) -> Option<Frequency> {
        match *self {
            FrequencyPrediction::Peak => peak_frequency(fields, p),
            FrequencyPrediction::Combined { radius } => mean_frequency(fields, p, radius.max(1)),
        }
    }

    /// Like [`Self::predict`], falling back to `default`.
    pub fn predict_or(&self, fields: &DemodFields, p: ScanPoint, default: Frequency) -> Frequency {
        self.predict(fields, p).unwrap_or(default)
    }
}

fn peak_frequency(fields: &DemodFields, p: ScanPoint) -> Option<Frequency> {
    let mut best: Option<Frequency> = None;
    for n in p.neighbours(fields.width(), fields.height()) {
        if !fields.is_demodulated(n.x, n.y) {
            continue;
        }
        let f = fields.frequency(n.x, n.y);
        match best {
            Some(b) if f.norm() <= b.norm() => {}
            _ => best = Some(f),
        }
    }
    best
}

fn mean_frequency(fields: &DemodFields, p: ScanPoint, radius: usize) -> Option<Frequency> {
    let x0 = p.x.saturating_sub(radius);
    let y0 = p.y.saturating_sub(radius);
    let x1 = (p.x + radius).min(fields.width() - 1);
    let y1 = (p.y + radius).min(fields.height() - 1);
    let mut sum = Frequency::zeros();
    let mut count = 0usize;
    for y in y0..=y1 {
        for x in x0..=x1 {
            if fields.is_demodulated(x, y) {
                sum += fields.frequency(x, y);
                count += 1;
            }
        }
    }
    (count > 0).then(|| sum / count as f64)
}
