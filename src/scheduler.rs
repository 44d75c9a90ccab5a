//! Best-first pixel traversal over quantized quality levels.
//!
//! The scheduler keeps one FIFO queue per quality level. [`BucketScheduler::next`]
//! pops the front of the highest non-empty level, so reliable regions are
//! exhausted before the traversal descends into less reliable ones, and pixels
//! of equal level spread breadth-first.
//!
//! Ownership
//! - Scan points live in an arena (`points`) owned by the scheduler; queues
//!   hold arena indices only.
//! - The visited mask is written exclusively here. A pixel is marked at the
//!   moment it is queued, never later, so a pixel discovered by several
//!   neighbours is queued exactly once and every queued pixel is popped
//!   exactly once.
//!
//! Automatic seeding scans the quality levels row-major and keeps the first
//! pixel whose level strictly exceeds everything seen before it. Equal maxima
//! therefore resolve to the earliest pixel in scan order.
use crate::error::DemodError;
use crate::image::{Field, ImageView};
use crate::quality::QualityMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 8-connected neighbour offsets, in enqueue order.
const NEIGH_OFFSETS: [(isize, isize); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

/// Pixel coordinate: `x` is the column, `y` the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanPoint {
    pub x: usize,
    pub y: usize,
}

impl ScanPoint {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// In-bounds 8-connected neighbours in enqueue order.
    pub fn neighbours(self, w: usize, h: usize) -> impl Iterator<Item = ScanPoint> {
        NEIGH_OFFSETS.into_iter().filter_map(move |(dx, dy)| {
            let xn = self.x as isize + dx;
            let yn = self.y as isize + dy;
            if xn < 0 || yn < 0 || xn >= w as isize || yn >= h as isize {
                None
            } else {
                Some(ScanPoint::new(xn as usize, yn as usize))
            }
        })
    }
}

/// Row-major first strict improvement over the quantized levels.
///
/// Returns `None` for an empty map.
pub fn select_seed(levels: &Field<usize>) -> Option<ScanPoint> {
    if levels.is_empty() {
        return None;
    }
    let mut best = ScanPoint::new(0, 0);
    let mut best_level = levels.get(0, 0);
    for (y, row) in levels.rows().enumerate() {
        for (x, &level) in row.iter().enumerate() {
            if level > best_level {
                best_level = level;
                best = ScanPoint::new(x, y);
            }
        }
    }
    Some(best)
}

pub struct BucketScheduler {
    quality: QualityMap,
    visited: Field<bool>,
    points: Vec<ScanPoint>,
    queues: Vec<VecDeque<usize>>,
    pops: usize,
}

impl BucketScheduler {
    /// Create an empty scheduler over `quality`. Nothing is queued until a
    /// seed is initialized.
    pub fn new(quality: QualityMap) -> Self {
        let visited = Field::filled(quality.width(), quality.height(), false);
        let queues = vec![VecDeque::new(); quality.level_count.max(1)];
        Self {
            quality,
            visited,
            points: Vec::new(),
            queues,
            pops: 0,
        }
    }

    /// Mark and queue the seed pixel.
    ///
    /// With `start == None` the seed is chosen by [`select_seed`]. An explicit
    /// start must lie inside the image.
    pub fn initialize_seed(&mut self, start: Option<ScanPoint>) -> Result<ScanPoint, DemodError> {
        let (w, h) = (self.visited.w, self.visited.h);
        let seed = match start {
            Some(p) => {
                if p.x >= w || p.y >= h {
                    return Err(DemodError::SeedOutOfBounds {
                        x: p.x,
                        y: p.y,
                        width: w,
                        height: h,
                    });
                }
                p
            }
            None => select_seed(&self.quality.levels).ok_or(DemodError::EmptyImage)?,
        };
        self.push(seed);
        Ok(seed)
    }

    /// Queue every in-bounds, not yet visited 8-neighbour of `point` into its
    /// own level. Returns how many were queued.
    pub fn enqueue_neighbors(&mut self, point: ScanPoint) -> usize {
        let (w, h) = (self.visited.w, self.visited.h);
        let mut queued = 0;
        for n in point.neighbours(w, h) {
            if !self.visited.get(n.x, n.y) {
                self.push(n);
                queued += 1;
            }
        }
        queued
    }

    /// Pop the front of the highest non-empty level.
    ///
    /// `None` means the traversal is exhausted.
    pub fn next(&mut self) -> Option<ScanPoint> {
        let id = self
            .queues
            .iter_mut()
            .rev()
            .find_map(|queue| queue.pop_front())?;
        self.pops += 1;
        Some(self.points[id])
    }

    fn push(&mut self, p: ScanPoint) {
        let level = self.quality.level(p.x, p.y).min(self.queues.len() - 1);
        self.visited.set(p.x, p.y, true);
        let id = self.points.len();
        self.points.push(p);
        self.queues[level].push_back(id);
    }

    /// Drop all queued points and clear the visited mask.
    pub fn clear(&mut self) {
        self.visited.fill(false);
        self.points.clear();
        self.queues.iter_mut().for_each(VecDeque::clear);
        self.pops = 0;
    }

    #[inline]
    pub fn is_visited(&self, x: usize, y: usize) -> bool {
        self.visited.get(x, y)
    }

    pub fn visited(&self) -> &Field<bool> {
        &self.visited
    }

    pub fn quality(&self) -> &QualityMap {
        &self.quality
    }

    /// Number of points ever queued (one per discovered pixel).
    pub fn enqueued(&self) -> usize {
        self.points.len()
    }

    pub fn pops(&self) -> usize {
        self.pops
    }

    /// Points queued but not yet popped.
    pub fn pending(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }
}
