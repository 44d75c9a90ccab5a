//! Error type for operations that can fail on caller input.
//!
//! Numeric corner cases (zero response magnitude, out-of-range arc-cosine
//! arguments, constant images) are resolved by documented conventions in the
//! stages themselves and never surface here.
use crate::image::ElementType;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DemodError {
    /// Kernel generation was asked for a non-floating element type.
    #[error("element type `{0}` is not supported for kernel generation")]
    UnsupportedType(ElementType),
    #[error("input image has no pixels")]
    EmptyImage,
    #[error("buffer of {found} elements does not match a {width}x{height} field")]
    DimensionMismatch {
        width: usize,
        height: usize,
        found: usize,
    },
    #[error("seed ({x}, {y}) lies outside the {width}x{height} image")]
    SeedOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("quality map requires at least one level")]
    InvalidLevels,
    #[error("{0} is not available")]
    Unavailable(&'static str),
}
