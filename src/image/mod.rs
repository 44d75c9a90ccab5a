//! Dense 2D fields and the row-access traits shared by every stage.
//!
//! A demodulation run keeps all of its per-pixel state in [`Field`] buffers of
//! identical size: intensity, quality levels, the scheduler's visited mask,
//! the complex response, phase and the two frequency components.
pub mod field;
pub mod io;
pub mod traits;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use self::field::Field;
pub use self::traits::{ImageView, ImageViewMut, Rows, RowsMut};

/// Numeric element type of sampled data.
///
/// Kernel generation only accepts the floating types; integer types are
/// reported as [`crate::DemodError::UnsupportedType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    U8,
    U16,
    F32,
    F64,
}

impl ElementType {
    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }
}

impl Default for ElementType {
    fn default() -> Self {
        ElementType::F64
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
        };
        f.write_str(name)
    }
}
