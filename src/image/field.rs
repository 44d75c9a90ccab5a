//! Owned dense 2D buffer in row-major layout (stride == width).
//!
//! Every per-pixel quantity of a run lives in a `Field`: the intensity image,
//! the quantized quality map, the visited masks, the complex response and the
//! phase/frequency estimates. The size is fixed at construction.
use super::traits::{ImageView, ImageViewMut, RowsMut};
use crate::error::DemodError;

#[derive(Clone, Debug, PartialEq)]
pub struct Field<T> {
    /// Width in pixels (number of columns)
    pub w: usize,
    /// Height in pixels (number of rows)
    pub h: usize,
    /// Number of elements between consecutive rows (equals `w`)
    pub stride: usize,
    /// Backing storage in row-major order
    pub data: Vec<T>,
}

impl<T: Copy + Default> Field<T> {
    /// Construct a default-initialized field of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self::filled(w, h, T::default())
    }
}

impl<T: Copy> Field<T> {
    /// Construct a field with every element set to `value`.
    pub fn filled(w: usize, h: usize, value: T) -> Self {
        Self {
            w,
            h,
            stride: w,
            data: vec![value; w * h],
        }
    }

    /// Wrap an existing row-major buffer. The length must equal `w * h`.
    pub fn from_vec(w: usize, h: usize, data: Vec<T>) -> Result<Self, DemodError> {
        if data.len() != w * h {
            return Err(DemodError::DimensionMismatch {
                width: w,
                height: h,
                found: data.len(),
            });
        }
        Ok(Self {
            w,
            h,
            stride: w,
            data,
        })
    }

    /// Build a field by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(w: usize, h: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                data.push(f(x, y));
            }
        }
        Self {
            w,
            h,
            stride: w,
            data,
        }
    }

    #[inline]
    /// Convert (x, y) to a linear index into `data`.
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.stride + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: T) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    /// Returns the element at a signed offset position, `None` outside the field.
    #[inline]
    pub fn get_signed(&self, x: isize, y: isize) -> Option<T> {
        if self.contains(x, y) {
            Some(self.get(x as usize, y as usize))
        } else {
            None
        }
    }

    #[inline]
    pub fn contains(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.w * self.h
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    #[inline]
    pub fn same_size<U>(&self, other: &Field<U>) -> bool {
        self.w == other.w && self.h == other.h
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    pub fn map<U: Copy>(&self, mut f: impl FnMut(T) -> U) -> Field<U> {
        Field {
            w: self.w,
            h: self.h,
            stride: self.w,
            data: self.rows().flatten().map(|&v| f(v)).collect(),
        }
    }

    /// Copy of column `x`, top to bottom.
    pub fn column(&self, x: usize) -> Vec<T> {
        (0..self.h).map(|y| self.get(x, y)).collect()
    }

    pub fn set_column(&mut self, x: usize, values: &[T]) {
        for (y, &v) in values.iter().enumerate().take(self.h) {
            self.set(x, y, v);
        }
    }

    pub fn rows_mut(&mut self) -> RowsMut<'_, T> {
        RowsMut::new(&mut self.data, self.stride, self.w)
    }
}

impl Field<f64> {
    /// Smallest and largest finite value, `None` for an empty field.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Element-wise difference `self - other`. Both fields must share a size.
    pub fn sub(&self, other: &Field<f64>) -> Result<Field<f64>, DemodError> {
        if !self.same_size(other) {
            return Err(DemodError::DimensionMismatch {
                width: self.w,
                height: self.h,
                found: other.len(),
            });
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a - b)
            .collect();
        Ok(Field {
            w: self.w,
            h: self.h,
            stride: self.w,
            data,
        })
    }
}

impl<T: Copy> ImageView for Field<T> {
    type Pixel = T;

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn row(&self, y: usize) -> &[T] {
        let start = y * self.stride;
        &self.data[start..start + self.w]
    }
}

impl<T: Copy> ImageViewMut for Field<T> {
    #[inline]
    fn row_mut(&mut self, y: usize) -> &mut [T] {
        let start = y * self.stride;
        let end = start + self.w;
        &mut self.data[start..end]
    }
}
