//! Row-oriented read/write access to 2D buffers.
//!
//! Stages iterate rows rather than individual pixels wherever the access
//! pattern allows it; the traits keep that code independent of the element
//! type stored in the field.
pub trait ImageView {
    type Pixel: Copy;

    fn width(&self) -> usize;
    fn height(&self) -> usize;

    fn row(&self, y: usize) -> &[Self::Pixel];

    fn rows(&self) -> Rows<'_, Self>
    where
        Self: Sized,
    {
        Rows { image: self, y: 0 }
    }
}

pub trait ImageViewMut: ImageView {
    fn row_mut(&mut self, y: usize) -> &mut [Self::Pixel];
}

pub struct Rows<'a, I: ?Sized + ImageView> {
    image: &'a I,
    y: usize,
}

impl<'a, I: ImageView> Iterator for Rows<'a, I> {
    type Item = &'a [I::Pixel];

    fn next(&mut self) -> Option<Self::Item> {
        if self.y >= self.image.height() {
            return None;
        }
        let y = self.y;
        self.y += 1;
        Some(self.image.row(y))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.image.height().saturating_sub(self.y);
        (left, Some(left))
    }
}

/// Mutable row iterator over a contiguous buffer.
///
/// Built from `chunks_mut`, so rows never alias.
pub struct RowsMut<'a, P> {
    chunks: std::slice::ChunksMut<'a, P>,
    width: usize,
}

impl<'a, P> RowsMut<'a, P> {
    pub(crate) fn new(data: &'a mut [P], stride: usize, width: usize) -> Self {
        Self {
            chunks: data.chunks_mut(stride.max(1)),
            width,
        }
    }
}

impl<'a, P> Iterator for RowsMut<'a, P> {
    type Item = &'a mut [P];

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        let w = self.width.min(chunk.len());
        Some(&mut chunk[..w])
    }
}
