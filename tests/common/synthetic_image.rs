use fringe_demod::image::Field;

/// Pure cosine fringes `cos(wx·x + wy·y + phase0)` without background.
pub fn linear_fringes(width: usize, height: usize, wx: f64, wy: f64, phase0: f64) -> Field<f64> {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    Field::from_fn(width, height, |x, y| {
        (wx * x as f64 + wy * y as f64 + phase0).cos()
    })
}

/// Camera-like fringes `bias + contrast·cos(...)` in `[0, 1]`.
pub fn biased_fringes(width: usize, height: usize, wx: f64, wy: f64) -> Field<f64> {
    linear_fringes(width, height, wx, wy, 0.0).map(|v| 0.5 + 0.4 * v)
}

/// Closed circular fringes `cos(k·r²)` around the image centre.
pub fn circular_fringes(width: usize, height: usize, k: f64) -> Field<f64> {
    let cx = (width as f64 - 1.0) * 0.5;
    let cy = (height as f64 - 1.0) * 0.5;
    Field::from_fn(width, height, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        (k * (dx * dx + dy * dy)).cos()
    })
}

/// Black image with one bright pixel.
pub fn single_bright_pixel(width: usize, height: usize, px: usize, py: usize) -> Field<f64> {
    let mut img = Field::new(width, height);
    img.set(px, py, 1.0);
    img
}

/// Wrap into `(-π, π]`.
pub fn wrap(a: f64) -> f64 {
    use std::f64::consts::PI;
    let w = (a + PI).rem_euclid(2.0 * PI) - PI;
    if w <= -PI {
        w + 2.0 * PI
    } else {
        w
    }
}

pub fn median(mut values: Vec<f64>) -> f64 {
    assert!(!values.is_empty(), "median of an empty set");
    values.sort_by(|a, b| a.total_cmp(b));
    values[values.len() / 2]
}
