//! I/O helpers for interferograms, output fields and JSON.
//!
//! - `load_interferogram`: read a PNG/JPEG/etc. into a `Field<f64>` in `[0, 1]`.
//! - `save_field_png`: min/max-normalize a field and write it as 8-bit gray.
//! - `save_mask_png`: write a boolean mask as black/white.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::{Field, ImageView};
use image::{GrayImage, Luma};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load an image from disk, convert to grayscale and scale into `[0, 1]`.
pub fn load_interferogram(path: &Path) -> Result<Field<f64>, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?
        .into_luma16();
    let width = img.width() as usize;
    let height = img.height() as usize;
    let data = img
        .into_raw()
        .into_iter()
        .map(|v| v as f64 / u16::MAX as f64)
        .collect();
    Field::from_vec(width, height, data).map_err(|e| e.to_string())
}

/// Save a float field as a grayscale PNG, stretching its finite range to [0, 255].
///
/// A constant field is written as mid-gray.
pub fn save_field_png(field: &Field<f64>, path: &Path) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let (lo, hi) = field.min_max().unwrap_or((0.0, 0.0));
    let span = hi - lo;
    let mut out = GrayImage::new(field.w as u32, field.h as u32);
    for (y, row) in field.rows().enumerate() {
        for (x, &px) in row.iter().enumerate() {
            let v = if span > 0.0 && px.is_finite() {
                ((px - lo) / span * 255.0).clamp(0.0, 255.0)
            } else {
                127.0
            };
            out.put_pixel(x as u32, y as u32, Luma([v.round() as u8]));
        }
    }
    out.save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Save a boolean mask to a PNG (true → 255).
pub fn save_mask_png(mask: &Field<bool>, path: &Path) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let mut out = GrayImage::new(mask.w as u32, mask.h as u32);
    for (y, row) in mask.rows().enumerate() {
        for (x, &set) in row.iter().enumerate() {
            out.put_pixel(x as u32, y as u32, Luma([if set { 255 } else { 0 }]));
        }
    }
    out.save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}
