//! Ground-truth mask loading and merging for pixel-wise evaluation.
//!
//! OpenImages ground truth is stored as gray instance-mask images plus one
//! ignore-region image per evaluated image. Masks are resized to the
//! evaluation resolution with nearest-neighbor so label values stay exact,
//! then merged into a single label array.

use std::path::{Path, PathBuf};

use image::GrayImage;
use ndarray::Array2;

use crate::error::EvalError;
use crate::types::LabelMask;

/// Label value marking ignored pixels in a merged mask.
pub const IGNORE_LABEL: u8 = 255;

/// Load a mask image as gray at the given square resolution.
///
/// Any nonzero pixel counts as asserted once binarized downstream.
pub fn load_mask_image(path: &Path, resize_length: u32) -> Result<GrayImage, EvalError> {
    let image = image::open(path)
        .map_err(|source| EvalError::MaskRead {
            path: path.to_path_buf(),
            source,
        })?
        .to_luma8();
    Ok(resize_nearest(&image, resize_length, resize_length))
}

/// Nearest-neighbor resize mapping destination pixel d to source pixel
/// floor(d * src_extent / dst_extent) per axis, clamped to the source
/// (OpenCV's INTER_NEAREST sampling). The center-offset convention
/// `floor((d + 0.5) * scale)` picks different source pixels on any
/// non-identity resize.
fn resize_nearest(image: &GrayImage, new_width: u32, new_height: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut resized = GrayImage::new(new_width, new_height);
    for y in 0..new_height {
        let src_y =
            ((u64::from(y) * u64::from(height) / u64::from(new_height)) as u32).min(height - 1);
        for x in 0..new_width {
            let src_x =
                ((u64::from(x) * u64::from(width) / u64::from(new_width)) as u32).min(width - 1);
            resized.put_pixel(x, y, *image.get_pixel(src_x, src_y));
        }
    }
    resized
}

/// Merge instance masks and an ignore mask into one label array.
///
/// Foreground is the union of nonzero pixels across the instance masks;
/// ignored pixels take `IGNORE_LABEL`. Fails with `MaskInvariantViolation`
/// if the ignore region overlaps the foreground.
pub fn merge_gt_mask(
    mask_root: &Path,
    image_id: &str,
    mask_paths: &[PathBuf],
    ignore_path: &Path,
    resize_length: u32,
) -> Result<LabelMask, EvalError> {
    let side = resize_length as usize;
    let mut foreground = Array2::<bool>::from_elem((side, side), false);
    for relative in mask_paths {
        let mask = load_mask_image(&mask_root.join(relative), resize_length)?;
        for (x, y, p) in mask.enumerate_pixels() {
            if p.0[0] > 0 {
                foreground[[y as usize, x as usize]] = true;
            }
        }
    }

    let ignore = load_mask_image(&mask_root.join(ignore_path), resize_length)?;
    let mut labels = LabelMask::zeros((side, side));
    for (x, y, p) in ignore.enumerate_pixels() {
        if p.0[0] > 0 {
            if foreground[[y as usize, x as usize]] {
                return Err(EvalError::MaskInvariantViolation {
                    image_id: image_id.to_string(),
                });
            }
            labels[[y as usize, x as usize]] = IGNORE_LABEL;
        }
    }
    for ((y, x), &fg) in foreground.indexed_iter() {
        if fg {
            labels[[y, x]] = 1;
        }
    }
    Ok(labels)
}
