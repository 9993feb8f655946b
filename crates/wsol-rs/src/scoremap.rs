//! Score-map handling: validation, `.npy` loading, normalization, and
//! per-threshold bounding-box extraction.
//!
//! Box extraction follows the WSOL protocol: binarize the map at each
//! threshold in the sweep, trace the connected bright regions, and box the
//! largest one.

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, Contour};
use imageproc::point::Point;
use ndarray_npy::read_npy;

use crate::error::EvalError;
use crate::types::{BoundingBox, ScoreMap};

/// Check that a score map is evaluable.
///
/// The map must be non-empty, contain no NaN, stay within [0, 1], and
/// attain both 0.0 and 1.0 exactly.
pub fn check_scoremap_validity(scoremap: &ScoreMap) -> Result<(), EvalError> {
    if scoremap.is_empty() {
        return Err(EvalError::InvalidScoreMap("score map is empty".to_string()));
    }
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in scoremap.iter() {
        if v.is_nan() {
            return Err(EvalError::InvalidScoreMap(
                "score map contains NaN".to_string(),
            ));
        }
        min = min.min(v);
        max = max.max(v);
    }
    if min < 0.0 || max > 1.0 {
        return Err(EvalError::InvalidScoreMap(format!(
            "score map values must lie in [0, 1], got range [{}, {}]",
            min, max
        )));
    }
    if min != 0.0 || max != 1.0 {
        return Err(EvalError::InvalidScoreMap(format!(
            "score map must attain both 0.0 and 1.0, got range [{}, {}]",
            min, max
        )));
    }
    Ok(())
}

/// Min-max normalize a raw score map into [0, 1].
///
/// Maps containing NaN, and constant maps, normalize to all zeros.
pub fn normalize_scoremap(scoremap: &ScoreMap) -> ScoreMap {
    if scoremap.iter().any(|v| v.is_nan()) {
        return ScoreMap::zeros(scoremap.raw_dim());
    }
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in scoremap.iter() {
        min = min.min(v);
        max = max.max(v);
    }
    if min == max {
        return ScoreMap::zeros(scoremap.raw_dim());
    }
    scoremap.mapv(|v| (v - min) / (max - min))
}

/// Path of the score map file for an image id.
pub fn scoremap_path(scoremap_root: &Path, image_id: &str) -> PathBuf {
    scoremap_root.join(format!("{}.npy", image_id))
}

/// Load one score map from `{scoremap_root}/{image_id}.npy`.
pub fn load_scoremap(scoremap_root: &Path, image_id: &str) -> Result<ScoreMap, EvalError> {
    let path = scoremap_path(scoremap_root, image_id);
    read_npy(&path).map_err(|source| EvalError::ScoreMapRead { path, source })
}

/// Extract one candidate box per threshold from a score map.
///
/// The map is validated first (`InvalidScoreMap` on failure), then
/// quantized to u8 by truncation. For each threshold t, pixels strictly
/// greater than `floor(t * 255)` are bright; the largest connected bright
/// region (by traced polygon area, first maximal on ties) is boxed with
/// its lower-right corner clamped to the map extent. A threshold with no
/// bright pixel yields the degenerate box (0, 0, 0, 0).
pub fn extract_boxes(
    scoremap: &ScoreMap,
    threshold_list: &[f64],
) -> Result<Vec<BoundingBox>, EvalError> {
    check_scoremap_validity(scoremap)?;
    let quantized = quantize_scoremap(scoremap);
    let boxes = threshold_list
        .iter()
        .map(|&t| largest_region_box(&quantized, t))
        .collect();
    Ok(boxes)
}

fn quantize_scoremap(scoremap: &ScoreMap) -> GrayImage {
    let (height, width) = scoremap.dim();
    let mut image = GrayImage::new(width as u32, height as u32);
    for ((y, x), &v) in scoremap.indexed_iter() {
        image.put_pixel(x as u32, y as u32, Luma([(v * 255.0) as u8]));
    }
    image
}

fn largest_region_box(quantized: &GrayImage, threshold: f64) -> BoundingBox {
    let (width, height) = quantized.dimensions();
    let cutoff = (threshold * 255.0) as u8;
    let mut binary = GrayImage::new(width, height);
    for (x, y, p) in quantized.enumerate_pixels() {
        if p.0[0] > cutoff {
            binary.put_pixel(x, y, Luma([255u8]));
        }
    }

    let contours = find_contours::<u32>(&binary);
    let best = match largest_contour(&contours) {
        Some(contour) => contour,
        None => return BoundingBox::new(0, 0, 0, 0),
    };

    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    for p in &best.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    BoundingBox::new(
        min_x as i32,
        min_y as i32,
        (max_x + 1).min(width - 1) as i32,
        (max_y + 1).min(height - 1) as i32,
    )
}

fn largest_contour(contours: &[Contour<u32>]) -> Option<&Contour<u32>> {
    let mut best: Option<&Contour<u32>> = None;
    let mut best_area = i64::MIN;
    for contour in contours {
        let area = twice_polygon_area(&contour.points);
        if best.is_none() || area > best_area {
            best = Some(contour);
            best_area = area;
        }
    }
    best
}

/// Twice the shoelace area of the traced border polygon. Degenerate
/// (point or line) contours score 0.
fn twice_polygon_area(points: &[Point<u32>]) -> i64 {
    if points.len() < 3 {
        return 0;
    }
    let mut acc = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        acc += i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y);
    }
    acc.abs()
}
