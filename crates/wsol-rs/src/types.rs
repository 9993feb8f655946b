use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A real-valued localization score map, shape (height, width).
///
/// Evaluable maps hold values in [0, 1] and attain both 0.0 and 1.0; see
/// `scoremap::check_scoremap_validity`.
pub type ScoreMap = Array2<f32>;

/// Merged ground-truth labels for mask evaluation, shape (height, width):
/// 1 = foreground, 0 = background, 255 = ignore.
pub type LabelMask = Array2<u8>;

/// An axis-aligned box with inclusive corners.
///
/// Pixel (x1, y1) belongs to the box, so it spans `x1 - x0 + 1` pixels
/// horizontally and `y1 - y0 + 1` vertically. Corners are not validated on
/// construction; operations that require two increasing corner pairs check
/// explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BoundingBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BoundingBox {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        BoundingBox { x0, y0, x1, y1 }
    }

    /// Whether the corners form two increasing pairs (x0 <= x1, y0 <= y1).
    pub fn is_ordered(&self) -> bool {
        self.x0 <= self.x1 && self.y0 <= self.y1
    }
}

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        ImageSize { width, height }
    }
}
