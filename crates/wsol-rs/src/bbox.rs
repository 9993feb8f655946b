//! Box geometry: corner-convention checks, rescaling, and pairwise IoU.
//!
//! Boxes use the inclusive-corner convention throughout: (x0, y0, x1, y1)
//! covers `x1 - x0 + 1` by `y1 - y0 + 1` pixels.

use crate::error::EvalError;
use crate::types::{BoundingBox, ImageSize};

/// Check that every box has two increasing corner pairs.
pub fn check_box_convention(boxes: &[BoundingBox]) -> Result<(), EvalError> {
    for b in boxes {
        if !b.is_ordered() {
            return Err(EvalError::InvalidBoxConvention(*b));
        }
    }
    Ok(())
}

/// Rescale a box from one image size to another.
///
/// Each coordinate is multiplied by the new extent and then divided by
/// the old, truncated toward zero. Both factors are exact in f64;
/// a precomputed `new / old` ratio truncates integer-valued results one
/// pixel low at ratios like 80 -> 224. Fails with
/// `InvalidBoxConvention` if the input corners are not two increasing
/// pairs.
pub fn resize_box(
    bbox: BoundingBox,
    from: ImageSize,
    to: ImageSize,
) -> Result<BoundingBox, EvalError> {
    check_box_convention(std::slice::from_ref(&bbox))?;
    let rescale = |coord: i32, new: u32, old: u32| {
        (f64::from(coord) * f64::from(new) / f64::from(old)) as i32
    };
    Ok(BoundingBox::new(
        rescale(bbox.x0, to.width, from.width),
        rescale(bbox.y0, to.height, from.height),
        rescale(bbox.x1, to.width, from.width),
        rescale(bbox.y1, to.height, from.height),
    ))
}

/// Pairwise IoU between two box lists.
///
/// Returns a `boxes_a.len() x boxes_b.len()` matrix. Intersection and box
/// areas follow the inclusive-corner convention (+1 per dimension). A pair
/// whose union is not positive (possible only for degenerate, zero-area
/// spans) scores 0 rather than dividing by zero; corners are not
/// order-checked here.
pub fn pairwise_iou(boxes_a: &[BoundingBox], boxes_b: &[BoundingBox]) -> Vec<Vec<f64>> {
    let mut ious = vec![vec![0.0; boxes_b.len()]; boxes_a.len()];
    for (i, a) in boxes_a.iter().enumerate() {
        let area_a = inclusive_area(a);
        for (j, b) in boxes_b.iter().enumerate() {
            let lo_x = i64::from(a.x0.max(b.x0));
            let lo_y = i64::from(a.y0.max(b.y0));
            let hi_x = i64::from(a.x1.min(b.x1));
            let hi_y = i64::from(a.y1.min(b.y1));
            let intersect = (hi_x - lo_x + 1).max(0) * (hi_y - lo_y + 1).max(0);
            let union = area_a + inclusive_area(b) - intersect;
            ious[i][j] = if union > 0 {
                intersect as f64 / union as f64
            } else {
                0.0
            };
        }
    }
    ious
}

fn inclusive_area(b: &BoundingBox) -> i64 {
    (i64::from(b.x1) - i64::from(b.x0) + 1) * (i64::from(b.y1) - i64::from(b.y0) + 1)
}
