//! Error types for localization evaluation.

use std::path::PathBuf;

use thiserror::Error;

use crate::params::DatasetName;
use crate::types::BoundingBox;

/// Errors produced while evaluating localization performance.
///
/// Every variant is fatal to the evaluation run; there is no per-image
/// recovery.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A score map failed validation (NaN, out of range, or missing the
    /// 0.0 / 1.0 extremes).
    #[error("invalid score map: {0}")]
    InvalidScoreMap(String),

    /// A box without two increasing corner pairs reached an operation that
    /// requires the (x0, y0, x1, y1) convention.
    #[error("box does not follow the (x0, y0, x1, y1) convention: {0:?}")]
    InvalidBoxConvention(BoundingBox),

    /// The ignore region of a ground-truth mask overlaps its foreground.
    #[error("ignore region overlaps foreground for image {image_id}")]
    MaskInvariantViolation { image_id: String },

    /// Mask evaluation was requested for a dataset annotated with boxes.
    #[error("mask evaluation is not supported for dataset {0}")]
    UnsupportedDataset(DatasetName),

    /// `compute` was called before any image was accumulated.
    #[error("compute called before any image was accumulated")]
    NoImagesAccumulated,

    /// No positive ground truth in the eval set.
    #[error("no positive ground truth in the eval set")]
    NoPositiveGroundTruth,

    /// No positive prediction in the eval set.
    #[error("no positive prediction in the eval set")]
    NoPositivePrediction,

    /// The dataset name is not one of CUB, ILSVRC, OpenImages.
    #[error("unknown dataset name: {0}")]
    UnknownDataset(String),

    /// The threshold sweep interval lies outside (0, 1].
    #[error("threshold sweep interval must lie in (0, 1], got {0}")]
    InvalidThresholdInterval(f64),

    /// An image id from the id list is missing from another metadata
    /// table.
    #[error("image {image_id} missing from {table}")]
    MissingAnnotation {
        image_id: String,
        table: &'static str,
    },

    /// A metadata file could not be read or parsed.
    #[error("failed to read metadata {path:?}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// A score map file could not be read or decoded.
    #[error("failed to read score map {path:?}: {source}")]
    ScoreMapRead {
        path: PathBuf,
        source: ndarray_npy::ReadNpyError,
    },

    /// A mask image could not be read or decoded.
    #[error("failed to read mask image {path:?}: {source}")]
    MaskRead {
        path: PathBuf,
        source: image::ImageError,
    },

    /// A score map and its ground-truth mask disagree in shape.
    #[error(
        "score map shape {scoremap:?} does not match mask shape {mask:?} for image {image_id}"
    )]
    MaskShapeMismatch {
        image_id: String,
        scoremap: (usize, usize),
        mask: (usize, usize),
    },
}
