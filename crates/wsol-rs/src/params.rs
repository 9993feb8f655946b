//! Evaluation parameters: dataset dispatch, threshold sweeps, and the
//! protocol constants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// Default IoU criterion for counting a candidate box as correct.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.5;

/// Default side length boxes and masks are rescaled to for evaluation.
pub const DEFAULT_RESIZE_LENGTH: u32 = 224;

/// The benchmark dataset being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum DatasetName {
    /// CUB-200-2011 (box annotations).
    Cub,
    /// ImageNet-1k localization (box annotations).
    Ilsvrc,
    /// OpenImages V5 (instance mask annotations).
    OpenImages,
}

impl DatasetName {
    /// The kind of ground truth this dataset carries, which selects the
    /// evaluator implementation.
    pub fn evaluation_mode(self) -> EvaluationMode {
        match self {
            DatasetName::Cub | DatasetName::Ilsvrc => EvaluationMode::Boxes,
            DatasetName::OpenImages => EvaluationMode::Masks,
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetName::Cub => "CUB",
            DatasetName::Ilsvrc => "ILSVRC",
            DatasetName::OpenImages => "OpenImages",
        };
        f.write_str(name)
    }
}

impl FromStr for DatasetName {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUB" => Ok(DatasetName::Cub),
            "ILSVRC" => Ok(DatasetName::Ilsvrc),
            "OpenImages" => Ok(DatasetName::OpenImages),
            other => Err(EvalError::UnknownDataset(other.to_string())),
        }
    }
}

/// Whether ground truth is boxes or pixel masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum EvaluationMode {
    Boxes,
    Masks,
}

/// Binarization threshold sweep `0, interval, 2 * interval, ...` strictly
/// below 1.
///
/// The interval must lie in (0, 1]; an interval of 0.001 yields 1000
/// thresholds.
pub fn threshold_sweep(interval: f64) -> Result<Vec<f64>, EvalError> {
    if !(interval > 0.0 && interval <= 1.0) {
        return Err(EvalError::InvalidThresholdInterval(interval));
    }
    let thresholds = (0u64..)
        .map(|k| k as f64 * interval)
        .take_while(|&t| t < 1.0)
        .collect();
    Ok(thresholds)
}

/// Parameters shared by both evaluator implementations.
///
/// Defaults match the WSOL evaluation protocol: IoU criterion 0.5 and a
/// 224x224 evaluation resolution. The constructor never alters them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvalParams {
    /// Dataset being evaluated.
    pub dataset: DatasetName,
    /// Split label, used for reporting (e.g. "val", "test").
    pub split: String,
    /// Ascending binarization thresholds in [0, 1).
    pub threshold_list: Vec<f64>,
    /// Minimum IoU for a candidate box to count as correct.
    pub iou_threshold: f64,
    /// Side length boxes and masks are rescaled to.
    pub resize_length: u32,
}

impl EvalParams {
    /// Create parameters with the default constants and a threshold sweep
    /// of the given interval.
    pub fn new(
        dataset: DatasetName,
        split: &str,
        sweep_interval: f64,
    ) -> Result<Self, EvalError> {
        Ok(EvalParams {
            dataset,
            split: split.to_string(),
            threshold_list: threshold_sweep(sweep_interval)?,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            resize_length: DEFAULT_RESIZE_LENGTH,
        })
    }
}
