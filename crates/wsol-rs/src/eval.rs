//! Localization evaluation engine: MaxBoxAcc for box-annotated datasets
//! and PxAP for mask-annotated datasets.
//!
//! Both evaluators follow the same protocol: `accumulate` once per image,
//! in any order, then `compute` once for the final metric. Counters and
//! histograms are additive, so the result is independent of accumulation
//! order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::bbox::{pairwise_iou, resize_box};
use crate::error::EvalError;
use crate::mask::merge_gt_mask;
use crate::metadata::{self, Metadata};
use crate::params::{DatasetName, EvalParams, EvaluationMode};
use crate::scoremap::{check_scoremap_validity, extract_boxes, load_scoremap};
use crate::types::{BoundingBox, ImageSize, ScoreMap};

/// Score maps are loaded from disk in parallel batches of this many
/// images.
const LOADER_BATCH_SIZE: usize = 128;

/// Protocol shared by the two evaluator implementations.
///
/// `accumulate` is called once per image; `compute` is called once
/// afterwards and does not mutate state. Every error is fatal to the run,
/// and a failed `accumulate` leaves the evaluator unchanged.
pub trait Evaluator {
    /// Fold one image's score map into the running statistics.
    fn accumulate(&mut self, scoremap: &ScoreMap, image_id: &str) -> Result<(), EvalError>;

    /// Final metric over everything accumulated, scaled to [0, 100].
    fn compute(&self) -> Result<f64, EvalError>;
}

/// MaxBoxAcc evaluator for box-annotated datasets (CUB, ILSVRC).
///
/// Ground-truth boxes are rescaled to the evaluation resolution once at
/// construction. Per threshold, an image counts as correct when the
/// candidate box extracted at that threshold reaches the IoU criterion
/// against any of its ground-truth boxes; the metric is the best
/// per-threshold accuracy.
#[derive(Debug)]
pub struct BoxEvaluator {
    params: EvalParams,
    /// image_id -> ground-truth boxes at evaluation resolution
    gt_boxes: HashMap<String, Vec<BoundingBox>>,
    /// correct count per threshold
    num_correct: Vec<u64>,
    /// images accumulated so far
    cnt: u64,
}

impl BoxEvaluator {
    /// Build the evaluator, rescaling every ground-truth box from its
    /// original image size to the evaluation resolution.
    pub fn new(
        params: EvalParams,
        boxes: HashMap<String, Vec<BoundingBox>>,
        image_sizes: &HashMap<String, ImageSize>,
    ) -> Result<Self, EvalError> {
        let eval_size = ImageSize::new(params.resize_length, params.resize_length);
        let mut gt_boxes = HashMap::with_capacity(boxes.len());
        for (image_id, original) in boxes {
            let size = image_sizes.get(&image_id).copied().ok_or_else(|| {
                EvalError::MissingAnnotation {
                    image_id: image_id.clone(),
                    table: "image_sizes",
                }
            })?;
            let resized = original
                .into_iter()
                .map(|b| resize_box(b, size, eval_size))
                .collect::<Result<Vec<_>, _>>()?;
            gt_boxes.insert(image_id, resized);
        }
        let num_correct = vec![0; params.threshold_list.len()];
        Ok(BoxEvaluator {
            params,
            gt_boxes,
            num_correct,
            cnt: 0,
        })
    }
}

impl Evaluator for BoxEvaluator {
    fn accumulate(&mut self, scoremap: &ScoreMap, image_id: &str) -> Result<(), EvalError> {
        let gt = self
            .gt_boxes
            .get(image_id)
            .ok_or_else(|| EvalError::MissingAnnotation {
                image_id: image_id.to_string(),
                table: "localization",
            })?;
        let candidates = extract_boxes(scoremap, &self.params.threshold_list)?;
        let ious = pairwise_iou(&candidates, gt);
        for (idx, row) in ious.iter().enumerate() {
            let best = row.iter().fold(0.0f64, |acc, &iou| acc.max(iou));
            if best >= self.params.iou_threshold {
                self.num_correct[idx] += 1;
            }
        }
        self.cnt += 1;
        Ok(())
    }

    fn compute(&self) -> Result<f64, EvalError> {
        if self.cnt == 0 {
            return Err(EvalError::NoImagesAccumulated);
        }
        let best = self
            .num_correct
            .iter()
            .map(|&correct| correct as f64 * 100.0 / self.cnt as f64)
            .fold(0.0f64, f64::max);
        Ok(best)
    }
}

/// PxAP evaluator for mask-annotated datasets (OpenImages).
///
/// Accumulates foreground and background score histograms over the
/// threshold bins, then integrates precision over recall increments.
#[derive(Debug)]
pub struct MaskEvaluator {
    params: EvalParams,
    mask_root: PathBuf,
    /// image_id -> instance mask paths, relative to the mask root
    mask_paths: HashMap<String, Vec<PathBuf>>,
    /// image_id -> ignore mask path, relative to the mask root
    ignore_paths: HashMap<String, PathBuf>,
    /// histogram bin edges: threshold_list ++ [1.0, 2.0, 3.0]
    bin_edges: Vec<f64>,
    gt_true_hist: Vec<f64>,
    gt_false_hist: Vec<f64>,
    cnt: u64,
}

impl MaskEvaluator {
    /// Build the evaluator. Only mask-annotated datasets are accepted.
    pub fn new(
        params: EvalParams,
        mask_root: &Path,
        mask_paths: HashMap<String, Vec<PathBuf>>,
        ignore_paths: HashMap<String, PathBuf>,
    ) -> Result<Self, EvalError> {
        if params.dataset.evaluation_mode() != EvaluationMode::Masks {
            return Err(EvalError::UnsupportedDataset(params.dataset));
        }
        let mut bin_edges = params.threshold_list.clone();
        bin_edges.extend([1.0, 2.0, 3.0]);
        let num_bins = bin_edges.len() - 1;
        Ok(MaskEvaluator {
            params,
            mask_root: mask_root.to_path_buf(),
            mask_paths,
            ignore_paths,
            bin_edges,
            gt_true_hist: vec![0.0; num_bins],
            gt_false_hist: vec![0.0; num_bins],
            cnt: 0,
        })
    }
}

impl Evaluator for MaskEvaluator {
    fn accumulate(&mut self, scoremap: &ScoreMap, image_id: &str) -> Result<(), EvalError> {
        check_scoremap_validity(scoremap)?;
        let mask_paths =
            self.mask_paths
                .get(image_id)
                .ok_or_else(|| EvalError::MissingAnnotation {
                    image_id: image_id.to_string(),
                    table: "localization",
                })?;
        let ignore_path =
            self.ignore_paths
                .get(image_id)
                .ok_or_else(|| EvalError::MissingAnnotation {
                    image_id: image_id.to_string(),
                    table: "localization",
                })?;
        let gt_mask = merge_gt_mask(
            &self.mask_root,
            image_id,
            mask_paths,
            ignore_path,
            self.params.resize_length,
        )?;
        if scoremap.dim() != gt_mask.dim() {
            return Err(EvalError::MaskShapeMismatch {
                image_id: image_id.to_string(),
                scoremap: scoremap.dim(),
                mask: gt_mask.dim(),
            });
        }

        histogram(
            scoremap
                .iter()
                .zip(gt_mask.iter())
                .filter(|&(_, &label)| label == 1)
                .map(|(&score, _)| f64::from(score)),
            &self.bin_edges,
            &mut self.gt_true_hist,
        );
        histogram(
            scoremap
                .iter()
                .zip(gt_mask.iter())
                .filter(|&(_, &label)| label == 0)
                .map(|(&score, _)| f64::from(score)),
            &self.bin_edges,
            &mut self.gt_false_hist,
        );
        self.cnt += 1;
        Ok(())
    }

    fn compute(&self) -> Result<f64, EvalError> {
        if self.cnt == 0 {
            return Err(EvalError::NoImagesAccumulated);
        }
        pr_auc(&self.gt_true_hist, &self.gt_false_hist)
    }
}

/// Histogram counts of `values` over ascending `edges`.
///
/// Bins are left-closed right-open except the last, which also includes
/// its right edge; values outside the edge span are dropped.
fn histogram(values: impl Iterator<Item = f64>, edges: &[f64], counts: &mut [f64]) {
    for v in values {
        let upper = edges.partition_point(|&e| e <= v);
        if upper == 0 {
            continue;
        }
        let bin = if upper == edges.len() {
            if v == edges[edges.len() - 1] {
                counts.len() - 1
            } else {
                continue;
            }
        } else {
            upper - 1
        };
        counts[bin] += 1.0;
    }
}

/// Approximate area under the precision-recall curve from foreground and
/// background score histograms, scaled to [0, 100].
///
/// True and false positive counts at descending score cutoffs are the
/// reversed cumulative sums of the histograms; precision integrates over
/// recall increments, skipping cutoffs with no predictions.
fn pr_auc(gt_true_hist: &[f64], gt_false_hist: &[f64]) -> Result<f64, EvalError> {
    let num_bins = gt_true_hist.len();
    let num_gt_true: f64 = gt_true_hist.iter().sum();

    let mut tp = vec![0.0; num_bins];
    let mut fp = vec![0.0; num_bins];
    let mut tp_run = 0.0;
    let mut fp_run = 0.0;
    for i in 0..num_bins {
        tp_run += gt_true_hist[num_bins - 1 - i];
        fp_run += gt_false_hist[num_bins - 1 - i];
        tp[i] = tp_run;
        fp[i] = fp_run;
    }

    // tp + fn is constant at the foreground total
    if num_gt_true <= 0.0 {
        return Err(EvalError::NoPositiveGroundTruth);
    }
    if tp.iter().zip(&fp).all(|(t, f)| t + f <= 0.0) {
        return Err(EvalError::NoPositivePrediction);
    }

    let mut auc = 0.0;
    let mut prev_recall = tp[0] / num_gt_true;
    for k in 1..num_bins {
        let recall = tp[k] / num_gt_true;
        if tp[k] + fp[k] != 0.0 {
            let precision = tp[k] / (tp[k] + fp[k]);
            auc += precision * (recall - prev_recall);
        }
        prev_recall = recall;
    }
    Ok(auc * 100.0)
}

/// Construct the evaluator implementation for the dataset's annotation
/// kind, loading the annotations it needs from `metadata`.
pub fn build_evaluator(
    params: EvalParams,
    metadata: &Metadata,
    mask_root: &Path,
) -> Result<Box<dyn Evaluator>, EvalError> {
    match params.dataset.evaluation_mode() {
        EvaluationMode::Boxes => {
            let boxes = metadata::get_bounding_boxes(metadata)?;
            let image_sizes = metadata::get_image_sizes(metadata)?;
            Ok(Box::new(BoxEvaluator::new(params, boxes, &image_sizes)?))
        }
        EvaluationMode::Masks => {
            let (mask_paths, ignore_paths) = metadata::get_mask_paths(metadata)?;
            Ok(Box::new(MaskEvaluator::new(
                params,
                mask_root,
                mask_paths,
                ignore_paths,
            )?))
        }
    }
}

/// Evaluate localization performance for one dataset split.
///
/// Reads the image id list and annotations under `metadata_root`, loads
/// one score map per image from `{scoremap_root}/{image_id}.npy` (in
/// parallel batches), and returns the dataset's localization metric
/// scaled to [0, 100]: MaxBoxAcc for CUB and ILSVRC, PxAP for OpenImages.
/// `mask_root` is only consulted for mask-annotated datasets.
pub fn evaluate_localization(
    scoremap_root: &Path,
    metadata_root: &Path,
    mask_root: &Path,
    dataset_name: DatasetName,
    split: &str,
    threshold_sweep_interval: f64,
) -> Result<f64, EvalError> {
    let metadata = metadata::configure_metadata(metadata_root);
    let image_ids = metadata::get_image_ids(&metadata)?;
    let params = EvalParams::new(dataset_name, split, threshold_sweep_interval)?;
    info!(
        "evaluating {} images from {} {} over {} thresholds",
        image_ids.len(),
        dataset_name,
        split,
        params.threshold_list.len()
    );

    let mut evaluator = build_evaluator(params, &metadata, mask_root)?;
    let mut processed = 0usize;
    for batch in image_ids.chunks(LOADER_BATCH_SIZE) {
        let scoremaps: Vec<(String, ScoreMap)> = batch
            .par_iter()
            .map(|image_id| {
                load_scoremap(scoremap_root, image_id).map(|m| (image_id.clone(), m))
            })
            .collect::<Result<_, _>>()?;
        for (image_id, scoremap) in &scoremaps {
            evaluator.accumulate(scoremap, image_id)?;
        }
        processed += batch.len();
        debug!("accumulated {} / {} images", processed, image_ids.len());
    }

    let performance = evaluator.compute()?;
    info!(
        "localization performance on {} {}: {}",
        dataset_name, split, performance
    );
    Ok(performance)
}
