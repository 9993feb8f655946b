use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use ndarray::Array2;
use ndarray_npy::write_npy;
use tempfile::TempDir;

use wsol_rs::{evaluate_localization, DatasetName, EvalError};

fn write_lines(path: &Path, lines: &[&str]) {
    fs::write(path, lines.join("\n")).expect("Failed to write metadata");
}

fn write_scoremap(scoremap_root: &Path, image_id: &str, scoremap: &Array2<f32>) {
    let path = scoremap_root.join(format!("{image_id}.npy"));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create scoremap dir");
    }
    write_npy(&path, scoremap).expect("Failed to write scoremap");
}

fn write_mask(path: &Path, side: u32, fill: impl Fn(u32, u32) -> bool) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create mask dir");
    }
    let mut image = GrayImage::new(side, side);
    for y in 0..side {
        for x in 0..side {
            if fill(x, y) {
                image.put_pixel(x, y, Luma([255u8]));
            }
        }
    }
    image.save(path).expect("Failed to write mask");
}

fn block_map(side: usize, top: usize, left: usize, len: usize) -> Array2<f32> {
    let mut scoremap = Array2::<f32>::zeros((side, side));
    for y in top..top + len {
        for x in left..left + len {
            scoremap[[y, x]] = 1.0;
        }
    }
    scoremap
}

/// Lay out a benchmark directory tree under `root` and return the three
/// roots evaluation reads from.
fn benchmark_dirs(root: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let scoremap_root = root.join("scoremaps");
    let metadata_root = root.join("metadata");
    let mask_root = root.join("dataset");
    fs::create_dir_all(&scoremap_root).expect("Failed to create scoremap root");
    fs::create_dir_all(&metadata_root).expect("Failed to create metadata root");
    fs::create_dir_all(&mask_root).expect("Failed to create mask root");
    (scoremap_root, metadata_root, mask_root)
}

#[test]
fn test_box_dataset_end_to_end() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (scoremap_root, metadata_root, mask_root) = benchmark_dirs(dir.path());

    // two 448x448 images, ground truth covering the top-left quadrant;
    // one score map lands on it, the other activates far away
    write_lines(
        &metadata_root.join("image_ids.txt"),
        &["123/456", "plain"],
    );
    write_lines(
        &metadata_root.join("image_sizes.txt"),
        &["123/456,448,448", "plain,448,448"],
    );
    write_lines(
        &metadata_root.join("localization.txt"),
        &["123/456,0,0,223,223", "plain,0.0,0.0,223.9,223.4"],
    );
    write_scoremap(&scoremap_root, "123/456", &block_map(224, 0, 0, 112));
    write_scoremap(&scoremap_root, "plain", &block_map(224, 150, 150, 50));

    let metric = evaluate_localization(
        &scoremap_root,
        &metadata_root,
        &mask_root,
        DatasetName::Cub,
        "test",
        0.25,
    )
    .expect("Evaluation should succeed");
    // one hit and one miss at every threshold
    assert!((metric - 50.0).abs() < 1e-10);
}

#[test]
fn test_mask_dataset_end_to_end() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (scoremap_root, metadata_root, mask_root) = benchmark_dirs(dir.path());

    write_lines(&metadata_root.join("image_ids.txt"), &["img"]);
    write_lines(
        &metadata_root.join("localization.txt"),
        &["img,masks/instance.png,masks/ignore.png"],
    );
    write_mask(&mask_root.join("masks/instance.png"), 224, |x, y| {
        x < 50 && y < 50
    });
    write_mask(&mask_root.join("masks/ignore.png"), 224, |x, y| {
        y == 223 && x >= 222
    });

    // foreground scores 0.9, background 0.1; the score extremes sit in
    // the ignored corner so they never enter the histograms
    let mut scoremap = Array2::<f32>::from_elem((224, 224), 0.1);
    for y in 0..50 {
        for x in 0..50 {
            scoremap[[y, x]] = 0.9;
        }
    }
    scoremap[[223, 223]] = 1.0;
    scoremap[[223, 222]] = 0.0;
    write_scoremap(&scoremap_root, "img", &scoremap);

    let metric = evaluate_localization(
        &scoremap_root,
        &metadata_root,
        &mask_root,
        DatasetName::OpenImages,
        "test",
        0.2,
    )
    .expect("Evaluation should succeed");
    // every cutoff between 0.1 and 0.9 separates perfectly
    assert!((metric - 100.0).abs() < 1e-10);
}

#[test]
fn test_mask_overlapping_ignore_region_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (scoremap_root, metadata_root, mask_root) = benchmark_dirs(dir.path());

    write_lines(&metadata_root.join("image_ids.txt"), &["img"]);
    write_lines(
        &metadata_root.join("localization.txt"),
        &["img,masks/instance.png,masks/ignore.png"],
    );
    write_mask(&mask_root.join("masks/instance.png"), 224, |x, y| {
        x < 50 && y < 50
    });
    write_mask(&mask_root.join("masks/ignore.png"), 224, |x, y| {
        x == 10 && y == 10
    });
    write_scoremap(&scoremap_root, "img", &block_map(224, 0, 0, 50));

    let err = evaluate_localization(
        &scoremap_root,
        &metadata_root,
        &mask_root,
        DatasetName::OpenImages,
        "test",
        0.2,
    )
    .expect_err("Overlapping ignore region should fail");
    assert!(matches!(err, EvalError::MaskInvariantViolation { .. }));
}

#[test]
fn test_missing_scoremap_file_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (scoremap_root, metadata_root, mask_root) = benchmark_dirs(dir.path());

    write_lines(&metadata_root.join("image_ids.txt"), &["img"]);
    write_lines(&metadata_root.join("image_sizes.txt"), &["img,224,224"]);
    write_lines(&metadata_root.join("localization.txt"), &["img,0,0,100,100"]);

    let err = evaluate_localization(
        &scoremap_root,
        &metadata_root,
        &mask_root,
        DatasetName::Cub,
        "test",
        0.25,
    )
    .expect_err("Missing score map should fail");
    assert!(matches!(err, EvalError::ScoreMapRead { .. }));
}

#[test]
fn test_invalid_scoremap_values_fail() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (scoremap_root, metadata_root, mask_root) = benchmark_dirs(dir.path());

    write_lines(&metadata_root.join("image_ids.txt"), &["img"]);
    write_lines(&metadata_root.join("image_sizes.txt"), &["img,224,224"]);
    write_lines(&metadata_root.join("localization.txt"), &["img,0,0,100,100"]);
    let mut scoremap = block_map(224, 0, 0, 112);
    scoremap[[200, 200]] = f32::NAN;
    write_scoremap(&scoremap_root, "img", &scoremap);

    let err = evaluate_localization(
        &scoremap_root,
        &metadata_root,
        &mask_root,
        DatasetName::Ilsvrc,
        "test",
        0.25,
    )
    .expect_err("NaN score map should fail");
    assert!(matches!(err, EvalError::InvalidScoreMap(_)));
}

#[test]
fn test_invalid_threshold_interval_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let (scoremap_root, metadata_root, mask_root) = benchmark_dirs(dir.path());
    write_lines(&metadata_root.join("image_ids.txt"), &["img"]);

    let err = evaluate_localization(
        &scoremap_root,
        &metadata_root,
        &mask_root,
        DatasetName::Cub,
        "test",
        0.0,
    )
    .expect_err("Zero interval should fail");
    assert!(matches!(err, EvalError::InvalidThresholdInterval(_)));
}
