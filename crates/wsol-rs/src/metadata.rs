//! Metadata loading: image id lists, image sizes, box annotations, and
//! mask paths.
//!
//! Metadata for one dataset split lives as plain text files under a single
//! root: `image_ids.txt` (one id per line), `image_sizes.txt`
//! (`image_id,width,height`), and `localization.txt`
//! (`image_id,x0,y0,x1,y1` for box datasets, `image_id,mask_path,ignore_path`
//! for mask datasets). Repeated localization lines per id accumulate.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::EvalError;
use crate::types::{BoundingBox, ImageSize};

/// Locations of the metadata files under one metadata root.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub image_ids: PathBuf,
    pub image_sizes: PathBuf,
    pub localization: PathBuf,
}

/// Resolve the standard metadata file locations under `root`.
pub fn configure_metadata(root: &Path) -> Metadata {
    Metadata {
        image_ids: root.join("image_ids.txt"),
        image_sizes: root.join("image_sizes.txt"),
        localization: root.join("localization.txt"),
    }
}

/// Read the evaluation image ids, one per line. Blank lines are skipped.
pub fn get_image_ids(metadata: &Metadata) -> Result<Vec<String>, EvalError> {
    let file = open(&metadata.image_ids)?;
    let mut ids = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| metadata_error(&metadata.image_ids, e.to_string()))?;
        let id = line.trim();
        if !id.is_empty() {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

/// Read original image sizes, `image_id,width,height` per line.
pub fn get_image_sizes(metadata: &Metadata) -> Result<HashMap<String, ImageSize>, EvalError> {
    let path = &metadata.image_sizes;
    let mut sizes = HashMap::new();
    for record in records(path)? {
        let record = record.map_err(|e| metadata_error(path, e.to_string()))?;
        if record.len() != 3 {
            return Err(metadata_error(
                path,
                format!("expected image_id,width,height, got {} fields", record.len()),
            ));
        }
        let width = parse_dimension(&record[1], path)?;
        let height = parse_dimension(&record[2], path)?;
        sizes.insert(record[0].to_string(), ImageSize::new(width, height));
    }
    Ok(sizes)
}

/// Read ground-truth boxes, `image_id,x0,y0,x1,y1` per line.
///
/// Repeated ids accumulate multiple boxes. Coordinates are parsed as
/// floats and truncated toward zero.
pub fn get_bounding_boxes(
    metadata: &Metadata,
) -> Result<HashMap<String, Vec<BoundingBox>>, EvalError> {
    let path = &metadata.localization;
    let mut boxes: HashMap<String, Vec<BoundingBox>> = HashMap::new();
    for record in records(path)? {
        let record = record.map_err(|e| metadata_error(path, e.to_string()))?;
        if record.len() != 5 {
            return Err(metadata_error(
                path,
                format!(
                    "expected image_id,x0,y0,x1,y1, got {} fields",
                    record.len()
                ),
            ));
        }
        let mut coords = [0i32; 4];
        for (i, coord) in coords.iter_mut().enumerate() {
            let raw = &record[i + 1];
            let value: f64 = raw
                .trim()
                .parse()
                .map_err(|_| metadata_error(path, format!("invalid coordinate {:?}", raw)))?;
            *coord = value as i32;
        }
        boxes
            .entry(record[0].to_string())
            .or_default()
            .push(BoundingBox::new(coords[0], coords[1], coords[2], coords[3]));
    }
    Ok(boxes)
}

/// Read mask annotation paths, `image_id,mask_path,ignore_path` per line.
///
/// Repeated ids accumulate instance masks; every line for an id must name
/// the same ignore path. Returns (instance mask paths, ignore path) maps,
/// paths relative to the mask root.
#[allow(clippy::type_complexity)]
pub fn get_mask_paths(
    metadata: &Metadata,
) -> Result<(HashMap<String, Vec<PathBuf>>, HashMap<String, PathBuf>), EvalError> {
    let path = &metadata.localization;
    let mut mask_paths: HashMap<String, Vec<PathBuf>> = HashMap::new();
    let mut ignore_paths: HashMap<String, PathBuf> = HashMap::new();
    for record in records(path)? {
        let record = record.map_err(|e| metadata_error(path, e.to_string()))?;
        if record.len() != 3 {
            return Err(metadata_error(
                path,
                format!(
                    "expected image_id,mask_path,ignore_path, got {} fields",
                    record.len()
                ),
            ));
        }
        let image_id = record[0].to_string();
        mask_paths
            .entry(image_id.clone())
            .or_default()
            .push(PathBuf::from(&record[1]));
        let ignore = PathBuf::from(&record[2]);
        match ignore_paths.get(&image_id) {
            Some(existing) if *existing != ignore => {
                return Err(metadata_error(
                    path,
                    format!("conflicting ignore paths for image {}", image_id),
                ));
            }
            Some(_) => {}
            None => {
                ignore_paths.insert(image_id, ignore);
            }
        }
    }
    Ok((mask_paths, ignore_paths))
}

fn open(path: &Path) -> Result<File, EvalError> {
    File::open(path).map_err(|e| metadata_error(path, e.to_string()))
}

fn records(path: &Path) -> Result<csv::StringRecordsIntoIter<File>, EvalError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(open(path)?);
    Ok(reader.into_records())
}

fn parse_dimension(raw: &str, path: &Path) -> Result<u32, EvalError> {
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| metadata_error(path, format!("invalid dimension {:?}", raw)))?;
    if value == 0 {
        return Err(metadata_error(
            path,
            "image dimensions must be positive".to_string(),
        ));
    }
    Ok(value)
}

fn metadata_error(path: &Path, message: String) -> EvalError {
    EvalError::Metadata {
        path: path.to_path_buf(),
        message,
    }
}
