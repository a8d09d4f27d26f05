//! Output layout and dataset file writing.
//!
//! Per-scene ground truth goes to one JSON file per image; at the end of
//! a run the per-split aggregates (scene list plus a dataset header) and
//! the change-count summary are written as single documents.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SceneGenError;
use crate::types::{ChangeCounts, GenerationParams};

/// Filesystem locations for a generation run.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub image_dir: PathBuf,
    pub scene_dir: PathBuf,
    /// Aggregate scene file for the primary split.
    pub scene_file: PathBuf,
    /// Aggregate paired before/after file (action mode only).
    pub combined_scene_file: PathBuf,
    /// Run-wide change-count tallies (action mode only).
    pub count_file: PathBuf,
}

impl OutputLayout {
    /// Conventional layout under a single output root.
    pub fn under_root(root: &Path) -> Self {
        OutputLayout {
            image_dir: root.join("images"),
            scene_dir: root.join("scenes"),
            scene_file: root.join("scenes.json"),
            combined_scene_file: root.join("change_scenes.json"),
            count_file: root.join("change_counts.json"),
        }
    }

    pub fn create_dirs(&self) -> Result<(), SceneGenError> {
        fs::create_dir_all(&self.image_dir).map_err(|e| SceneGenError::io(&self.image_dir, e))?;
        fs::create_dir_all(&self.scene_dir).map_err(|e| SceneGenError::io(&self.scene_dir, e))?;
        for file in [&self.scene_file, &self.combined_scene_file, &self.count_file] {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent).map_err(|e| SceneGenError::io(parent, e))?;
            }
        }
        Ok(())
    }

    pub fn image_path(&self, params: &GenerationParams, split: &str, index: usize) -> PathBuf {
        self.image_dir.join(format!(
            "{}.{}",
            stem(&params.filename_prefix, split, index),
            params.image_ext
        ))
    }

    pub fn scene_path(&self, params: &GenerationParams, split: &str, index: usize) -> PathBuf {
        self.scene_dir
            .join(format!("{}.json", stem(&params.filename_prefix, split, index)))
    }
}

/// Shared filename stem: `{prefix}_{split}_{index:06}`.
pub fn stem(prefix: &str, split: &str, index: usize) -> String {
    format!("{prefix}_{split}_{index:06}")
}

/// Dataset-level header carried by every aggregate scene file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub date: String,
    pub version: String,
    pub split: String,
    pub license: String,
}

impl DatasetInfo {
    pub fn new(params: &GenerationParams, split: &str) -> Self {
        DatasetInfo {
            date: params.date_or_today(),
            version: params.version.clone(),
            split: split.to_string(),
            license: params.license.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetFile<T> {
    pub info: DatasetInfo,
    pub scenes: Vec<T>,
}

/// Serialize `value` as indented JSON at `path`.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), SceneGenError> {
    let file = fs::File::create(path).map_err(|e| SceneGenError::io(path, e))?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

pub fn write_counts(path: &Path, counts: &ChangeCounts) -> Result<(), SceneGenError> {
    write_json_pretty(path, counts)
}

/// Sanity check that an image and its scene record were produced by the
/// same run: their modification times must lie within `max_delta`.
/// Intended for post-run dataset audits, not the generation path.
pub fn verify_pair_freshness(
    image: &Path,
    scene: &Path,
    max_delta: std::time::Duration,
) -> Result<(), SceneGenError> {
    let mtime = |path: &Path| -> Result<std::time::SystemTime, SceneGenError> {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| SceneGenError::io(path, e))
    };
    let (image_time, scene_time) = (mtime(image)?, mtime(scene)?);
    let delta = image_time
        .duration_since(scene_time)
        .unwrap_or_else(|e| e.duration());
    if delta > max_delta {
        return Err(SceneGenError::Configuration(format!(
            "{} and {} were written {}s apart (limit {}s); the pair looks stale",
            image.display(),
            scene.display(),
            delta.as_secs(),
            max_delta.as_secs()
        )));
    }
    Ok(())
}
