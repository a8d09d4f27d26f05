//! Data types matching the scene-dataset JSON schema.
//!
//! Every emitted struct derives Serialize + Deserialize so it can
//! round-trip through the dataset interchange format. Field names and
//! ordering follow the schema consumed by the downstream question
//! generator (`3d_coords`, `pixel_coords`, `cor_*` mirror fields, ...).

use std::collections::BTreeMap;
use std::fs;
use std::ops::{Neg, Sub};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SceneGenError;

// -- Geometry --------------------------------------------------------

/// A 3-vector, serialized as a JSON array `[x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3(pub f64, pub f64, pub f64);

impl Vec3 {
    pub const ZERO: Vec3 = Vec3(0.0, 0.0, 0.0);

    pub fn dot(self, other: Vec3) -> f64 {
        self.0 * other.0 + self.1 * other.1 + self.2 * other.2
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3(
            self.1 * other.2 - self.2 * other.1,
            self.2 * other.0 - self.0 * other.2,
            self.0 * other.1 - self.1 * other.0,
        )
    }

    pub fn scale(self, k: f64) -> Vec3 {
        Vec3(self.0 * k, self.1 * k, self.2 * k)
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or None if the length is too
    /// small to normalize meaningfully.
    pub fn normalized(self) -> Option<Vec3> {
        let len = self.length();
        if len < 1e-9 {
            None
        } else {
            Some(self.scale(1.0 / len))
        }
    }

    /// Component of `self` along `axis` (assumed non-zero).
    pub fn project_onto(self, axis: Vec3) -> Vec3 {
        axis.scale(self.dot(axis) / axis.dot(axis))
    }

    /// Component of `self` perpendicular to `axis`.
    pub fn reject_from(self, axis: Vec3) -> Vec3 {
        self - self.project_onto(axis)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3(self.0 - other.0, self.1 - other.1, self.2 - other.2)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3(-self.0, -self.1, -self.2)
    }
}

// -- Directions ------------------------------------------------------

/// The four horizontal cardinal directions used for relationship
/// labeling. Above/below are excluded: objects all rest on the plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Behind,
    Front,
    Left,
    Right,
}

impl Direction {
    pub const HORIZONTAL: [Direction; 4] = [
        Direction::Behind,
        Direction::Front,
        Direction::Left,
        Direction::Right,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Direction::Behind => "behind",
            Direction::Front => "front",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// Six unit vectors derived once per scene from the renderer's camera
/// and ground-plane orientation. `front = -behind`, `right = -left`,
/// `below = -above`. Immutable after derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionFrame {
    pub behind: Vec3,
    pub front: Vec3,
    pub left: Vec3,
    pub right: Vec3,
    pub above: Vec3,
    pub below: Vec3,
}

impl DirectionFrame {
    pub fn horizontal(&self, direction: Direction) -> Vec3 {
        match direction {
            Direction::Behind => self.behind,
            Direction::Front => self.front,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }
}

// -- Objects / scenes --------------------------------------------------

/// Ground-truth record for one object. Identity is positional: the
/// index of the object in its scene's ordered `objects` list.
///
/// `3d_coords.2` doubles as the effective placement footprint radius;
/// objects rest on the plane, so their center height equals the scaled
/// (and, for diagonal shapes, corrected) radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub shape: String,
    pub size: String,
    pub material: String,
    #[serde(rename = "3d_coords")]
    pub coords_3d: Vec3,
    pub rotation: f64,
    pub pixel_coords: (i32, i32, f64),
    pub color: String,
}

impl SceneObject {
    pub fn footprint(&self) -> (f64, f64, f64) {
        (self.coords_3d.0, self.coords_3d.1, self.coords_3d.2)
    }
}

/// A scene object paired with its live renderer handle.
///
/// Kept as one composite record (never parallel lists) so inserts and
/// reverts cannot desynchronize object data from renderer state.
#[derive(Debug, Clone)]
pub struct PlacedObject {
    pub record: SceneObject,
    pub handle: crate::renderer::ObjectHandle,
}

/// Directed relationship graph: `get(d)[i]` lists the indices `j` such
/// that object `j` lies in direction `d` from object `i`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelationshipGraph {
    pub behind: Vec<Vec<usize>>,
    pub front: Vec<Vec<usize>>,
    pub left: Vec<Vec<usize>>,
    pub right: Vec<Vec<usize>>,
}

impl RelationshipGraph {
    pub fn get(&self, direction: Direction) -> &Vec<Vec<usize>> {
        match direction {
            Direction::Behind => &self.behind,
            Direction::Front => &self.front,
            Direction::Left => &self.left,
            Direction::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut Vec<Vec<usize>> {
        match direction {
            Direction::Behind => &mut self.behind,
            Direction::Front => &mut self.front,
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
        }
    }
}

/// Per-image ground-truth document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub split: String,
    pub image_index: usize,
    pub image_filename: String,
    pub objects: Vec<SceneObject>,
    pub directions: DirectionFrame,
    pub relationships: RelationshipGraph,
}

// -- Change tracking ---------------------------------------------------

/// The six change-outcome tallies. Position mutations are tallied under
/// the `size_*` keys; the downstream consumer expects these exact names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    SizeChanged,
    SizeUnchanged,
    ColorChanged,
    ColorUnchanged,
    MatChanged,
    MatUnchanged,
}

impl ChangeKind {
    pub fn is_changed(self) -> bool {
        matches!(
            self,
            ChangeKind::SizeChanged | ChangeKind::ColorChanged | ChangeKind::MatChanged
        )
    }
}

/// Aggregate change-outcome counters.
///
/// Owned by the run driver and threaded through the mutation engine by
/// reference; never a process-wide global. Parallel runs can keep one
/// accumulator per worker and `merge` them at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    #[serde(default)]
    pub size_changed: u32,
    #[serde(default)]
    pub size_unchanged: u32,
    #[serde(default)]
    pub color_changed: u32,
    #[serde(default)]
    pub color_unchanged: u32,
    #[serde(default)]
    pub mat_changed: u32,
    #[serde(default)]
    pub mat_unchanged: u32,
}

impl ChangeCounts {
    pub fn bump(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::SizeChanged => self.size_changed += 1,
            ChangeKind::SizeUnchanged => self.size_unchanged += 1,
            ChangeKind::ColorChanged => self.color_changed += 1,
            ChangeKind::ColorUnchanged => self.color_unchanged += 1,
            ChangeKind::MatChanged => self.mat_changed += 1,
            ChangeKind::MatUnchanged => self.mat_unchanged += 1,
        }
    }

    pub fn merge(&mut self, other: &ChangeCounts) {
        self.size_changed += other.size_changed;
        self.size_unchanged += other.size_unchanged;
        self.color_changed += other.color_changed;
        self.color_unchanged += other.color_unchanged;
        self.mat_changed += other.mat_changed;
        self.mat_unchanged += other.mat_unchanged;
    }

    pub fn total(&self) -> u32 {
        self.size_changed
            + self.size_unchanged
            + self.color_changed
            + self.color_unchanged
            + self.mat_changed
            + self.mat_unchanged
    }

    /// The single dominant outcome, if exactly the expected tally shape
    /// (used per mutation attempt, where one counter is incremented).
    pub fn dominant_kind(&self) -> Option<ChangeKind> {
        let entries = [
            (ChangeKind::SizeChanged, self.size_changed),
            (ChangeKind::SizeUnchanged, self.size_unchanged),
            (ChangeKind::ColorChanged, self.color_changed),
            (ChangeKind::ColorUnchanged, self.color_unchanged),
            (ChangeKind::MatChanged, self.mat_changed),
            (ChangeKind::MatUnchanged, self.mat_unchanged),
        ];
        entries.iter().find(|(_, n)| *n > 0).map(|(k, _)| *k)
    }
}

/// Per-scene mutation bookkeeping: which objects were targeted and the
/// outcome tallies for each.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneChangeCounts {
    pub obj_id: Vec<usize>,
    pub counts: Vec<ChangeCounts>,
}

/// An object snapshot augmented with four direction-membership flags
/// describing where its cross-scene counterpart lies relative to it
/// (1 = counterpart is in that direction, 0 = it is not). The `behind`
/// direction is emitted as `back` in this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    #[serde(flatten)]
    pub object: SceneObject,
    pub left: u8,
    pub right: u8,
    pub front: u8,
    pub back: u8,
}

/// Machine-readable description of the single mutation applied between
/// a scene and its action sibling. For `*_unchanged` outcomes only
/// `type` is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Changes {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChangeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj: Option<ObjectSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cobj: Option<ObjectSnapshot>,
}

/// Paired before/after document emitted in action mode, with `cor_*`
/// mirror fields for the mutated sibling and a relationship graph over
/// the union of both object sets (originals first, mutated appended).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedScene {
    pub split: String,
    pub image_index: usize,
    pub image_filename: String,
    pub objects: Vec<SceneObject>,
    pub directions: DirectionFrame,
    pub cor_split: String,
    pub cor_image_filename: String,
    pub cor_objects: Vec<SceneObject>,
    pub cor_directions: DirectionFrame,
    pub scene_change_counts: SceneChangeCounts,
    pub relationships: RelationshipGraph,
    pub changes: Changes,
}

// -- Property catalog --------------------------------------------------

/// The object property palette: color names to RGB, material and shape
/// names to renderer asset ids, size names to radius scalars.
///
/// BTreeMaps keep iteration order stable so seeded runs are
/// reproducible regardless of file ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyCatalog {
    pub colors: BTreeMap<String, [u8; 3]>,
    pub materials: BTreeMap<String, String>,
    pub shapes: BTreeMap<String, String>,
    pub sizes: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_color_combos: Option<BTreeMap<String, Vec<String>>>,
}

impl PropertyCatalog {
    pub fn from_path(path: &Path) -> Result<Self, SceneGenError> {
        let raw = fs::read_to_string(path).map_err(|e| SceneGenError::io(path, e))?;
        let catalog: PropertyCatalog =
            serde_json::from_str(&raw).map_err(|e| SceneGenError::MalformedJson {
                path: path.to_path_buf(),
                source: e,
            })?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), SceneGenError> {
        if self.colors.is_empty()
            || self.materials.is_empty()
            || self.shapes.is_empty()
            || self.sizes.is_empty()
        {
            return Err(SceneGenError::Configuration(
                "property catalog must define at least one color, material, shape, and size"
                    .into(),
            ));
        }
        if let Some(combos) = &self.shape_color_combos {
            for (shape, colors) in combos {
                if !self.shapes.contains_key(shape) {
                    return Err(SceneGenError::Configuration(format!(
                        "shape_color_combos references unknown shape {shape:?}"
                    )));
                }
                for color in colors {
                    if !self.colors.contains_key(color) {
                        return Err(SceneGenError::Configuration(format!(
                            "shape_color_combos references unknown color {color:?}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Color names drawable for the given shape, honoring combo
    /// restrictions when present.
    pub fn allowed_colors(&self, shape: &str) -> Vec<&str> {
        if let Some(combos) = &self.shape_color_combos {
            if let Some(colors) = combos.get(shape) {
                return colors.iter().map(String::as_str).collect();
            }
        }
        self.colors.keys().map(String::as_str).collect()
    }

    pub fn color_rgb(&self, name: &str) -> Result<[u8; 3], SceneGenError> {
        self.colors.get(name).copied().ok_or_else(|| {
            SceneGenError::Configuration(format!("unknown color name {name:?}"))
        })
    }

    pub fn shape_asset(&self, name: &str) -> Result<&str, SceneGenError> {
        self.shapes.get(name).map(String::as_str).ok_or_else(|| {
            SceneGenError::Configuration(format!("unknown shape name {name:?}"))
        })
    }

    pub fn material_asset(&self, name: &str) -> Result<&str, SceneGenError> {
        self.materials.get(name).map(String::as_str).ok_or_else(|| {
            SceneGenError::Configuration(format!("unknown material name {name:?}"))
        })
    }
}

// -- Generation parameters ---------------------------------------------

fn default_num_images() -> usize {
    5
}
fn default_min_objects() -> u32 {
    3
}
fn default_max_objects() -> u32 {
    10
}
fn default_min_dist() -> f64 {
    0.25
}
fn default_margin() -> f64 {
    0.4
}
fn default_min_pixels() -> u64 {
    200
}
fn default_max_retries() -> u32 {
    50
}
fn default_max_restarts() -> u32 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_split() -> String {
    "new".into()
}
fn default_action_split() -> String {
    "cor".into()
}
fn default_combined_split() -> String {
    "cb".into()
}
fn default_prefix() -> String {
    "CLEVR".into()
}
fn default_image_ext() -> String {
    "png".into()
}
fn default_version() -> String {
    "1.0".into()
}
fn default_license() -> String {
    "Creative Commons Attribution (CC-BY 4.0)".into()
}
fn default_max_changes() -> usize {
    1
}
fn default_relocation_prob() -> f64 {
    0.8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub seed: u64,
    #[serde(default = "default_num_images")]
    pub num_images: usize,
    #[serde(default)]
    pub start_idx: usize,
    #[serde(default = "default_min_objects")]
    pub min_objects: u32,
    #[serde(default = "default_max_objects")]
    pub max_objects: u32,
    #[serde(default = "default_min_dist")]
    pub min_dist: f64,
    #[serde(default = "default_margin")]
    pub margin: f64,
    #[serde(default = "default_min_pixels")]
    pub min_pixels_per_object: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "default_true")]
    pub action: bool,
    #[serde(default = "default_split")]
    pub split: String,
    #[serde(default = "default_action_split")]
    pub action_split: String,
    #[serde(default = "default_combined_split")]
    pub combined_split: String,
    #[serde(default = "default_prefix")]
    pub filename_prefix: String,
    #[serde(default = "default_image_ext")]
    pub image_ext: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_license")]
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default = "default_max_changes")]
    pub max_changes: usize,
    #[serde(default = "default_relocation_prob")]
    pub relocation_prob: f64,
}

impl GenerationParams {
    pub fn with_seed(seed: u64) -> Self {
        GenerationParams {
            seed,
            num_images: default_num_images(),
            start_idx: 0,
            min_objects: default_min_objects(),
            max_objects: default_max_objects(),
            min_dist: default_min_dist(),
            margin: default_margin(),
            min_pixels_per_object: default_min_pixels(),
            max_retries: default_max_retries(),
            max_restarts: default_max_restarts(),
            action: true,
            split: default_split(),
            action_split: default_action_split(),
            combined_split: default_combined_split(),
            filename_prefix: default_prefix(),
            image_ext: default_image_ext(),
            version: default_version(),
            license: default_license(),
            date: None,
            max_changes: default_max_changes(),
            relocation_prob: default_relocation_prob(),
        }
    }

    pub fn date_or_today(&self) -> String {
        self.date
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%m/%d/%Y").to_string())
    }

    pub fn validate(&self) -> Result<(), SceneGenError> {
        if self.min_objects == 0 || self.min_objects > self.max_objects {
            return Err(SceneGenError::Configuration(format!(
                "invalid object count range {}..={}",
                self.min_objects, self.max_objects
            )));
        }
        if self.max_retries == 0 || self.max_restarts == 0 {
            return Err(SceneGenError::Configuration(
                "max_retries and max_restarts must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.relocation_prob) {
            return Err(SceneGenError::Configuration(format!(
                "relocation_prob {} outside [0, 1]",
                self.relocation_prob
            )));
        }
        Ok(())
    }
}

// -- Tests ---------------------------------------------------------
