//! Error taxonomy for scene generation.
//!
//! Placement rejections and occlusion failures are not errors; they are
//! routine parts of the constraint-satisfaction loop and stay internal to
//! the solver. Everything that escapes to a caller is either a renderer
//! failure or a configuration problem that no amount of retrying fixes.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by the external renderer.
///
/// `Transient` failures on the final full render are retried indefinitely
/// (logged each time); everywhere else a renderer failure is fatal for
/// the run, since the session state can no longer be trusted mid-scene.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("transient render failure: {0}")]
    Transient(String),
    #[error("render failure: {0}")]
    Fatal(String),
}

#[derive(Debug, Error)]
pub enum SceneGenError {
    /// The requested generation cannot succeed with the given settings,
    /// e.g. the object count does not fit the available area, or the
    /// property catalog is incomplete.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The camera looks straight along the ground-plane normal, so a
    /// cardinal axis projects to a zero-length vector. Not retried.
    #[error("degenerate direction frame: projected {axis} axis has near-zero length")]
    DegenerateFrame { axis: &'static str },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    MalformedJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SceneGenError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SceneGenError::Io {
            path: path.into(),
            source,
        }
    }
}
