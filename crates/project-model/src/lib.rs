//! SceneReel Project Model
//!
//! Defines the core data contracts for SceneReel projects:
//! - **Assets:** Immutable named byte blobs, partitioned by kind into a pool
//! - **Scenes:** The declarative scene document and its per-scene references
//! - **Cues:** Timed subtitle entries with a directionality hint
//! - **Settings:** Target resolution, sync mode, subtitle style, output format
//!
//! All times are seconds as `f64`. Cue times are absolute (project-wide)
//! until distributed to scenes, scene-relative afterwards.

pub mod asset;
pub mod cue;
pub mod scene;
pub mod settings;

pub use asset::*;
pub use cue::*;
pub use scene::*;
pub use settings::*;

/// Errors that can occur when loading project inputs.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {origin}: {source}")]
    ParseError {
        origin: String,
        source: serde_json::Error,
    },

    #[error("Invalid scene document: {message}")]
    ValidationError { message: String },
}

impl From<ModelError> for scenereel_common::error::ReelError {
    /// Anything wrong with project inputs is a document error, except a
    /// missing file.
    fn from(err: ModelError) -> Self {
        use scenereel_common::error::ReelError;
        match err {
            ModelError::IoError { path, source }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                ReelError::FileNotFound { path }
            }
            ModelError::IoError { source, .. } => ReelError::Io(source),
            other => ReelError::config_parse(other.to_string()),
        }
    }
}
