//! Error types shared across SceneReel crates.

use std::path::PathBuf;

/// Top-level error type for SceneReel operations.
///
/// Only render-blocking or data-integrity conditions are represented here.
/// Unmatched files and missing channels are modelled as absent values, not
/// errors.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error("Scene document error: {message}")]
    ConfigParse { message: String },

    #[error("Failed to load media '{asset}': {message}")]
    AssetProbe { asset: String, message: String },

    #[error("Scene {scene_id} could not be rendered: {message}")]
    SceneRender { scene_id: u32, message: String },

    #[error("No scene has a usable video asset")]
    NoRenderableScenes,

    #[error("Encoder error: {message}")]
    Encoder { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelError.
pub type ReelResult<T> = Result<T, ReelError>;

impl ReelError {
    pub fn config_parse(msg: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: msg.into(),
        }
    }

    pub fn asset_probe(asset: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::AssetProbe {
            asset: asset.into(),
            message: msg.into(),
        }
    }

    pub fn scene_render(scene_id: u32, msg: impl Into<String>) -> Self {
        Self::SceneRender {
            scene_id,
            message: msg.into(),
        }
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Stable short name of the failure, suitable for user-facing reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } => "config_parse",
            Self::AssetProbe { .. } => "asset_probe",
            Self::SceneRender { .. } => "scene_render",
            Self::NoRenderableScenes => "no_renderable_scenes",
            Self::Encoder { .. } => "encoder",
            Self::Config { .. } => "config",
            Self::FileNotFound { .. } => "file_not_found",
            Self::Unsupported { .. } => "unsupported",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_render_message_names_scene() {
        let err = ReelError::scene_render(4, "video stream is corrupt");
        assert_eq!(
            err.to_string(),
            "Scene 4 could not be rendered: video stream is corrupt"
        );
        assert_eq!(err.kind(), "scene_render");
    }

    #[test]
    fn test_io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ReelError = io.into();
        assert_eq!(err.kind(), "io");
    }
}
