//! Output multiplexer: joins per-scene segments into one artifact.

use std::path::{Path, PathBuf};

use scenereel_common::error::{ReelError, ReelResult};

use crate::engine::MediaEngine;
use crate::segment::RenderedSegment;

/// The finished render.
#[derive(Clone, PartialEq)]
pub struct RenderedArtifact {
    pub bytes: Vec<u8>,
    /// Suggested file extension, without the dot.
    pub extension: &'static str,
    pub duration_secs: f64,
    /// Ids of the scenes included, in output order.
    pub scenes: Vec<u32>,
}

impl RenderedArtifact {
    /// Write the artifact to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path) -> ReelResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for RenderedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedArtifact")
            .field("bytes", &self.bytes.len())
            .field("extension", &self.extension)
            .field("duration_secs", &self.duration_secs)
            .field("scenes", &self.scenes)
            .finish()
    }
}

/// Join `segments` in order.
///
/// A single segment is passed through byte for byte. Several segments are
/// joined by stream copy into `output` and never re-encoded.
pub async fn multiplex(
    engine: &dyn MediaEngine,
    segments: &[RenderedSegment],
    output: &Path,
    extension: &'static str,
) -> ReelResult<RenderedArtifact> {
    let bytes = match segments {
        [] => return Err(ReelError::NoRenderableScenes),
        [only] => {
            tracing::debug!(scene_id = only.scene_id, "Single segment, passing through");
            read_output(&only.path).await?
        }
        many => {
            let paths: Vec<PathBuf> = many.iter().map(|s| s.path.clone()).collect();
            engine.concat(&paths, output).await?;
            read_output(output).await?
        }
    };

    Ok(RenderedArtifact {
        bytes,
        extension,
        duration_secs: segments.iter().map(|s| s.duration_secs).sum(),
        scenes: segments.iter().map(|s| s.scene_id).collect(),
    })
}

async fn read_output(path: &Path) -> ReelResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ReelError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => e.into(),
    })
}
