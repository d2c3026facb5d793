//! Per-run scratch directory.
//!
//! Asset blobs are materialized here so the media engine can address them
//! by path. Segments, cue text files and the joined output live here too.
//! Everything is removed when the run ends, successful or not.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use scenereel_common::error::{ReelError, ReelResult};
use scenereel_project_model::Asset;
use tempfile::TempDir;

/// Scratch directory owned by one render run.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
    staged: Mutex<HashMap<StageKey, PathBuf>>,
}

/// Archive path plus a digest of the bytes. Two pools may carry different
/// blobs under the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StageKey {
    path: String,
    len: usize,
    digest: u64,
}

impl StageKey {
    fn of(asset: &Asset) -> Self {
        let mut hasher = DefaultHasher::new();
        asset.bytes().hash(&mut hasher);
        Self {
            path: asset.path().to_string(),
            len: asset.bytes().len(),
            digest: hasher.finish(),
        }
    }
}

impl WorkDir {
    /// Create a fresh directory under `parent`, or the system temp dir.
    pub fn create(parent: Option<&Path>) -> ReelResult<Self> {
        let builder_result = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                tempfile::Builder::new().prefix("scenereel-").tempdir_in(parent)
            }
            None => tempfile::Builder::new().prefix("scenereel-").tempdir(),
        };
        let dir = builder_result?;
        tracing::debug!(path = %dir.path().display(), "Created work directory");
        Ok(Self {
            dir,
            staged: Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an asset's bytes to disk once and return the file path.
    ///
    /// The same asset staged twice (e.g. shared by two scenes) is written
    /// only once. Assets are keyed by path and content, and every new key
    /// gets its own file.
    pub fn stage(&self, asset: &Asset) -> ReelResult<PathBuf> {
        let mut staged = self
            .staged
            .lock()
            .map_err(|_| ReelError::config("work directory state poisoned"))?;
        let key = StageKey::of(asset);
        if let Some(path) = staged.get(&key) {
            return Ok(path.clone());
        }

        let extension = asset.extension().unwrap_or_else(|| "bin".to_string());
        let path = self
            .dir
            .path()
            .join(format!("asset_{:04}.{extension}", staged.len()));
        std::fs::write(&path, asset.bytes())?;
        tracing::trace!(asset = asset.path(), staged = %path.display(), "Staged asset");
        staged.insert(key, path.clone());
        Ok(path)
    }

    pub fn segment_path(&self, index: usize, scene_id: u32, extension: &str) -> PathBuf {
        self.dir
            .path()
            .join(format!("segment_{index:04}_scene_{scene_id}.{extension}"))
    }

    /// Write a cue's text to its own file for the text renderer.
    pub fn text_file(&self, scene_id: u32, cue_index: usize, text: &str) -> ReelResult<PathBuf> {
        let path = self
            .dir
            .path()
            .join(format!("cue_{scene_id}_{cue_index}.txt"));
        std::fs::write(&path, text)?;
        Ok(path)
    }

    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.dir.path().join(format!("output.{extension}"))
    }

    /// Remove the directory. Failures are logged and swallowed.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(path = %path.display(), error = %e, "Failed to clean up work directory");
        } else {
            tracing::debug!(path = %path.display(), "Removed work directory");
        }
    }
}
