//! Media assets and the partitioned asset pool.
//!
//! Assets are immutable once created. The pool keeps one list per kind in
//! the order assets were supplied, so resolution is deterministic for a
//! given input ordering.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Classification of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Audio,
    Subtitle,
    Sfx,
    Config,
    Unknown,
}

/// The per-scene channels an asset can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Video,
    Audio,
    Subtitle,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Video, Channel::Audio, Channel::Subtitle];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Video => "video",
            Channel::Audio => "audio",
            Channel::Subtitle => "subtitle",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "avi", "m4v"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "ogg", "flac", "opus"];
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "vtt", "ass", "ssa"];
const CONFIG_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml"];

impl AssetKind {
    /// Classify an archive path by extension.
    ///
    /// Audio files whose name mentions `sfx` are sound effects. JSON files
    /// whose name mentions `cue` or `sub` are cue lists; other JSON files are
    /// treated as scene documents.
    pub fn classify(path: &str) -> Self {
        let name = terminal_name(path).to_ascii_lowercase();
        let Some((_, ext)) = name.rsplit_once('.') else {
            return AssetKind::Unknown;
        };

        if VIDEO_EXTENSIONS.contains(&ext) {
            AssetKind::Video
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            if name.contains("sfx") {
                AssetKind::Sfx
            } else {
                AssetKind::Audio
            }
        } else if SUBTITLE_EXTENSIONS.contains(&ext) {
            AssetKind::Subtitle
        } else if ext == "json" && (name.contains("cue") || name.contains("sub")) {
            AssetKind::Subtitle
        } else if CONFIG_EXTENSIONS.contains(&ext) {
            AssetKind::Config
        } else {
            AssetKind::Unknown
        }
    }

    /// The scene channel this kind can fill, if any.
    pub fn channel(self) -> Option<Channel> {
        match self {
            AssetKind::Video => Some(Channel::Video),
            AssetKind::Audio => Some(Channel::Audio),
            AssetKind::Subtitle => Some(Channel::Subtitle),
            AssetKind::Sfx | AssetKind::Config | AssetKind::Unknown => None,
        }
    }
}

/// An immutable named byte blob.
#[derive(Clone)]
pub struct Asset {
    name: String,
    path: String,
    kind: AssetKind,
    bytes: Arc<[u8]>,
}

impl Asset {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        kind: AssetKind,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
            bytes: bytes.into(),
        }
    }

    /// Build an asset from an archive path, deriving name and kind.
    pub fn from_path_bytes(path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let path = path.into();
        let kind = AssetKind::classify(&path);
        let name = terminal_name(&path).to_string();
        Self::new(name, path, kind, bytes)
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Original archive path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Final path component of the archive path.
    pub fn file_name(&self) -> &str {
        terminal_name(&self.path)
    }

    /// File name with its last extension removed.
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        }
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.file_name()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.kind == other.kind && self.bytes == other.bytes
    }
}

fn terminal_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Assets partitioned by kind, each list in supply order.
#[derive(Debug, Clone, Default)]
pub struct AssetPool {
    videos: Vec<Asset>,
    audios: Vec<Asset>,
    subtitles: Vec<Asset>,
    sfx: Vec<Asset>,
    configs: Vec<Asset>,
    unknown: Vec<Asset>,
}

impl AssetPool {
    pub fn new(assets: impl IntoIterator<Item = Asset>) -> Self {
        let mut pool = Self::default();
        for asset in assets {
            pool.push(asset);
        }
        pool
    }

    pub fn push(&mut self, asset: Asset) {
        match asset.kind() {
            AssetKind::Video => self.videos.push(asset),
            AssetKind::Audio => self.audios.push(asset),
            AssetKind::Subtitle => self.subtitles.push(asset),
            AssetKind::Sfx => self.sfx.push(asset),
            AssetKind::Config => self.configs.push(asset),
            AssetKind::Unknown => self.unknown.push(asset),
        }
    }

    /// Load every file below `root`, in sorted path order.
    ///
    /// Asset paths are recorded relative to `root` with `/` separators.
    pub fn from_dir(root: impl AsRef<Path>) -> Result<Self, ModelError> {
        let root = root.as_ref();
        let mut files = Vec::new();
        collect_files(root, &mut files)?;
        files.sort();

        let mut pool = Self::default();
        for file in files {
            let bytes = std::fs::read(&file).map_err(|e| ModelError::IoError {
                path: file.clone(),
                source: e,
            })?;
            let relative = file
                .strip_prefix(root)
                .unwrap_or(&file)
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let asset = Asset::from_path_bytes(relative, bytes);
            tracing::debug!(path = asset.path(), kind = ?asset.kind(), "Loaded asset");
            pool.push(asset);
        }
        Ok(pool)
    }

    /// Candidates for a scene channel, in pool order.
    pub fn candidates(&self, channel: Channel) -> &[Asset] {
        match channel {
            Channel::Video => &self.videos,
            Channel::Audio => &self.audios,
            Channel::Subtitle => &self.subtitles,
        }
    }

    pub fn of_kind(&self, kind: AssetKind) -> &[Asset] {
        match kind {
            AssetKind::Video => &self.videos,
            AssetKind::Audio => &self.audios,
            AssetKind::Subtitle => &self.subtitles,
            AssetKind::Sfx => &self.sfx,
            AssetKind::Config => &self.configs,
            AssetKind::Unknown => &self.unknown,
        }
    }

    pub fn len(&self) -> usize {
        self.videos.len()
            + self.audios.len()
            + self.subtitles.len()
            + self.sfx.len()
            + self.configs.len()
            + self.unknown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn collect_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> Result<(), ModelError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ModelError::IoError {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| ModelError::IoError {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}
