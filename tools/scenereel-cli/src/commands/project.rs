//! Shared loading of an asset directory into a render request.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use scenereel_common::error::ReelError;
use scenereel_project_model::{
    AssetKind, AssetPool, FontTier, JsonCueDecoder, OutputFormat, RenderSettings, Resolution,
    SceneDocument, SubtitlePosition, SubtitleSize, SyncMode,
};
use scenereel_render_engine::RenderRequest;

/// Inputs and setting overrides shared by `render` and `inspect`.
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Directory holding the project's media, subtitle and config files
    pub assets: PathBuf,

    /// Scene document (defaults to the first config file in the directory)
    #[arg(long)]
    pub scenes: Option<PathBuf>,

    /// JSON cue list applied across the whole timeline
    #[arg(long)]
    pub cues: Option<PathBuf>,

    /// Output canvas: 720p, 1080p, vertical, square, 4k
    #[arg(long)]
    pub resolution: Option<Resolution>,

    /// What to do when video outlasts audio: trim, speed
    #[arg(long)]
    pub sync: Option<SyncMode>,

    /// Subtitle anchor: top, center, bottom
    #[arg(long)]
    pub subtitle_position: Option<SubtitlePosition>,

    /// Subtitle size: small, medium, large
    #[arg(long)]
    pub subtitle_size: Option<SubtitleSize>,

    /// Font tier: default, serif, mono
    #[arg(long)]
    pub font: Option<FontTier>,

    /// Explicit font family, overriding the tier
    #[arg(long)]
    pub font_family: Option<String>,

    /// Seconds added to every cue
    #[arg(long, allow_hyphen_values = true)]
    pub subtitle_offset: Option<f64>,

    /// Output format: mp4-h264, mp4-h265, webm
    #[arg(long)]
    pub format: Option<OutputFormat>,
}

impl ProjectArgs {
    /// Load the pool and scene document and apply command-line overrides.
    pub fn load(&self) -> anyhow::Result<RenderRequest> {
        let pool = AssetPool::from_dir(&self.assets)
            .with_context(|| format!("Failed to load assets from {}", self.assets.display()))?;

        let document = match &self.scenes {
            Some(path) => SceneDocument::load(path)
                .map_err(ReelError::from)
                .with_context(|| format!("Failed to load scene document {}", path.display()))?,
            None => document_from_pool(&pool, &self.assets)?,
        };

        let shared_cues = self
            .cues
            .as_deref()
            .map(load_cues)
            .transpose()?;

        let settings = self.apply(document.settings.unwrap_or_default());

        Ok(RenderRequest {
            pool,
            scenes: document.scenes,
            settings,
            shared_cues,
        })
    }

    /// Overlay the flags that were given onto `settings`.
    pub fn apply(&self, mut settings: RenderSettings) -> RenderSettings {
        if let Some(resolution) = self.resolution {
            settings.resolution = resolution;
        }
        if let Some(sync) = self.sync {
            settings.sync_mode = sync;
        }
        if let Some(position) = self.subtitle_position {
            settings.subtitle.position = position;
        }
        if let Some(size) = self.subtitle_size {
            settings.subtitle.size = size;
        }
        if let Some(font) = self.font {
            settings.subtitle.font = font;
        }
        if let Some(family) = &self.font_family {
            settings.subtitle.font_family = Some(family.clone());
        }
        if let Some(offset) = self.subtitle_offset {
            settings.subtitle.offset_secs = offset;
        }
        if let Some(format) = self.format {
            settings.format = format;
        }
        settings
    }
}

fn document_from_pool(pool: &AssetPool, root: &Path) -> anyhow::Result<SceneDocument> {
    let asset = pool.of_kind(AssetKind::Config).first().with_context(|| {
        format!(
            "No scene document in {}; pass one with --scenes",
            root.display()
        )
    })?;
    let content = std::str::from_utf8(asset.bytes())
        .with_context(|| format!("{} is not valid UTF-8", asset.path()))?;
    SceneDocument::parse(content)
        .map_err(ReelError::from)
        .with_context(|| format!("Failed to parse scene document {}", asset.path()))
}

fn load_cues(path: &Path) -> anyhow::Result<Vec<scenereel_project_model::Cue>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cues from {}", path.display()))?;
    let cues = JsonCueDecoder
        .decode_str(&path.display().to_string(), &content)
        .map_err(ReelError::from)
        .with_context(|| format!("Failed to parse cues from {}", path.display()))?;
    Ok(cues)
}
