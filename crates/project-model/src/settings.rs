//! Render settings: target resolution, sync policy, subtitle style, output format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cue::{Cue, Script};

/// Fixed output canvas sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Resolution {
    #[serde(rename = "720p")]
    Hd720,
    #[default]
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "vertical")]
    Vertical1080,
    #[serde(rename = "square")]
    Square1080,
    #[serde(rename = "4k")]
    Uhd2160,
}

impl Resolution {
    /// Width and height in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::Hd720 => (1280, 720),
            Resolution::Hd1080 => (1920, 1080),
            Resolution::Vertical1080 => (1080, 1920),
            Resolution::Square1080 => (1080, 1080),
            Resolution::Uhd2160 => (3840, 2160),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Hd720 => "720p",
            Resolution::Hd1080 => "1080p",
            Resolution::Vertical1080 => "vertical",
            Resolution::Square1080 => "square",
            Resolution::Uhd2160 => "4k",
        }
    }
}

/// Policy for reconciling a video that runs longer than its audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Play at normal speed and cut the video when the audio ends.
    #[default]
    Trim,
    /// Speed the video up uniformly so both end together.
    Speed,
}

/// Vertical anchor of the subtitle plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubtitlePosition {
    Top,
    Center,
    #[default]
    Bottom,
}

/// Subtitle size tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl SubtitleSize {
    /// Font size in pixels on a 1080-line canvas.
    pub fn base_px(self) -> f64 {
        match self {
            SubtitleSize::Small => 36.0,
            SubtitleSize::Medium => 48.0,
            SubtitleSize::Large => 64.0,
        }
    }
}

/// Font family tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontTier {
    #[default]
    Default,
    Serif,
    Mono,
}

/// Subtitle appearance and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyle {
    pub position: SubtitlePosition,
    pub size: SubtitleSize,
    pub font: FontTier,
    /// Explicit family name; wins over the tier and script defaults.
    pub font_family: Option<String>,
    /// Seconds added to every cue before rendering.
    pub offset_secs: f64,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            position: SubtitlePosition::Bottom,
            size: SubtitleSize::Medium,
            font: FontTier::Default,
            font_family: None,
            offset_secs: 0.0,
        }
    }
}

impl SubtitleStyle {
    /// Font family for a cue, honouring the override, then the script.
    pub fn font_family_for(&self, cue: &Cue) -> String {
        if let Some(family) = self.font_family.as_ref().filter(|f| !f.trim().is_empty()) {
            return family.clone();
        }
        match (Script::detect(&cue.text), self.font) {
            (Script::Hebrew, _) => "Noto Sans Hebrew".to_string(),
            (Script::Arabic, _) => "Noto Naskh Arabic".to_string(),
            (Script::OtherRtl, _) => "Noto Sans".to_string(),
            (Script::Ltr, FontTier::Default) => "Noto Sans".to_string(),
            (Script::Ltr, FontTier::Serif) => "Noto Serif".to_string(),
            (Script::Ltr, FontTier::Mono) => "Noto Sans Mono".to_string(),
        }
    }

    /// Font size in pixels scaled to the canvas' shorter side.
    pub fn font_px(&self, width: u32, height: u32) -> u32 {
        let scale = width.min(height) as f64 / 1080.0;
        (self.size.base_px() * scale).round().max(12.0) as u32
    }
}

/// Encoded output container/codec path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "mp4-h264")]
    Mp4H264,
    #[serde(rename = "mp4-h265")]
    Mp4H265,
    #[serde(rename = "webm")]
    Webm,
}

impl OutputFormat {
    /// Suggested file extension for artifacts encoded on this path.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mp4H264 | OutputFormat::Mp4H265 => "mp4",
            OutputFormat::Webm => "webm",
        }
    }
}

/// Everything that shapes a render besides the inputs themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub resolution: Resolution,
    pub sync_mode: SyncMode,
    pub subtitle: SubtitleStyle,
    pub format: OutputFormat,
}

macro_rules! impl_from_str {
    ($ty:ty, $label:literal, [$($text:literal => $value:expr),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($value),)+
                    other => Err(format!(
                        concat!("Unknown ", $label, ": {}. Use: {}"),
                        other,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

impl_from_str!(Resolution, "resolution", [
    "720p" => Resolution::Hd720,
    "1080p" => Resolution::Hd1080,
    "vertical" => Resolution::Vertical1080,
    "square" => Resolution::Square1080,
    "4k" => Resolution::Uhd2160,
]);
impl_from_str!(SyncMode, "sync mode", ["trim" => SyncMode::Trim, "speed" => SyncMode::Speed]);
impl_from_str!(SubtitlePosition, "subtitle position", [
    "top" => SubtitlePosition::Top,
    "center" => SubtitlePosition::Center,
    "bottom" => SubtitlePosition::Bottom,
]);
impl_from_str!(SubtitleSize, "subtitle size", [
    "small" => SubtitleSize::Small,
    "medium" => SubtitleSize::Medium,
    "large" => SubtitleSize::Large,
]);
impl_from_str!(FontTier, "font tier", [
    "default" => FontTier::Default,
    "serif" => FontTier::Serif,
    "mono" => FontTier::Mono,
]);
impl_from_str!(OutputFormat, "format", [
    "mp4-h264" => OutputFormat::Mp4H264,
    "mp4-h265" => OutputFormat::Mp4H265,
    "webm" => OutputFormat::Webm,
]);

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "{} ({w}x{h})", self.as_str())
    }
}
