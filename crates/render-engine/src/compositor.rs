//! Frame compositor: letterboxed video plus subtitle plates.
//!
//! Layout is computed here once per scene and then used twice: to build
//! the encoder filter graph, and to produce a frame-by-frame composition
//! list that is checked before encoding. All times are output (audio)
//! seconds from the start of the scene.

use std::path::{Path, PathBuf};

use scenereel_project_model::{Cue, SubtitlePosition, SubtitleStyle};
use scenereel_scene_timeline::SyncDecision;

use crate::engine::VideoInfo;
use crate::segment::{EncodeSettings, SegmentLength};

/// Horizontal padding around subtitle text, as a fraction of the font size.
const PLATE_PADDING_EM: f64 = 0.5;
/// Approximate advance width of one glyph, as a fraction of the font size.
const GLYPH_WIDTH_EM: f64 = 0.55;
const LINE_HEIGHT_EM: f64 = 1.25;
/// Distance from the canvas edge for top/bottom anchored subtitles.
const EDGE_MARGIN_FRACTION: f64 = 0.06;
const PLATE_CORNER_RADIUS_EM: f64 = 0.3;
const STROKE_WIDTH_PX: u32 = 2;
/// Tolerance when mapping cue bounds onto frame indices.
const FRAME_EPSILON: f64 = 1e-9;

/// Axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Whether this rectangle lies entirely inside a `width` x `height` canvas.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.right() <= width as f64 + 1e-6
            && self.bottom() <= height as f64 + 1e-6
    }
}

/// Center-fit a `src_w` x `src_h` frame inside the canvas, preserving aspect.
///
/// Sizes are rounded down to even pixels so the result is valid for 4:2:0
/// chroma subsampling.
pub fn letterbox_rect(src_w: u32, src_h: u32, canvas_w: u32, canvas_h: u32) -> Rect {
    let full = Rect {
        x: 0.0,
        y: 0.0,
        w: canvas_w as f64,
        h: canvas_h as f64,
    };
    if src_w == 0 || src_h == 0 || canvas_w == 0 || canvas_h == 0 {
        return full;
    }

    let scale = (canvas_w as f64 / src_w as f64).min(canvas_h as f64 / src_h as f64);
    let w = even_floor(src_w as f64 * scale).min(canvas_w as f64).max(2.0);
    let h = even_floor(src_h as f64 * scale).min(canvas_h as f64).max(2.0);
    Rect {
        x: ((canvas_w as f64 - w) / 2.0).floor(),
        y: ((canvas_h as f64 - h) / 2.0).floor(),
        w,
        h,
    }
}

fn even_floor(v: f64) -> f64 {
    ((v.floor() as u64) & !1) as f64
}

/// Where and how one cue is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleLayout {
    pub font_family: String,
    pub font_px: u32,
    /// Estimated text extent.
    pub text: Rect,
    /// Background plate: text extent plus padding.
    pub plate: Rect,
    pub corner_radius: f64,
    pub padding: f64,
    pub position: SubtitlePosition,
}

/// Lay out `cue` on a `width` x `height` canvas.
pub fn layout_subtitle(cue: &Cue, style: &SubtitleStyle, width: u32, height: u32) -> SubtitleLayout {
    let font_px = style.font_px(width, height);
    let em = font_px as f64;
    let padding = (em * PLATE_PADDING_EM).round();

    let lines: Vec<&str> = cue.text.lines().collect();
    let longest = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    let line_count = lines.len().max(1);

    let max_text_w = (width as f64 - 2.0 * padding).max(0.0);
    let text_w = (longest as f64 * em * GLYPH_WIDTH_EM).min(max_text_w);
    let text_h = line_count as f64 * em * LINE_HEIGHT_EM;

    let margin = (height as f64 * EDGE_MARGIN_FRACTION).round();
    let text_x = (width as f64 - text_w) / 2.0;
    let text_y = match style.position {
        SubtitlePosition::Top => margin + padding,
        SubtitlePosition::Center => (height as f64 - text_h) / 2.0,
        SubtitlePosition::Bottom => height as f64 - margin - padding - text_h,
    }
    .max(padding);

    let text = Rect {
        x: text_x,
        y: text_y,
        w: text_w,
        h: text_h,
    };
    let plate = Rect {
        x: text.x - padding,
        y: text.y - padding,
        w: text.w + 2.0 * padding,
        h: text.h + 2.0 * padding,
    };

    SubtitleLayout {
        font_family: style.font_family_for(cue),
        font_px,
        text,
        plate,
        corner_radius: (em * PLATE_CORNER_RADIUS_EM).round(),
        padding,
        position: style.position,
    }
}

/// One cue drawn on a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleOverlay {
    /// Index into the scene's cue list.
    pub cue_index: usize,
    pub plate: Rect,
}

/// A single frame's composition instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameComposition {
    pub frame_index: u64,
    /// Output time in seconds from the scene start.
    pub time_secs: f64,
    /// Source video time shown on this frame.
    pub source_secs: f64,
    pub video: Rect,
    pub subtitles: Vec<SubtitleOverlay>,
}

/// Aggregate view over a scene's frame compositions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositionSummary {
    pub frames: u64,
    pub frames_with_subtitles: u64,
    pub max_simultaneous_subtitles: usize,
    /// Plates that would be drawn partly outside the canvas.
    pub clipped_plates: usize,
}

/// Full layout for one scene.
#[derive(Debug, Clone)]
pub struct SceneComposition {
    pub scene_id: u32,
    pub canvas_w: u32,
    pub canvas_h: u32,
    pub fps: u32,
    pub video: Rect,
    pub decision: SyncDecision,
    pub length: SegmentLength,
    pub cues: Vec<Cue>,
    pub layouts: Vec<SubtitleLayout>,
}

impl SceneComposition {
    pub fn new(
        scene_id: u32,
        source: VideoInfo,
        decision: SyncDecision,
        length: SegmentLength,
        cues: Vec<Cue>,
        style: &SubtitleStyle,
        encode: &EncodeSettings,
    ) -> Self {
        let layouts = cues
            .iter()
            .map(|cue| layout_subtitle(cue, style, encode.width, encode.height))
            .collect();
        Self {
            scene_id,
            canvas_w: encode.width,
            canvas_h: encode.height,
            fps: encode.fps.max(1),
            video: letterbox_rect(source.width, source.height, encode.width, encode.height),
            decision,
            length,
            cues,
            layouts,
        }
    }

    /// Output length, when known before encoding.
    pub fn duration_secs(&self) -> Option<f64> {
        self.length.secs()
    }

    /// Number of output frames described by this composition.
    ///
    /// When the length is open-ended, frames run to the end of the last cue.
    pub fn frame_count(&self) -> u64 {
        let secs = self.duration_secs().unwrap_or_else(|| {
            self.cues
                .iter()
                .map(|cue| cue.end_time)
                .filter(|end| end.is_finite())
                .fold(0.0, f64::max)
        });
        (secs.max(0.0) * self.fps as f64).ceil() as u64
    }

    /// Composition of every output frame of this scene, produced lazily.
    pub fn compute_compositions(&self) -> impl Iterator<Item = FrameComposition> + '_ {
        let fps = self.fps as f64;
        (0..self.frame_count()).map(move |frame_index| {
            let time_secs = frame_index as f64 / fps;
            let subtitles = self
                .cues
                .iter()
                .zip(&self.layouts)
                .enumerate()
                .filter(|(_, (cue, _))| cue.contains(time_secs))
                .map(|(cue_index, (_, layout))| SubtitleOverlay {
                    cue_index,
                    plate: layout.plate,
                })
                .collect();
            FrameComposition {
                frame_index,
                time_secs,
                source_secs: time_secs * self.decision.playback_rate,
                video: self.video,
                subtitles,
            }
        })
    }

    /// Frame indices `[first, last]` on which `cue` is shown, if any.
    fn cue_frames(&self, cue: &Cue, frame_count: u64) -> Option<(u64, u64)> {
        if frame_count == 0 || !cue.start_time.is_finite() || !cue.end_time.is_finite() {
            return None;
        }
        let fps = self.fps as f64;
        let last_frame = (frame_count - 1) as f64;
        let first = (cue.start_time * fps - FRAME_EPSILON).ceil().max(0.0);
        let last = (cue.end_time * fps + FRAME_EPSILON).floor().min(last_frame);
        (first <= last).then_some((first as u64, last as u64))
    }

    /// Aggregate counts, computed per cue without walking every frame.
    pub fn summary(&self) -> CompositionSummary {
        let frame_count = self.frame_count();
        let mut ranges: Vec<(u64, u64)> = self
            .cues
            .iter()
            .filter_map(|cue| self.cue_frames(cue, frame_count))
            .collect();
        ranges.sort_unstable();

        let mut frames_with_subtitles = 0u64;
        let mut open: Option<(u64, u64)> = None;
        for &(first, last) in &ranges {
            open = match open {
                Some((start, end)) if first <= end + 1 => Some((start, end.max(last))),
                Some((start, end)) => {
                    frames_with_subtitles += end - start + 1;
                    Some((first, last))
                }
                None => Some((first, last)),
            };
        }
        if let Some((start, end)) = open {
            frames_with_subtitles += end - start + 1;
        }

        // Sweep: +1 where a cue starts, -1 after its last frame.
        let mut edges: Vec<(u64, i64)> = ranges
            .iter()
            .flat_map(|&(first, last)| [(first, 1), (last + 1, -1)])
            .collect();
        edges.sort_unstable();
        let mut active = 0i64;
        let mut max_simultaneous = 0i64;
        for (_, delta) in edges {
            active += delta;
            max_simultaneous = max_simultaneous.max(active);
        }

        CompositionSummary {
            frames: frame_count,
            frames_with_subtitles,
            max_simultaneous_subtitles: max_simultaneous as usize,
            clipped_plates: self
                .layouts
                .iter()
                .filter(|layout| !layout.plate.fits_within(self.canvas_w, self.canvas_h))
                .count(),
        }
    }

    /// Encoder filter graph for this scene.
    ///
    /// Input 0 is the video, input 1 the audio (file or generated silence).
    /// `text_files[i]` holds the text of cue `i`.
    pub fn filter_graph(&self, text_files: &[PathBuf], sample_rate: u32) -> String {
        let rate = self.decision.playback_rate.max(1.0);

        let mut video = vec![format!("setpts=(PTS-STARTPTS)/{rate:.6}")];
        match self.length {
            SegmentLength::Fixed(secs) => video.push(format!("trim=duration={secs:.6}")),
            SegmentLength::HoldToAudio(secs) => {
                video.push("tpad=stop_mode=clone:stop=-1".to_string());
                video.push(format!("trim=duration={secs:.6}"));
            }
            SegmentLength::UntilVideoEnds => {}
        }
        video.extend([
            format!(
                "scale={}:{}:flags=lanczos",
                self.video.w as u32, self.video.h as u32
            ),
            format!(
                "pad={}:{}:{}:{}:color=black",
                self.canvas_w, self.canvas_h, self.video.x as u32, self.video.y as u32
            ),
            "setsar=1".to_string(),
            format!("fps={}", self.fps),
            "format=yuv420p".to_string(),
        ]);

        for ((cue, layout), text_file) in self.cues.iter().zip(&self.layouts).zip(text_files) {
            video.push(drawtext(cue, layout, text_file, self.canvas_h));
        }

        format!(
            "[0:v]{video}[vout];[1:a]aresample={sample_rate},aformat=channel_layouts=stereo,apad[aout]",
            video = video.join(",")
        )
    }
}

fn drawtext(cue: &Cue, layout: &SubtitleLayout, text_file: &Path, canvas_h: u32) -> String {
    let margin = (canvas_h as f64 * EDGE_MARGIN_FRACTION).round() as u32;
    let pad = layout.padding as u32;
    let y_expr = match layout.position {
        SubtitlePosition::Top => format!("{}", margin + pad),
        SubtitlePosition::Center => "(h-th)/2".to_string(),
        SubtitlePosition::Bottom => format!("h-th-{}", margin + pad),
    };
    format!(
        "drawtext=textfile='{file}':font='{font}':fontsize={size}:fontcolor=white:borderw={stroke}:bordercolor=black:box=1:boxcolor=black:boxborderw={pad}:line_spacing={spacing}:x=(w-tw)/2:y={y_expr}:enable='between(t\\,{start:.3}\\,{end:.3})'",
        file = escape_filter_path(text_file),
        font = escape_filter_value(&layout.font_family),
        size = layout.font_px,
        stroke = STROKE_WIDTH_PX,
        spacing = ((LINE_HEIGHT_EM - 1.0) * layout.font_px as f64).round() as u32,
        start = cue.start_time,
        end = cue.end_time,
    )
}

/// Escape a path for use inside a quoted filter option.
pub fn escape_filter_path(path: &Path) -> String {
    escape_filter_value(&path.to_string_lossy().replace('\\', "/"))
}

/// Escape a value for use inside a quoted filter option.
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            ':' => escaped.push_str("\\:"),
            '\'' => escaped.push_str("\\'"),
            ',' => escaped.push_str("\\,"),
            ';' => escaped.push_str("\\;"),
            '[' => escaped.push_str("\\["),
            ']' => escaped.push_str("\\]"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
