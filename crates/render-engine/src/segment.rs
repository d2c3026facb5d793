//! Per-scene segment encoding plan and render state machine.

use std::path::PathBuf;

use scenereel_common::config::EngineDefaults;
use scenereel_common::error::{ReelError, ReelResult};
use scenereel_project_model::{OutputFormat, RenderSettings};

/// Audio source for a segment encode.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderInput {
    File(PathBuf),
    /// Generated silence for the full segment length.
    Silence,
}

/// Output stream parameters shared by every segment of a run.
///
/// Segments are joined by stream copy, so all of them must be encoded with
/// identical parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: OutputFormat,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub audio_sample_rate: u32,
}

impl EncodeSettings {
    pub fn new(settings: &RenderSettings, defaults: &EngineDefaults) -> Self {
        let (width, height) = settings.resolution.dimensions();
        Self {
            width,
            height,
            fps: defaults.fps.max(1),
            format: settings.format,
            video_bitrate_kbps: defaults.video_bitrate_kbps,
            audio_bitrate_kbps: defaults.audio_bitrate_kbps,
            audio_sample_rate: defaults.audio_sample_rate,
        }
    }
}

/// How long an encoded segment runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentLength {
    /// Cut at exactly this many seconds.
    Fixed(f64),
    /// The video's own length is unknown. Hold its last frame until the
    /// audio window of this many seconds ends.
    HoldToAudio(f64),
    /// Neither length is known; stop when the video stream ends.
    UntilVideoEnds,
}

impl SegmentLength {
    /// Planned length, if known before encoding.
    pub fn secs(self) -> Option<f64> {
        match self {
            SegmentLength::Fixed(secs) | SegmentLength::HoldToAudio(secs) => Some(secs),
            SegmentLength::UntilVideoEnds => None,
        }
    }
}

/// Everything the media engine needs to encode one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub scene_id: u32,
    pub video: PathBuf,
    pub audio: EncoderInput,
    /// Filter graph producing `[vout]` from input 0 and `[aout]` from input 1.
    pub filter_graph: String,
    pub length: SegmentLength,
    pub encode: EncodeSettings,
    pub output: PathBuf,
}

/// One encoded scene, ready for multiplexing.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSegment {
    pub scene_id: u32,
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Lifecycle of a scene render.
///
/// `Loading -> Playing -> Draining -> Done`, with `Failed` reachable from
/// any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneRenderState {
    Loading,
    Playing,
    Draining,
    Done,
    Failed,
}

impl SceneRenderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SceneRenderState::Done | SceneRenderState::Failed)
    }
}

/// Tracks one scene through its render.
#[derive(Debug)]
pub struct SceneRender {
    scene_id: u32,
    state: SceneRenderState,
    audio_stopped: bool,
}

impl SceneRender {
    pub fn new(scene_id: u32) -> Self {
        tracing::debug!(scene_id, state = ?SceneRenderState::Loading, "Scene render state");
        Self {
            scene_id,
            state: SceneRenderState::Loading,
            audio_stopped: false,
        }
    }

    pub fn state(&self) -> SceneRenderState {
        self.state
    }

    /// Whether the audio source has been released. Set by `stop`, and so by
    /// `finish` and `fail`, whatever state the render was in.
    pub fn audio_stopped(&self) -> bool {
        self.audio_stopped
    }

    /// Inputs are loaded; begin playback.
    pub fn play(&mut self) -> ReelResult<()> {
        self.transition(SceneRenderState::Loading, SceneRenderState::Playing)
    }

    /// Halt playback and the audio source. Repeated calls are no-ops.
    pub fn stop(&mut self) {
        if self.state == SceneRenderState::Playing {
            self.set(SceneRenderState::Draining);
        }
        if !self.audio_stopped {
            self.audio_stopped = true;
            tracing::trace!(scene_id = self.scene_id, "Audio source stopped");
        }
    }

    /// The segment has been fully written.
    pub fn finish(&mut self) -> ReelResult<()> {
        self.stop();
        self.transition(SceneRenderState::Draining, SceneRenderState::Done)
    }

    /// Mark the render failed. Stops the audio source first.
    pub fn fail(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.stop();
        self.set(SceneRenderState::Failed);
    }

    fn transition(&mut self, from: SceneRenderState, to: SceneRenderState) -> ReelResult<()> {
        if self.state != from {
            return Err(ReelError::scene_render(
                self.scene_id,
                format!("cannot move from {:?} to {:?}", self.state, to),
            ));
        }
        self.set(to);
        Ok(())
    }

    fn set(&mut self, state: SceneRenderState) {
        tracing::debug!(scene_id = self.scene_id, ?state, "Scene render state");
        self.state = state;
    }
}
