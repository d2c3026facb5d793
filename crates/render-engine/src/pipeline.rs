//! Render pipeline entry points.
//!
//! [`render_project`] drives a whole run: resolve, probe, build the
//! timeline, render each scene in order, then multiplex. [`inspect_project`]
//! stops after the timeline and returns the plan without encoding.

use std::sync::Arc;

use scenereel_common::clock::Stopwatch;
use scenereel_common::error::{ReelError, ReelResult};
use scenereel_project_model::{
    Asset, AssetPool, Channel, Cue, CueDecoder, RenderSettings, SceneSpec, SyncMode,
};
use scenereel_scene_timeline::{
    offset_cues, AssetResolver, CueInput, ProbedScene, SyncAction, SyncDecision,
    TimelineBuilder, TimelineScene,
};

use crate::compositor::SceneComposition;
use crate::engine::{EngineContext, MediaEngine};
use crate::mux::{multiplex, RenderedArtifact};
use crate::probe::probe_scenes;
use crate::progress::{ProgressCallback, ProgressReporter, RenderStage};
use crate::segment::{
    EncodeSettings, EncoderInput, RenderedSegment, SceneRender, SegmentLength, SegmentPlan,
};
use crate::workspace::WorkDir;

/// Inputs for one render.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub pool: AssetPool,
    /// Scenes in output order.
    pub scenes: Vec<SceneSpec>,
    pub settings: RenderSettings,
    /// Project-wide cue track in absolute time. Takes precedence over any
    /// subtitle assets in the pool.
    pub shared_cues: Option<Vec<Cue>>,
}

/// Where a run's cues came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CueSource {
    None,
    /// Supplied by the caller as one shared track.
    Caller,
    /// Per-scene subtitle assets, already scene-relative.
    PerScene,
    /// One shared track decoded from this pool asset.
    PoolAsset(String),
}

/// One scene placed on the timeline, with its sync decision.
#[derive(Debug, Clone)]
pub struct ScenePlan {
    pub scene: TimelineScene,
    pub decision: SyncDecision,
}

impl ScenePlan {
    pub fn id(&self) -> u32 {
        self.scene.id()
    }

    /// Only scenes with a bound video produce a segment.
    pub fn is_renderable(&self) -> bool {
        self.scene.probed.scene.video.is_some()
    }

    pub fn asset(&self, channel: Channel) -> Option<&Asset> {
        self.scene.probed.scene.asset(channel)
    }
}

/// Everything decided before encoding starts.
#[derive(Debug, Clone)]
pub struct ProjectPlan {
    pub scenes: Vec<ScenePlan>,
    pub cue_source: CueSource,
    /// Length of the audio-anchored timeline.
    pub timeline_secs: f64,
    pub dropped_cues: usize,
}

impl ProjectPlan {
    pub fn renderable(&self) -> impl Iterator<Item = &ScenePlan> {
        self.scenes.iter().filter(|scene| scene.is_renderable())
    }

    /// Sum of effective durations of renderable scenes.
    pub fn output_secs(&self) -> f64 {
        self.renderable()
            .map(|scene| scene.decision.effective_duration_secs)
            .sum()
    }
}

/// Resolve, probe and lay out a project without encoding anything.
pub async fn inspect_project(
    ctx: &EngineContext,
    request: &RenderRequest,
    decoder: &dyn CueDecoder,
) -> ReelResult<ProjectPlan> {
    validate(request)?;
    let engine = ctx.engine().await?;
    let work = WorkDir::create(ctx.defaults().work_dir.as_deref())?;
    let result = build_plan(engine, &work, request, decoder, &ProgressReporter::silent()).await;
    work.close();
    result
}

/// Render a project to a single encoded artifact.
///
/// Returns exactly one typed error on failure; no partial output is
/// exposed. The scratch directory is removed either way.
pub async fn render_project(
    ctx: &EngineContext,
    request: &RenderRequest,
    decoder: &dyn CueDecoder,
    progress: Option<ProgressCallback>,
) -> ReelResult<RenderedArtifact> {
    let reporter = ProgressReporter::new(progress);
    let stopwatch = Stopwatch::start();
    tracing::info!(
        scenes = request.scenes.len(),
        assets = request.pool.len(),
        resolution = %request.settings.resolution,
        sync_mode = ?request.settings.sync_mode,
        started_at = stopwatch.epoch_wall(),
        "Starting render"
    );
    reporter.stage(RenderStage::Preparing, "Preparing render");

    validate(request)?;
    let engine = ctx.engine().await?;
    let work = WorkDir::create(ctx.defaults().work_dir.as_deref())?;
    let encode = EncodeSettings::new(&request.settings, ctx.defaults());

    let result = run(engine, &work, request, decoder, &encode, &reporter).await;
    work.close();

    match &result {
        Ok(artifact) => {
            reporter.stage(RenderStage::Complete, "Render complete");
            tracing::info!(
                bytes = artifact.bytes.len(),
                duration_secs = artifact.duration_secs,
                elapsed_secs = stopwatch.elapsed_secs(),
                "Render finished"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, kind = e.kind(), "Render failed");
        }
    }
    result
}

fn validate(request: &RenderRequest) -> ReelResult<()> {
    if request.scenes.is_empty() {
        return Err(ReelError::config_parse("scene list is empty"));
    }
    Ok(())
}

async fn run(
    engine: Arc<dyn MediaEngine>,
    work: &WorkDir,
    request: &RenderRequest,
    decoder: &dyn CueDecoder,
    encode: &EncodeSettings,
    reporter: &ProgressReporter,
) -> ReelResult<RenderedArtifact> {
    let plan = build_plan(engine.clone(), work, request, decoder, reporter).await?;

    for skipped in plan.scenes.iter().filter(|s| !s.is_renderable()) {
        tracing::warn!(scene_id = skipped.id(), "Scene has no video, skipping");
    }
    let renderable: Vec<&ScenePlan> = plan.renderable().collect();
    if renderable.is_empty() {
        return Err(ReelError::NoRenderableScenes);
    }

    let total = renderable.len();
    reporter.stage(RenderStage::Rendering, format!("Rendering {total} scenes"));
    let mut segments = Vec::with_capacity(total);
    for (index, scene) in renderable.into_iter().enumerate() {
        let segment = render_scene(
            engine.as_ref(),
            work,
            scene,
            &request.settings,
            encode,
            (index, total),
            reporter,
        )
        .await?;
        segments.push(segment);
    }

    reporter.stage(RenderStage::Muxing, "Joining segments");
    let extension = encode.format.extension();
    multiplex(
        engine.as_ref(),
        &segments,
        &work.output_path(extension),
        extension,
    )
    .await
}

async fn build_plan(
    engine: Arc<dyn MediaEngine>,
    work: &WorkDir,
    request: &RenderRequest,
    decoder: &dyn CueDecoder,
    reporter: &ProgressReporter,
) -> ReelResult<ProjectPlan> {
    reporter.stage(RenderStage::Probing, "Resolving and probing assets");
    let resolver = AssetResolver::new(&request.pool);
    let resolved = resolver.resolve_all(&request.scenes);
    for scene in resolved.iter().filter(|s| s.is_empty()) {
        tracing::warn!(scene_id = scene.id, "Scene matched no assets");
    }
    let probed = probe_scenes(engine, work, resolved).await;

    reporter.stage(RenderStage::Timeline, "Building timeline");
    let (cue_source, cues) = select_cues(request, &probed, decoder);
    tracing::debug!(?cue_source, "Selected cue source");
    let timeline = TimelineBuilder::new().build(probed, cues);

    let mode = request.settings.sync_mode;
    let scenes = timeline
        .scenes
        .into_iter()
        .map(|scene| {
            let durations = scene.durations();
            let decision =
                SyncDecision::decide(durations.video_secs(), durations.audio_secs(), mode);
            ScenePlan { scene, decision }
        })
        .collect();

    Ok(ProjectPlan {
        scenes,
        cue_source,
        timeline_secs: timeline.total_secs,
        dropped_cues: timeline.dropped_cues,
    })
}

/// Pick the cue source for a run.
///
/// Caller-supplied cues win. Otherwise, if any scene bound a subtitle
/// asset, each scene uses its own. Otherwise the first subtitle asset in
/// the pool is treated as one shared track.
pub fn select_cues(
    request: &RenderRequest,
    scenes: &[ProbedScene],
    decoder: &dyn CueDecoder,
) -> (CueSource, CueInput) {
    if let Some(cues) = &request.shared_cues {
        return (CueSource::Caller, CueInput::Shared(cues.clone()));
    }

    if scenes.iter().any(|s| s.scene.subtitle.is_some()) {
        let lists = scenes
            .iter()
            .map(|s| match &s.scene.subtitle {
                Some(asset) => decode_or_empty(decoder, asset, s.id()),
                None => Vec::new(),
            })
            .collect();
        return (CueSource::PerScene, CueInput::PerScene(lists));
    }

    match request.pool.candidates(Channel::Subtitle).first() {
        Some(asset) if decoder.supports(asset) => match decoder.decode(asset) {
            Ok(cues) => (
                CueSource::PoolAsset(asset.path().to_string()),
                CueInput::Shared(cues),
            ),
            Err(e) => {
                tracing::warn!(asset = asset.path(), error = %e, "Failed to decode subtitles");
                (CueSource::None, CueInput::None)
            }
        },
        Some(asset) => {
            tracing::warn!(asset = asset.path(), "No decoder for subtitle asset");
            (CueSource::None, CueInput::None)
        }
        None => (CueSource::None, CueInput::None),
    }
}

fn decode_or_empty(decoder: &dyn CueDecoder, asset: &Asset, scene_id: u32) -> Vec<Cue> {
    if !decoder.supports(asset) {
        tracing::warn!(scene_id, asset = asset.path(), "No decoder for subtitle asset");
        return Vec::new();
    }
    decoder.decode(asset).unwrap_or_else(|e| {
        tracing::warn!(scene_id, asset = asset.path(), error = %e, "Failed to decode subtitles");
        Vec::new()
    })
}

async fn render_scene(
    engine: &dyn MediaEngine,
    work: &WorkDir,
    plan: &ScenePlan,
    settings: &RenderSettings,
    encode: &EncodeSettings,
    (index, total): (usize, usize),
    reporter: &ProgressReporter,
) -> ReelResult<RenderedSegment> {
    let scene_id = plan.id();
    let mut state = SceneRender::new(scene_id);
    let result = encode_scene(
        engine,
        work,
        plan,
        settings,
        encode,
        (index, total),
        reporter,
        &mut state,
    )
    .await;
    if let Err(e) = &result {
        state.fail();
        tracing::debug!(
            scene_id,
            audio_stopped = state.audio_stopped(),
            error = %e,
            "Scene render failed"
        );
    }
    result
}

#[allow(clippy::too_many_arguments)]
async fn encode_scene(
    engine: &dyn MediaEngine,
    work: &WorkDir,
    plan: &ScenePlan,
    settings: &RenderSettings,
    encode: &EncodeSettings,
    (index, total): (usize, usize),
    reporter: &ProgressReporter,
    state: &mut SceneRender,
) -> ReelResult<RenderedSegment> {
    let scene_id = plan.id();
    let video = plan
        .asset(Channel::Video)
        .ok_or_else(|| ReelError::scene_render(scene_id, "no video asset bound"))?;

    // Loading: video metadata is mandatory, audio may degrade to silence.
    let video_path = work
        .stage(video)
        .map_err(|e| ReelError::scene_render(scene_id, e.to_string()))?;
    let info = engine
        .probe_video(&video_path)
        .await
        .map_err(|e| ReelError::scene_render(scene_id, e.to_string()))?;
    let audio = load_audio(engine, work, plan).await;

    let durations = plan.scene.durations();
    let video_secs = if durations.video_secs() > 0.0 {
        durations.video_secs()
    } else {
        info.duration_secs
    };
    let audio_secs = match audio {
        EncoderInput::File(_) => durations.audio_secs(),
        EncoderInput::Silence => 0.0,
    };
    let (decision, length) = scene_length(scene_id, video_secs, audio_secs, settings.sync_mode);
    if decision != plan.decision {
        tracing::debug!(scene_id, ?decision, planned = ?plan.decision, "Sync decision revised after loading");
    }

    let cues = offset_cues(&plan.scene.cues, settings.subtitle.offset_secs);
    let composition = SceneComposition::new(
        scene_id,
        info,
        decision,
        length,
        cues,
        &settings.subtitle,
        encode,
    );
    let summary = composition.summary();
    tracing::info!(
        scene_id,
        action = ?decision.action,
        playback_rate = decision.playback_rate,
        duration_secs = ?length.secs(),
        frames = summary.frames,
        subtitle_frames = summary.frames_with_subtitles,
        "Scene composed"
    );
    if summary.clipped_plates > 0 {
        tracing::warn!(
            scene_id,
            clipped = summary.clipped_plates,
            "Subtitle plates extend past the canvas"
        );
    }

    let text_files = composition
        .cues
        .iter()
        .enumerate()
        .map(|(i, cue)| work.text_file(scene_id, i, &cue.text))
        .collect::<ReelResult<Vec<_>>>()?;

    let segment = SegmentPlan {
        scene_id,
        video: video_path,
        audio,
        filter_graph: composition.filter_graph(&text_files, encode.audio_sample_rate),
        length,
        encode: encode.clone(),
        output: work.segment_path(index, scene_id, encode.format.extension()),
    };

    // Playing: the encoder consumes the scene.
    state.play()?;
    let message = format!("Rendering scene {} of {total}", index + 1);
    let on_progress = |fraction: f64| {
        reporter.within(
            RenderStage::Rendering,
            (index as f64 + fraction) / total as f64,
            message.as_str(),
            Some((index + 1, total)),
        );
    };
    engine.encode_segment(&segment, &on_progress).await?;

    // Draining: the encoder has flushed; release the sources.
    state.stop();
    state.finish()?;

    let duration_secs = match length.secs() {
        Some(secs) => secs,
        None => engine
            .probe_duration(&segment.output)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(scene_id, error = %e, "Could not measure rendered segment");
                0.0
            }),
    };

    Ok(RenderedSegment {
        scene_id,
        path: segment.output,
        duration_secs,
    })
}

/// Sync decision and segment length for a loaded scene.
///
/// A video whose length could not be read is never cut short: it fills the
/// audio window when there is one, otherwise it plays to its natural end.
fn scene_length(
    scene_id: u32,
    video_secs: f64,
    audio_secs: f64,
    mode: SyncMode,
) -> (SyncDecision, SegmentLength) {
    if video_secs > 0.0 {
        let decision = SyncDecision::decide(video_secs, audio_secs, mode);
        return (decision, SegmentLength::Fixed(decision.effective_duration_secs));
    }

    let decision = SyncDecision {
        action: SyncAction::None,
        playback_rate: 1.0,
        effective_duration_secs: audio_secs.max(0.0),
    };
    if audio_secs > 0.0 {
        tracing::warn!(scene_id, audio_secs, "Video duration unknown, filling the audio window");
        (decision, SegmentLength::HoldToAudio(audio_secs))
    } else {
        tracing::warn!(scene_id, "Video and audio durations unknown, rendering to the end of the video");
        (decision, SegmentLength::UntilVideoEnds)
    }
}

async fn load_audio(engine: &dyn MediaEngine, work: &WorkDir, plan: &ScenePlan) -> EncoderInput {
    let scene_id = plan.id();
    let Some(asset) = plan.asset(Channel::Audio) else {
        return EncoderInput::Silence;
    };
    let path = match work.stage(asset) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(scene_id, asset = asset.path(), error = %e, "Could not stage audio, rendering silent");
            return EncoderInput::Silence;
        }
    };
    match engine.decode_audio(&path).await {
        Ok(()) => EncoderInput::File(path),
        Err(e) => {
            tracing::warn!(scene_id, asset = asset.path(), error = %e, "Audio decode failed, rendering silent");
            EncoderInput::Silence
        }
    }
}
