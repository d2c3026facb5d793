//! End-to-end pipeline tests against an in-process media engine.
//!
//! Fake media files are short text descriptors:
//! `video <secs> <w>x<h>`, `audio <secs>`, `audio-broken <secs>`, `corrupt`.
//! A `?` in place of the seconds makes the duration unreadable.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scenereel_common::config::EngineDefaults;
use scenereel_common::error::{ReelError, ReelResult};
use scenereel_project_model::{
    Asset, AssetPool, Cue, JsonCueDecoder, RenderSettings, SceneSpec, SyncMode,
};
use scenereel_render_engine::engine::EncodeProgress;
use scenereel_render_engine::segment::{EncoderInput, SegmentLength, SegmentPlan};
use scenereel_render_engine::{
    inspect_project, render_project, CueSource, EngineContext, EngineInitializer, MediaEngine,
    ProgressEvent, RenderRequest, RenderStage, VideoInfo,
};

#[derive(Default)]
struct FakeEngine {
    encoded: Mutex<Vec<SegmentPlan>>,
    segment_bytes: Mutex<Vec<Vec<u8>>>,
    concat_calls: Mutex<usize>,
    fail_encode: bool,
    /// Length written for segments encoded until the video ends.
    natural_video_secs: f64,
}

fn descriptor(path: &Path) -> ReelResult<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text.split_whitespace().map(str::to_string).collect())
}

#[async_trait]
impl MediaEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn probe_duration(&self, path: &Path) -> ReelResult<f64> {
        let parts = descriptor(path)?;
        parts
            .get(1)
            .and_then(|secs| secs.parse().ok())
            .ok_or_else(|| ReelError::asset_probe(path.display().to_string(), "unreadable"))
    }

    async fn probe_video(&self, path: &Path) -> ReelResult<VideoInfo> {
        let parts = descriptor(path)?;
        if parts.first().map(String::as_str) != Some("video") {
            return Err(ReelError::asset_probe(path.display().to_string(), "no video stream"));
        }
        let (w, h) = parts[2].split_once('x').unwrap();
        Ok(VideoInfo {
            width: w.parse().unwrap(),
            height: h.parse().unwrap(),
            duration_secs: parts[1].parse().unwrap_or(0.0),
        })
    }

    async fn decode_audio(&self, path: &Path) -> ReelResult<()> {
        match descriptor(path)?.first().map(String::as_str) {
            Some("audio") => Ok(()),
            _ => Err(ReelError::asset_probe(path.display().to_string(), "bad audio")),
        }
    }

    async fn encode_segment(
        &self,
        plan: &SegmentPlan,
        progress: EncodeProgress<'_>,
    ) -> ReelResult<()> {
        if self.fail_encode {
            return Err(ReelError::encoder("encoder exploded"));
        }
        progress(0.5);
        let secs = plan.length.secs().unwrap_or(self.natural_video_secs);
        let bytes = format!("segment {secs:.3} scene {}", plan.scene_id).into_bytes();
        std::fs::write(&plan.output, &bytes)?;
        self.segment_bytes.lock().unwrap().push(bytes);
        self.encoded.lock().unwrap().push(plan.clone());
        progress(1.0);
        Ok(())
    }

    async fn concat(&self, segments: &[PathBuf], output: &Path) -> ReelResult<()> {
        *self.concat_calls.lock().unwrap() += 1;
        let mut joined = Vec::new();
        for segment in segments {
            joined.extend(std::fs::read(segment)?);
            joined.push(b'|');
        }
        std::fs::write(output, joined)?;
        Ok(())
    }
}

struct FakeInit(Arc<FakeEngine>);

#[async_trait]
impl EngineInitializer for FakeInit {
    async fn initialize(&self) -> ReelResult<Arc<dyn MediaEngine>> {
        Ok(self.0.clone())
    }
}

/// Collects formatted log lines for the duration of a test.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn context(engine: &Arc<FakeEngine>) -> EngineContext {
    EngineContext::new(Box::new(FakeInit(engine.clone())), EngineDefaults::default())
}

fn asset(path: &str, content: &str) -> Asset {
    Asset::from_path_bytes(path, content.as_bytes().to_vec())
}

fn request(assets: Vec<Asset>, scenes: Vec<SceneSpec>) -> RenderRequest {
    RenderRequest {
        pool: AssetPool::new(assets),
        scenes,
        settings: RenderSettings::default(),
        shared_cues: None,
    }
}

#[tokio::test]
async fn single_scene_output_is_the_segment_itself() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(
        vec![
            asset("scene_1.mp4", "video 4 1920x1080"),
            asset("scene_1.mp3", "audio 4"),
        ],
        vec![SceneSpec::new(1)],
    );

    let artifact = render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap();

    let segments = engine.segment_bytes.lock().unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(artifact.bytes, segments[0]);
    assert_eq!(*engine.concat_calls.lock().unwrap(), 0);
    assert_eq!(artifact.extension, "mp4");
    assert_eq!(artifact.scenes, vec![1]);
}

#[tokio::test]
async fn segments_are_joined_in_document_order() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(
        vec![
            asset("scene_1.mp4", "video 3 1280x720"),
            asset("scene_2.mp4", "video 5 1280x720"),
        ],
        vec![SceneSpec::new(2), SceneSpec::new(1)],
    );

    let artifact = render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap();

    assert_eq!(artifact.scenes, vec![2, 1]);
    assert_eq!(
        String::from_utf8(artifact.bytes).unwrap(),
        "segment 5.000 scene 2|segment 3.000 scene 1|"
    );
    assert_eq!(*engine.concat_calls.lock().unwrap(), 1);
    assert!((artifact.duration_secs - 8.0).abs() < 1e-9);
}

#[tokio::test]
async fn unmatched_scene_is_skipped_and_run_continues() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(
        vec![asset("scene_1.mp4", "video 2 1920x1080")],
        vec![
            SceneSpec::new(1),
            SceneSpec::new(3)
                .with_video("does-not-exist.mp4")
                .with_audio("nothing.wav"),
        ],
    );

    let artifact = render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap();
    assert_eq!(artifact.scenes, vec![1]);
}

#[tokio::test]
async fn no_video_anywhere_fails_before_encoding() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(
        vec![asset("scene_1.mp3", "audio 3")],
        vec![SceneSpec::new(1), SceneSpec::new(2)],
    );

    let err = render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReelError::NoRenderableScenes));
    assert!(engine.encoded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_scene_list_is_a_parse_error() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(vec![], vec![]);
    let err = render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "config_parse");
}

#[tokio::test]
async fn corrupt_video_aborts_with_scene_id() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(
        vec![
            asset("scene_1.mp4", "video 2 1920x1080"),
            asset("scene_2.mp4", "corrupt"),
        ],
        vec![SceneSpec::new(1), SceneSpec::new(2)],
    );

    let err = render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap_err();
    match err {
        ReelError::SceneRender { scene_id, .. } => assert_eq!(scene_id, 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn undecodable_audio_renders_silent_at_video_length() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(
        vec![
            asset("scene_1.mp4", "video 10 1920x1080"),
            asset("scene_1.wav", "audio-broken 6"),
        ],
        vec![SceneSpec::new(1)],
    );

    render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap();

    let plans = engine.encoded.lock().unwrap();
    assert_eq!(plans[0].audio, EncoderInput::Silence);
    assert_eq!(plans[0].length, SegmentLength::Fixed(10.0));
}

#[tokio::test]
async fn encoder_failure_surfaces_as_encoder_error() {
    let engine = Arc::new(FakeEngine {
        fail_encode: true,
        ..FakeEngine::default()
    });
    let req = request(
        vec![asset("scene_1.mp4", "video 2 1920x1080")],
        vec![SceneSpec::new(1)],
    );
    let err = render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "encoder");
}

#[tokio::test]
async fn speed_mode_and_shared_cues_reach_the_filter_graph() {
    let engine = Arc::new(FakeEngine::default());
    let mut req = request(
        vec![
            asset("scene_1.mp4", "video 10 1920x1080"),
            asset("scene_1.mp3", "audio 5"),
            asset("scene_2.mp4", "video 3 1920x1080"),
            asset("scene_2.mp3", "audio 4"),
        ],
        vec![SceneSpec::new(1), SceneSpec::new(2)],
    );
    req.settings.sync_mode = SyncMode::Speed;
    req.shared_cues = Some(vec![
        Cue::new(1.0, 2.0, "first"),
        Cue::new(6.0, 7.5, "second"),
        Cue::new(20.0, 21.0, "too late"),
    ]);

    let artifact = render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap();

    let plans = engine.encoded.lock().unwrap();
    assert!(plans[0].filter_graph.contains("setpts=(PTS-STARTPTS)/2.000000"));
    assert!(plans[0].filter_graph.contains("between(t\\,1.000\\,2.000)"));
    assert!(plans[1].filter_graph.contains("between(t\\,1.000\\,2.500)"));
    assert_eq!(plans[0].length, SegmentLength::Fixed(5.0));
    // Video shorter than audio plays as is.
    assert_eq!(plans[1].length, SegmentLength::Fixed(3.0));
    assert!((artifact.duration_secs - 8.0).abs() < 1e-9);
}

#[tokio::test]
async fn per_scene_subtitle_assets_are_used_when_bound() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(
        vec![
            asset("scene_1.mp4", "video 4 1920x1080"),
            asset(
                "scene_1_subs.json",
                r#"[{"start": 0.25, "end": 1.0, "text": "hello"}]"#,
            ),
        ],
        vec![SceneSpec::new(1)],
    );

    let plan = inspect_project(&context(&engine), &req, &JsonCueDecoder)
        .await
        .unwrap();
    assert_eq!(plan.cue_source, CueSource::PerScene);
    assert_eq!(plan.scenes[0].scene.cues.len(), 1);
    assert!(engine.encoded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn inspect_reports_decisions_without_encoding() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(
        vec![
            asset("scene_1.mp4", "video 10 1920x1080"),
            asset("scene_1.mp3", "audio 6"),
            asset("scene_2.mp3", "audio 2"),
        ],
        vec![SceneSpec::new(1), SceneSpec::new(2)],
    );

    let plan = inspect_project(&context(&engine), &req, &JsonCueDecoder)
        .await
        .unwrap();
    assert_eq!(plan.scenes.len(), 2);
    assert_eq!(plan.scenes[0].decision.effective_duration_secs, 6.0);
    assert!(!plan.scenes[1].is_renderable());
    assert_eq!(plan.timeline_secs, 8.0);
    assert_eq!(plan.output_secs(), 6.0);
    assert_eq!(plan.cue_source, CueSource::None);
    assert!(engine.encoded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn progress_is_monotonic_and_completes() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(
        vec![
            asset("scene_1.mp4", "video 2 1920x1080"),
            asset("scene_2.mp4", "video 2 1920x1080"),
        ],
        vec![SceneSpec::new(1), SceneSpec::new(2)],
    );

    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::default();
    let sink = events.clone();
    render_project(
        &context(&engine),
        &req,
        &JsonCueDecoder,
        Some(Box::new(move |event: ProgressEvent| {
            sink.lock().unwrap().push(event)
        })),
    )
    .await
    .unwrap();

    let events = events.lock().unwrap();
    assert!(events.windows(2).all(|w| w[0].progress <= w[1].progress));
    assert_eq!(events.first().unwrap().stage, RenderStage::Preparing);
    let last = events.last().unwrap();
    assert_eq!(last.stage, RenderStage::Complete);
    assert_eq!(last.progress, 100);
    assert!(events
        .iter()
        .any(|e| e.current_scene == Some(2) && e.total_scenes == Some(2)));
}

#[tokio::test]
async fn unreadable_video_duration_fills_the_audio_window() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(
        vec![
            asset("scene_1.webm", "video ? 1280x720"),
            asset("scene_1.mp3", "audio 4"),
        ],
        vec![SceneSpec::new(1)],
    );

    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let artifact = render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap();

    let plans = engine.encoded.lock().unwrap();
    assert_eq!(plans[0].length, SegmentLength::HoldToAudio(4.0));
    assert!(plans[0].filter_graph.contains("tpad=stop_mode=clone:stop=-1"));
    assert!((artifact.duration_secs - 4.0).abs() < 1e-9);
    assert!(logs.contents().contains("Duration probe failed"));
}

#[tokio::test]
async fn unreadable_video_without_audio_plays_to_its_end() {
    let engine = Arc::new(FakeEngine {
        natural_video_secs: 7.5,
        ..FakeEngine::default()
    });
    let req = request(
        vec![asset("scene_1.mkv", "video ? 1920x1080")],
        vec![SceneSpec::new(1)],
    );

    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let artifact = render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap();

    let plans = engine.encoded.lock().unwrap();
    assert_eq!(plans[0].length, SegmentLength::UntilVideoEnds);
    assert!(!plans[0].filter_graph.contains("trim="));
    // The rendered length is measured from the segment itself.
    assert!((artifact.duration_secs - 7.5).abs() < 1e-9);
    let logs = logs.contents();
    assert!(logs.contains("Duration probe failed"));
    assert!(logs.contains("rendering to the end of the video"));
}

#[tokio::test]
async fn unreadable_audio_duration_leaves_video_length_in_charge() {
    let engine = Arc::new(FakeEngine::default());
    let req = request(
        vec![
            asset("scene_1.mp4", "video 6 1920x1080"),
            asset("scene_1.mp3", "audio ?"),
            asset("scene_2.mp4", "video 2 1920x1080"),
            asset("scene_2.mp3", "audio 2"),
        ],
        vec![SceneSpec::new(1), SceneSpec::new(2)],
    );

    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let plan = inspect_project(&context(&engine), &req, &JsonCueDecoder)
        .await
        .unwrap();
    // With no audio length, scene 1 claims its video length on the timeline.
    assert_eq!(plan.scenes[0].scene.durations().audio_secs(), 0.0);
    assert_eq!(plan.scenes[0].scene.window.end, 6.0);
    assert_eq!(plan.scenes[1].scene.window.start, 6.0);

    let artifact = render_project(&context(&engine), &req, &JsonCueDecoder, None)
        .await
        .unwrap();
    let plans = engine.encoded.lock().unwrap();
    assert!(matches!(plans[0].audio, EncoderInput::File(_)));
    assert_eq!(plans[0].length, SegmentLength::Fixed(6.0));
    assert!((artifact.duration_secs - 8.0).abs() < 1e-9);
    assert!(logs.contents().contains("Duration probe failed"));
}
