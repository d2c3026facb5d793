//! Show how a project resolves, without encoding anything.

use serde::Serialize;

use scenereel_common::config::AppConfig;
use scenereel_project_model::{Channel, JsonCueDecoder};
use scenereel_render_engine::{inspect_project, CueSource, EngineContext, ProjectPlan};
use scenereel_scene_timeline::SyncDecision;

use super::project::ProjectArgs;

#[derive(Debug, Serialize)]
struct SceneReport {
    id: u32,
    video: Option<String>,
    audio: Option<String>,
    subtitle: Option<String>,
    video_secs: f64,
    audio_secs: f64,
    window: (f64, f64),
    cues: usize,
    decision: SyncDecision,
    rendered: bool,
}

#[derive(Debug, Serialize)]
struct PlanReport {
    resolution: String,
    cue_source: String,
    timeline_secs: f64,
    output_secs: f64,
    dropped_cues: usize,
    scenes: Vec<SceneReport>,
}

impl PlanReport {
    fn new(plan: &ProjectPlan, resolution: String) -> Self {
        let scenes = plan
            .scenes
            .iter()
            .map(|scene| {
                let path = |channel| scene.asset(channel).map(|a| a.path().to_string());
                let durations = scene.scene.durations();
                SceneReport {
                    id: scene.id(),
                    video: path(Channel::Video),
                    audio: path(Channel::Audio),
                    subtitle: path(Channel::Subtitle),
                    video_secs: durations.video_secs(),
                    audio_secs: durations.audio_secs(),
                    window: (scene.scene.window.start, scene.scene.window.end),
                    cues: scene.scene.cues.len(),
                    decision: scene.decision,
                    rendered: scene.is_renderable(),
                }
            })
            .collect();

        Self {
            resolution,
            cue_source: describe_cue_source(&plan.cue_source),
            timeline_secs: plan.timeline_secs,
            output_secs: plan.output_secs(),
            dropped_cues: plan.dropped_cues,
            scenes,
        }
    }
}

fn describe_cue_source(source: &CueSource) -> String {
    match source {
        CueSource::None => "none".to_string(),
        CueSource::Caller => "command line".to_string(),
        CueSource::PerScene => "per-scene subtitle assets".to_string(),
        CueSource::PoolAsset(path) => format!("shared track {path}"),
    }
}

pub async fn run(project: ProjectArgs, json: bool) -> anyhow::Result<()> {
    let request = project.load()?;
    let config = AppConfig::load();
    let ctx = EngineContext::ffmpeg(config.engine);

    let plan = inspect_project(&ctx, &request, &JsonCueDecoder)
        .await
        .map_err(|e| anyhow::anyhow!("Inspect failed ({}): {e}", e.kind()))?;
    let report = PlanReport::new(&plan, request.settings.resolution.to_string());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Project: {}", project.assets.display());
    println!("  Resolution: {}", report.resolution);
    println!("  Cues: {}", report.cue_source);
    println!("  Timeline: {:.2}s", report.timeline_secs);
    println!("  Output: {:.2}s", report.output_secs);
    if report.dropped_cues > 0 {
        println!("  Dropped cues: {}", report.dropped_cues);
    }
    println!();

    println!("Scenes:");
    for scene in &report.scenes {
        let marker = if scene.rendered { "" } else { " (skipped: no video)" };
        println!("  Scene {}{marker}", scene.id);
        println!(
            "    video: {} ({:.2}s)",
            scene.video.as_deref().unwrap_or("-"),
            scene.video_secs
        );
        println!(
            "    audio: {} ({:.2}s)",
            scene.audio.as_deref().unwrap_or("-"),
            scene.audio_secs
        );
        if let Some(subtitle) = &scene.subtitle {
            println!("    subtitle: {subtitle}");
        }
        println!(
            "    window: {:.2}s - {:.2}s, {} cues",
            scene.window.0, scene.window.1, scene.cues
        );
        println!(
            "    sync: {:?} x{:.3} -> {:.2}s",
            scene.decision.action,
            scene.decision.playback_rate,
            scene.decision.effective_duration_secs
        );
    }

    Ok(())
}
