//! Render a scene project to a single video file.

use std::io::Write;
use std::path::PathBuf;

use scenereel_common::clock::Stopwatch;
use scenereel_common::config::AppConfig;
use scenereel_project_model::JsonCueDecoder;
use scenereel_render_engine::{render_project, EngineContext, ProgressCallback, ProgressEvent};

use super::project::ProjectArgs;

pub async fn run(project: ProjectArgs, output: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Rendering project at: {}", project.assets.display());

    let request = project.load()?;
    let config = AppConfig::load();
    let ctx = EngineContext::ffmpeg(config.engine);

    let (width, height) = request.settings.resolution.dimensions();
    println!("  Scenes: {}", request.scenes.len());
    println!("  Resolution: {width}x{height}");
    println!("  Sync mode: {:?}", request.settings.sync_mode);
    println!("  Format: {:?}", request.settings.format);

    let stopwatch = Stopwatch::start();
    let progress_cb: ProgressCallback = Box::new(move |event: ProgressEvent| {
        let scene = match (event.current_scene, event.total_scenes) {
            (Some(current), Some(total)) => format!(" [scene {current}/{total}]"),
            _ => String::new(),
        };
        let eta = stopwatch.eta_secs(f64::from(event.progress) / 100.0);
        print!(
            "\r  {:>3}% {}{} (ETA: {:.0}s)  ",
            event.progress, event.message, scene, eta
        );
        std::io::stdout().flush().ok();
    });

    let artifact = render_project(&ctx, &request, &JsonCueDecoder, Some(progress_cb))
        .await
        .map_err(|e| anyhow::anyhow!("\nRender failed ({}): {e}", e.kind()))?;

    let output_path =
        output.unwrap_or_else(|| PathBuf::from(format!("output.{}", artifact.extension)));
    artifact.write_to(&output_path)?;

    println!();
    println!(
        "Render complete: {} ({:.1}s, {} scenes, {} bytes)",
        output_path.display(),
        artifact.duration_secs,
        artifact.scenes.len(),
        artifact.bytes.len()
    );
    Ok(())
}
