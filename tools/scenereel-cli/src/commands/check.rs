//! Check that the external media tools are available.

use scenereel_common::config::{config_file_path, AppConfig};
use scenereel_render_engine::ffmpeg::tool_version;

pub async fn run(init_config: bool) -> anyhow::Result<()> {
    println!("SceneReel System Check");
    println!("{}", "=".repeat(50));

    let config = AppConfig::load();
    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else if init_config {
        config.save()?;
        println!("[OK] Config: wrote defaults to {}", path.display());
    } else {
        println!("[--] Config: defaults ({} not found)", path.display());
    }

    let mut all_ok = true;
    for binary in [&config.engine.ffmpeg_bin, &config.engine.ffprobe_bin] {
        match tool_version(binary).await {
            Some(version) => println!("[OK] {binary}: {version}"),
            None => {
                all_ok = false;
                println!("[FAIL] {binary}: not found or not runnable");
            }
        }
    }

    println!(
        "     Output: {} fps, video {} kbps, audio {} kbps @ {} Hz",
        config.engine.fps,
        config.engine.video_bitrate_kbps,
        config.engine.audio_bitrate_kbps,
        config.engine.audio_sample_rate
    );

    println!();
    if all_ok {
        println!("All required tools are available. SceneReel is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg or set engine paths in the config.");
    }

    Ok(())
}
