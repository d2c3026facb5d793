//! [`MediaEngine`] backed by the `ffmpeg` and `ffprobe` command-line tools.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use scenereel_common::clock::{ProgressThrottle, Stopwatch};
use scenereel_common::config::EngineDefaults;
use scenereel_common::error::{ReelError, ReelResult};
use scenereel_project_model::OutputFormat;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::engine::{EncodeProgress, EngineInitializer, MediaEngine, VideoInfo};
use crate::segment::{EncodeSettings, EncoderInput, SegmentPlan};

/// Locates ffmpeg/ffprobe and checks they run.
#[derive(Debug, Clone)]
pub struct FfmpegInitializer {
    defaults: EngineDefaults,
}

impl FfmpegInitializer {
    pub fn new(defaults: EngineDefaults) -> Self {
        Self { defaults }
    }
}

#[async_trait]
impl EngineInitializer for FfmpegInitializer {
    async fn initialize(&self) -> ReelResult<Arc<dyn MediaEngine>> {
        for binary in [&self.defaults.ffmpeg_bin, &self.defaults.ffprobe_bin] {
            let version = tool_version(binary).await.ok_or_else(|| {
                ReelError::unsupported(format!("'{binary}' not found or not runnable"))
            })?;
            tracing::debug!(binary = %binary, %version, "Found media tool");
        }
        Ok(Arc::new(FfmpegEngine::new(self.defaults.clone())))
    }
}

/// First line of `<binary> -version`, if the binary runs.
pub async fn tool_version(binary: &str) -> Option<String> {
    let output = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
}

/// ffmpeg command-line engine.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegEngine {
    pub fn new(defaults: EngineDefaults) -> Self {
        Self {
            ffmpeg: defaults.ffmpeg_bin,
            ffprobe: defaults.ffprobe_bin,
        }
    }

    async fn ffprobe(&self, path: &Path, args: &[&str]) -> ReelResult<String> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error"])
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ReelError::encoder(format!("Failed to start ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ReelError::asset_probe(
                path.display().to_string(),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe_duration(&self, path: &Path) -> ReelResult<f64> {
        let raw = self
            .ffprobe(
                path,
                &["-show_entries", "format=duration", "-of", "default=nw=1:nk=1"],
            )
            .await?;
        parse_duration(&raw).ok_or_else(|| {
            ReelError::asset_probe(
                path.display().to_string(),
                format!("unreadable duration '{}'", raw.trim()),
            )
        })
    }

    async fn probe_video(&self, path: &Path) -> ReelResult<VideoInfo> {
        let raw = self
            .ffprobe(
                path,
                &[
                    "-select_streams",
                    "v:0",
                    "-show_entries",
                    "stream=width,height",
                    "-of",
                    "csv=p=0:s=x",
                ],
            )
            .await?;
        let (width, height) = parse_dimensions(&raw).ok_or_else(|| {
            ReelError::asset_probe(path.display().to_string(), "no video stream")
        })?;
        let duration_secs = self.probe_duration(path).await.unwrap_or(0.0);
        Ok(VideoInfo {
            width,
            height,
            duration_secs,
        })
    }

    async fn decode_audio(&self, path: &Path) -> ReelResult<()> {
        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-map", "0:a:0", "-f", "null", "-"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ReelError::encoder(format!("Failed to start ffmpeg: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() || !stderr.trim().is_empty() {
            return Err(ReelError::asset_probe(
                path.display().to_string(),
                format!("audio decode failed: {}", stderr.trim()),
            ));
        }
        Ok(())
    }

    async fn encode_segment(
        &self,
        plan: &SegmentPlan,
        progress: EncodeProgress<'_>,
    ) -> ReelResult<()> {
        let args = encode_args(plan);
        tracing::debug!(scene_id = plan.scene_id, args = ?args, "Running ffmpeg");
        let expected_secs = plan.length.secs().unwrap_or(0.0);
        run_with_progress(&self.ffmpeg, &args, expected_secs, progress).await
    }

    async fn concat(&self, segments: &[PathBuf], output: &Path) -> ReelResult<()> {
        let manifest = output.with_extension("concat.txt");
        tokio::fs::write(&manifest, concat_manifest(segments)).await?;

        let args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-nostats".into(),
            "-progress".into(),
            "pipe:1".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            manifest.display().to_string(),
            "-c".into(),
            "copy".into(),
            output.display().to_string(),
        ];
        tracing::debug!(segments = segments.len(), args = ?args, "Joining segments");
        run_with_progress(&self.ffmpeg, &args, 0.0, &|_: f64| {}).await
    }
}

/// Full ffmpeg argument list for one segment.
pub fn encode_args(plan: &SegmentPlan) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostats".into(),
        "-progress".into(),
        "pipe:1".into(),
        "-i".into(),
        plan.video.display().to_string(),
    ];

    match &plan.audio {
        EncoderInput::File(path) => {
            args.push("-i".into());
            args.push(path.display().to_string());
        }
        EncoderInput::Silence => {
            args.extend([
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                format!(
                    "anullsrc=r={}:cl=stereo",
                    plan.encode.audio_sample_rate.max(8000)
                ),
            ]);
        }
    }

    args.extend([
        "-filter_complex".into(),
        plan.filter_graph.clone(),
        "-map".into(),
        "[vout]".into(),
        "-map".into(),
        "[aout]".into(),
        "-r".into(),
        plan.encode.fps.max(1).to_string(),
    ]);
    match plan.length.secs() {
        Some(secs) => args.extend(["-t".into(), format!("{secs:.6}")]),
        // The audio chain is padded forever; the video stream decides the end.
        None => args.push("-shortest".into()),
    }
    args.extend(codec_args(&plan.encode));
    args.push(plan.output.display().to_string());
    args
}

fn codec_args(encode: &EncodeSettings) -> Vec<String> {
    let video_bitrate = format!("{}k", encode.video_bitrate_kbps.max(1000));
    let audio_bitrate = format!("{}k", encode.audio_bitrate_kbps.max(64));
    let sample_rate = encode.audio_sample_rate.max(8000).to_string();

    let mut args: Vec<String> = match encode.format {
        OutputFormat::Mp4H264 => vec![
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "medium".into(),
            "-profile:v".into(),
            "high".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-b:v".into(),
            video_bitrate,
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            audio_bitrate,
        ],
        OutputFormat::Mp4H265 => vec![
            "-c:v".into(),
            "libx265".into(),
            "-preset".into(),
            "medium".into(),
            "-tag:v".into(),
            "hvc1".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-b:v".into(),
            video_bitrate,
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            audio_bitrate,
        ],
        OutputFormat::Webm => vec![
            "-c:v".into(),
            "libvpx-vp9".into(),
            "-b:v".into(),
            video_bitrate,
            "-c:a".into(),
            "libopus".into(),
            "-b:a".into(),
            audio_bitrate,
        ],
    };
    args.extend(["-ar".into(), sample_rate, "-ac".into(), "2".into()]);
    if encode.format != OutputFormat::Webm {
        args.extend(["-movflags".into(), "+faststart".into()]);
    }
    args
}

/// Concat demuxer manifest listing `segments` in order.
pub fn concat_manifest(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|path| {
            let path = path.to_string_lossy().replace('\'', "'\\''");
            format!("file '{path}'\n")
        })
        .collect()
}

/// Upper bound on encoder progress callbacks per second.
const PROGRESS_HZ: u32 = 10;

/// Run ffmpeg, forwarding `-progress pipe:1` output as a completed fraction
/// of `expected_secs`.
async fn run_with_progress(
    ffmpeg: &str,
    args: &[String],
    expected_secs: f64,
    progress: EncodeProgress<'_>,
) -> ReelResult<()> {
    let mut child = Command::new(ffmpeg)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ReelError::encoder(format!("Failed to start ffmpeg: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ReelError::encoder("Failed to capture ffmpeg stdout"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| ReelError::encoder("Failed to capture ffmpeg stderr"))?;

    // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
    let stderr_task = tokio::spawn(async move {
        let mut output = String::new();
        match stderr.read_to_string(&mut output).await {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    });

    let mut lines = BufReader::new(stdout).lines();
    let mut state = ProgressState::default();
    let stopwatch = Stopwatch::start();
    let mut throttle = ProgressThrottle::new(PROGRESS_HZ);
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ReelError::encoder(format!("Failed reading ffmpeg progress: {e}")))?
    {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        state.update(key, value);
        if key == "progress" && (state.complete || throttle.should_tick(stopwatch.elapsed_ms())) {
            progress(state.fraction(expected_secs));
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| ReelError::encoder(format!("Failed to wait on ffmpeg: {e}")))?;
    let stderr_output = stderr_task
        .await
        .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

    if !status.success() {
        return Err(ReelError::encoder(format!(
            "ffmpeg failed (status {status}): {}",
            stderr_output.trim()
        )));
    }
    progress(1.0);
    Ok(())
}

/// Parsed `-progress` key/value stream.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProgressState {
    pub out_time_secs: f64,
    pub complete: bool,
}

impl ProgressState {
    pub fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.trim().parse::<u64>() {
                    self.out_time_secs = Stopwatch::us_to_secs(us);
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }

    pub fn fraction(&self, expected_secs: f64) -> f64 {
        if self.complete {
            return 1.0;
        }
        if expected_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_secs).clamp(0.0, 1.0)
    }
}

fn parse_duration(raw: &str) -> Option<f64> {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

fn parse_dimensions(raw: &str) -> Option<(u32, u32)> {
    let line = raw.lines().next()?.trim();
    let (w, h) = line.split_once('x')?;
    let width = w.trim().parse::<u32>().ok()?;
    let height = h.trim().trim_end_matches('x').parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}
