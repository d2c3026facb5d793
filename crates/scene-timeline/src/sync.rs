//! Video/audio sync policy.
//!
//! When a scene's video outlasts its audio, the configured [`SyncMode`]
//! decides whether the video is cut at the audio length or sped up to fit
//! it. A video that is shorter than (or as long as) its audio is left
//! alone. Decisions are scene-local and pure.

use scenereel_project_model::SyncMode;
use serde::Serialize;

/// What the compositor does to the video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    None,
    Trim,
    Speed,
}

/// Per-scene playback decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SyncDecision {
    pub action: SyncAction,
    /// Video playback rate; always `>= 1.0`.
    pub playback_rate: f64,
    /// Seconds this scene occupies in the output.
    pub effective_duration_secs: f64,
}

impl SyncDecision {
    /// Decide how to reconcile video duration `video_secs` with audio
    /// duration `audio_secs`.
    pub fn decide(video_secs: f64, audio_secs: f64, mode: SyncMode) -> Self {
        let video_secs = video_secs.max(0.0);
        let audio_secs = audio_secs.max(0.0);

        if audio_secs <= 0.0 || video_secs <= audio_secs {
            return Self {
                action: SyncAction::None,
                playback_rate: 1.0,
                effective_duration_secs: video_secs,
            };
        }

        match mode {
            SyncMode::Speed => Self {
                action: SyncAction::Speed,
                playback_rate: video_secs / audio_secs,
                effective_duration_secs: audio_secs,
            },
            SyncMode::Trim => Self {
                action: SyncAction::Trim,
                playback_rate: 1.0,
                effective_duration_secs: audio_secs,
            },
        }
    }

    /// Source video seconds consumed to fill the effective duration.
    pub fn source_video_secs(&self) -> f64 {
        self.effective_duration_secs * self.playback_rate
    }
}
