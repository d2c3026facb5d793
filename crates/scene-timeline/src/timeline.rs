//! Audio-anchored scene timeline and cue distribution.
//!
//! Scenes are laid end to end in document order. Each scene occupies the
//! half-open window `[cursor, cursor + d)` where `d` is its audio duration,
//! or its video duration when it has no audio. A shared cue belongs to the
//! scene whose window contains its start time and is shifted to
//! scene-relative time. Cues past the last window are dropped.
//!
//! Subtitles follow spoken timing, so the audio duration is the anchor even
//! when the video runs longer or shorter.

use scenereel_project_model::Cue;

use crate::resolver::ResolvedScene;

/// Measured durations for one scene. Fixed once probing is done.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SceneDurations {
    video_secs: f64,
    audio_secs: f64,
}

impl SceneDurations {
    /// Negative or non-finite measurements are stored as zero.
    pub fn new(video_secs: f64, audio_secs: f64) -> Self {
        Self {
            video_secs: sanitize(video_secs),
            audio_secs: sanitize(audio_secs),
        }
    }

    pub fn video_secs(&self) -> f64 {
        self.video_secs
    }

    pub fn audio_secs(&self) -> f64 {
        self.audio_secs
    }

    /// Length the scene claims on the cue timeline.
    pub fn anchor_secs(&self) -> f64 {
        if self.audio_secs > 0.0 {
            self.audio_secs
        } else {
            self.video_secs
        }
    }
}

fn sanitize(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 {
        secs
    } else {
        0.0
    }
}

/// A resolved scene whose durations have been measured.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedScene {
    pub scene: ResolvedScene,
    pub durations: SceneDurations,
}

impl ProbedScene {
    pub fn new(scene: ResolvedScene, durations: SceneDurations) -> Self {
        Self { scene, durations }
    }

    pub fn id(&self) -> u32 {
        self.scene.id
    }
}

/// Where cues come from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CueInput {
    /// No subtitles for this project.
    #[default]
    None,
    /// One absolute-time track spanning the whole project.
    Shared(Vec<Cue>),
    /// Cues already scoped to each scene, in scene order.
    PerScene(Vec<Vec<Cue>>),
}

/// Half-open span `[start, end)` of a scene on the audio timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueWindow {
    pub start: f64,
    pub end: f64,
}

impl CueWindow {
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A scene placed on the timeline with its scene-relative cues.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineScene {
    pub probed: ProbedScene,
    pub window: CueWindow,
    pub cues: Vec<Cue>,
}

impl TimelineScene {
    pub fn id(&self) -> u32 {
        self.probed.id()
    }

    pub fn durations(&self) -> SceneDurations {
        self.probed.durations
    }
}

/// The finished timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub scenes: Vec<TimelineScene>,
    /// Final cursor value: sum of all anchor durations.
    pub total_secs: f64,
    /// Shared cues no window could claim.
    pub dropped_cues: usize,
}

/// Builds a [`Timeline`] in a single forward pass over the scenes.
#[derive(Debug, Default)]
pub struct TimelineBuilder;

impl TimelineBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Place scenes in the given order and attach cues.
    ///
    /// Invalid cues (`start >= end` or non-finite) are discarded up front in
    /// both modes.
    pub fn build(&self, scenes: Vec<ProbedScene>, cues: CueInput) -> Timeline {
        let windows = place_windows(&scenes);
        let total_secs = windows.last().map(|w| w.end).unwrap_or(0.0);

        let (per_scene, dropped_cues) = match cues {
            CueInput::None => (vec![Vec::new(); scenes.len()], 0),
            CueInput::Shared(cues) => distribute_shared(&windows, cues),
            CueInput::PerScene(mut lists) => {
                if lists.len() != scenes.len() {
                    tracing::warn!(
                        scenes = scenes.len(),
                        cue_lists = lists.len(),
                        "Per-scene cue lists do not match scene count"
                    );
                }
                lists.resize_with(scenes.len(), Vec::new);
                let lists = lists
                    .into_iter()
                    .map(|list| list.into_iter().filter(Cue::is_valid).collect())
                    .collect();
                (lists, 0)
            }
        };

        if dropped_cues > 0 {
            tracing::info!(
                dropped_cues,
                total_secs,
                "Cues starting past the end of the timeline were dropped"
            );
        }

        let scenes = scenes
            .into_iter()
            .zip(windows)
            .zip(per_scene)
            .map(|((probed, window), cues)| {
                tracing::debug!(
                    scene_id = probed.id(),
                    window_start = window.start,
                    window_end = window.end,
                    cues = cues.len(),
                    "Scene placed on timeline"
                );
                TimelineScene {
                    probed,
                    window,
                    cues,
                }
            })
            .collect();

        Timeline {
            scenes,
            total_secs,
            dropped_cues,
        }
    }
}

/// Advance the cursor once per scene, in order.
///
/// A zero-length scene gets an empty window at the current cursor and
/// leaves the cursor where it was.
fn place_windows(scenes: &[ProbedScene]) -> Vec<CueWindow> {
    let mut cursor = 0.0;
    scenes
        .iter()
        .map(|scene| {
            let start = cursor;
            cursor += scene.durations.anchor_secs();
            CueWindow { start, end: cursor }
        })
        .collect()
}

/// Assign each shared cue to the window holding its start time.
///
/// Windows are sorted and disjoint, so each cue is located by binary
/// search; buckets keep the source order of their cues.
fn distribute_shared(windows: &[CueWindow], cues: Vec<Cue>) -> (Vec<Vec<Cue>>, usize) {
    let mut buckets: Vec<Vec<Cue>> = vec![Vec::new(); windows.len()];
    let mut dropped = 0usize;

    for cue in cues.into_iter().filter(Cue::is_valid) {
        match window_index(windows, cue.start_time) {
            Some(index) => {
                let offset = windows[index].start;
                buckets[index].push(cue.shifted(-offset));
            }
            None => dropped += 1,
        }
    }

    (buckets, dropped)
}

fn window_index(windows: &[CueWindow], t: f64) -> Option<usize> {
    // First window whose end lies beyond t; empty windows are skipped by
    // the containment check.
    let index = windows.partition_point(|w| w.end <= t);
    windows[index..]
        .iter()
        .position(|w| !w.is_empty())
        .map(|skip| index + skip)
        .filter(|&i| windows[i].contains(t))
}

/// Shift scene-relative cues by a uniform offset for rendering.
///
/// Cues pushed entirely before zero are removed; starts are clamped to zero.
pub fn offset_cues(cues: &[Cue], offset_secs: f64) -> Vec<Cue> {
    if offset_secs == 0.0 || !offset_secs.is_finite() {
        return cues.to_vec();
    }
    cues.iter()
        .map(|cue| cue.shifted(offset_secs))
        .filter(|cue| cue.end_time > 0.0)
        .map(|mut cue| {
            cue.start_time = cue.start_time.max(0.0);
            cue
        })
        .filter(Cue::is_valid)
        .collect()
}
