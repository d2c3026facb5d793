//! Progress reporting for a render run.
//!
//! The reporter is a one-way sink. It never lets the reported percentage
//! go backwards within a run, so callers may report coarse stage
//! boundaries and fine encoder progress in any interleaving.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Stages of a render run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    Preparing,
    Probing,
    Timeline,
    Rendering,
    Muxing,
    Complete,
}

impl RenderStage {
    /// Percentage range `[start, end]` this stage covers.
    pub fn span(self) -> (u8, u8) {
        match self {
            RenderStage::Preparing => (0, 5),
            RenderStage::Probing => (5, 15),
            RenderStage::Timeline => (15, 20),
            RenderStage::Rendering => (20, 90),
            RenderStage::Muxing => (90, 99),
            RenderStage::Complete => (100, 100),
        }
    }
}

/// A single progress update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub stage: RenderStage,
    /// Overall progress, 0-100.
    pub progress: u8,
    pub message: String,
    /// 1-based index of the scene being rendered.
    pub current_scene: Option<usize>,
    pub total_scenes: Option<usize>,
}

/// Progress callback for render runs.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Monotonic progress sink shared by every pipeline stage.
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last: AtomicU8,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: AtomicU8::new(0),
        }
    }

    /// A reporter that discards everything.
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Report the start of a stage.
    pub fn stage(&self, stage: RenderStage, message: impl Into<String>) {
        self.emit(stage, stage.span().0, message.into(), None, None);
    }

    /// Report progress within a stage. `fraction` is clamped to `[0, 1]`.
    pub fn within(
        &self,
        stage: RenderStage,
        fraction: f64,
        message: impl Into<String>,
        scene: Option<(usize, usize)>,
    ) {
        let (start, end) = stage.span();
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let progress = start as f64 + (end - start) as f64 * fraction;
        self.emit(
            stage,
            progress.floor() as u8,
            message.into(),
            scene.map(|(current, _)| current),
            scene.map(|(_, total)| total),
        );
    }

    /// Last reported percentage.
    pub fn last(&self) -> u8 {
        self.last.load(Ordering::Acquire)
    }

    fn emit(
        &self,
        stage: RenderStage,
        progress: u8,
        message: String,
        current_scene: Option<usize>,
        total_scenes: Option<usize>,
    ) {
        let progress = progress.min(100);
        let previous = self.last.fetch_max(progress, Ordering::AcqRel);
        let progress = progress.max(previous);

        tracing::trace!(?stage, progress, %message, "Progress");
        if let Some(cb) = &self.callback {
            cb(ProgressEvent {
                stage,
                progress,
                message,
                current_scene,
                total_scenes,
            });
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.callback.is_some())
            .field("last", &self.last())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording() -> (ProgressReporter, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::new(Some(Box::new(move |event: ProgressEvent| {
            sink.lock().unwrap().push(event);
        })));
        (reporter, events)
    }

    #[test]
    fn test_progress_never_decreases() {
        let (reporter, events) = recording();
        reporter.stage(RenderStage::Rendering, "scene 1");
        reporter.within(RenderStage::Rendering, 0.5, "scene 1", Some((1, 2)));
        reporter.stage(RenderStage::Probing, "late probe");

        let events = events.lock().unwrap();
        let values: Vec<u8> = events.iter().map(|e| e.progress).collect();
        assert_eq!(values, vec![20, 55, 55]);
        assert_eq!(events[1].current_scene, Some(1));
        assert_eq!(events[1].total_scenes, Some(2));
    }

    #[test]
    fn test_within_clamps_fraction() {
        let (reporter, events) = recording();
        reporter.within(RenderStage::Muxing, 7.0, "over", None);
        reporter.within(RenderStage::Muxing, f64::NAN, "nan", None);
        let events = events.lock().unwrap();
        assert_eq!(events[0].progress, 99);
        assert_eq!(events[1].progress, 99);
    }

    #[test]
    fn test_complete_reaches_hundred() {
        let reporter = ProgressReporter::silent();
        reporter.stage(RenderStage::Complete, "done");
        assert_eq!(reporter.last(), 100);
    }
}
