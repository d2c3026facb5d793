//! SceneReel Render Engine
//!
//! Turns a resolved, timed scene list into one encoded video. Scenes are
//! rendered strictly one after another through a shared media engine and
//! joined without re-encoding.
//!
//! # Pipeline Architecture
//!
//! ```text
//! asset pool ──┐
//!              ├── Resolve (per-scene channel binding)
//! scenes.json ─┘         │
//!                        ├── Probe durations (concurrent, failures → 0s)
//!                        │         │
//! shared cues ───────────┴─────────├── Timeline (audio-anchored cue windows)
//!                                  │         │
//!                                  │         ├── Sync decision (none/trim/speed)
//!                                  │         │         │
//!                                  ▼         ▼         ▼
//!                            Composite scene N: letterbox + subtitle plates
//!                                            │
//!                                            ▼
//!                                 Encode segment (ffmpeg)
//!                                            │
//!                                            ▼
//!                               Multiplex (stream-copy concat)
//!                                            │
//!                                            ▼
//!                                       output.mp4
//! ```

pub mod compositor;
pub mod engine;
pub mod ffmpeg;
pub mod mux;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod segment;
pub mod workspace;

pub use engine::{EngineContext, EngineInitializer, EngineState, MediaEngine, VideoInfo};
pub use mux::RenderedArtifact;
pub use pipeline::*;
pub use progress::*;
