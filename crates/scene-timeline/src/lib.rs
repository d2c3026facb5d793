//! SceneReel Scene Timeline
//!
//! The pure, synchronous core of a render:
//! - **Resolver:** binds loosely-named assets to scene channels
//! - **Timeline:** places scenes on the audio-anchored timeline and
//!   distributes a shared cue track into scene-relative cues
//! - **Sync:** decides how each scene reconciles video and audio length
//!
//! Nothing here performs I/O. Durations are measured elsewhere and handed
//! in through [`timeline::SceneDurations`].

pub mod resolver;
pub mod sync;
pub mod timeline;

pub use resolver::*;
pub use sync::*;
pub use timeline::*;
