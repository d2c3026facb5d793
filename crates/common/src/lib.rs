//! SceneReel Common Utilities
//!
//! Shared infrastructure for all SceneReel crates:
//! - Error types and result aliases
//! - Stopwatch and throttling utilities for render progress
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
