//! Media engine abstraction and its lazily initialized, shared handle.
//!
//! Every probe, decode and encode in a run goes through one
//! [`MediaEngine`]. The engine is expensive to bring up (binary discovery,
//! capability checks), so [`EngineContext`] initializes it on first use and
//! hands the same instance to every later caller. Callers that arrive while
//! initialization is in flight wait for it instead of starting another.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use scenereel_common::config::EngineDefaults;
use scenereel_common::error::ReelResult;
use tokio::sync::OnceCell;

use crate::segment::SegmentPlan;

/// Video stream metadata, read without decoding frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
}

/// Fraction of the current encode that is done, in `[0, 1]`.
pub type EncodeProgress<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Backend that probes, decodes, encodes and joins media files.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Playable duration in seconds, from container metadata only.
    async fn probe_duration(&self, path: &Path) -> ReelResult<f64>;

    /// Video stream dimensions and duration.
    async fn probe_video(&self, path: &Path) -> ReelResult<VideoInfo>;

    /// Decode the first audio stream end to end. Succeeds only if the whole
    /// stream is decodable.
    async fn decode_audio(&self, path: &Path) -> ReelResult<()>;

    /// Encode one scene segment to `plan.output`.
    async fn encode_segment(&self, plan: &SegmentPlan, progress: EncodeProgress<'_>)
        -> ReelResult<()>;

    /// Join already encoded segments into `output` without re-encoding.
    async fn concat(&self, segments: &[PathBuf], output: &Path) -> ReelResult<()>;
}

/// One-time setup for a [`MediaEngine`].
#[async_trait]
pub trait EngineInitializer: Send + Sync {
    async fn initialize(&self) -> ReelResult<Arc<dyn MediaEngine>>;
}

/// Initialization state of an [`EngineContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Explicitly owned handle to the shared media engine.
pub struct EngineContext {
    initializer: Box<dyn EngineInitializer>,
    cell: OnceCell<Arc<dyn MediaEngine>>,
    initializing: AtomicBool,
    defaults: EngineDefaults,
}

impl EngineContext {
    pub fn new(initializer: Box<dyn EngineInitializer>, defaults: EngineDefaults) -> Self {
        Self {
            initializer,
            cell: OnceCell::new(),
            initializing: AtomicBool::new(false),
            defaults,
        }
    }

    /// Context backed by the ffmpeg command-line tools.
    pub fn ffmpeg(defaults: EngineDefaults) -> Self {
        let initializer = crate::ffmpeg::FfmpegInitializer::new(defaults.clone());
        Self::new(Box::new(initializer), defaults)
    }

    /// Engine defaults this context was built with.
    pub fn defaults(&self) -> &EngineDefaults {
        &self.defaults
    }

    pub fn state(&self) -> EngineState {
        if self.cell.initialized() {
            EngineState::Ready
        } else if self.initializing.load(Ordering::Acquire) {
            EngineState::Initializing
        } else {
            EngineState::Uninitialized
        }
    }

    /// The shared engine, initializing it on first call.
    ///
    /// A failed or cancelled initialization leaves the context
    /// uninitialized; the next call retries.
    pub async fn engine(&self) -> ReelResult<Arc<dyn MediaEngine>> {
        let engine = self
            .cell
            .get_or_try_init(|| async {
                let _flag = InitFlag::raise(&self.initializing);
                tracing::debug!("Initializing media engine");
                let result = self.initializer.initialize().await;
                match &result {
                    Ok(engine) => tracing::info!(engine = engine.name(), "Media engine ready"),
                    Err(e) => tracing::error!(error = %e, "Media engine initialization failed"),
                }
                result
            })
            .await?;
        Ok(engine.clone())
    }
}

/// Holds the in-flight flag up until dropped, so a caller that abandons
/// the init future does not leave the context stuck in `Initializing`.
struct InitFlag<'a>(&'a AtomicBool);

impl<'a> InitFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for InitFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("state", &self.state())
            .field("defaults", &self.defaults)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenereel_common::error::ReelError;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct NullEngine;

    #[async_trait]
    impl MediaEngine for NullEngine {
        fn name(&self) -> &str {
            "null"
        }
        async fn probe_duration(&self, _path: &Path) -> ReelResult<f64> {
            Ok(0.0)
        }
        async fn probe_video(&self, _path: &Path) -> ReelResult<VideoInfo> {
            Err(ReelError::unsupported("null engine"))
        }
        async fn decode_audio(&self, _path: &Path) -> ReelResult<()> {
            Ok(())
        }
        async fn encode_segment(
            &self,
            _plan: &SegmentPlan,
            _progress: EncodeProgress<'_>,
        ) -> ReelResult<()> {
            Ok(())
        }
        async fn concat(&self, _segments: &[PathBuf], _output: &Path) -> ReelResult<()> {
            Ok(())
        }
    }

    struct CountingInit {
        calls: Arc<AtomicUsize>,
        fail_first: bool,
    }

    #[async_trait]
    impl EngineInitializer for CountingInit {
        async fn initialize(&self) -> ReelResult<Arc<dyn MediaEngine>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_first && call == 0 {
                return Err(ReelError::encoder("not yet"));
            }
            Ok(Arc::new(NullEngine))
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_initialization() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = Arc::new(EngineContext::new(
            Box::new(CountingInit {
                calls: calls.clone(),
                fail_first: false,
            }),
            EngineDefaults::default(),
        ));
        assert_eq!(ctx.state(), EngineState::Uninitialized);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = ctx.clone();
                tokio::spawn(async move { ctx.engine().await.map(|e| e.name().to_string()) })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "null");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.state(), EngineState::Ready);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = EngineContext::new(
            Box::new(CountingInit {
                calls: calls.clone(),
                fail_first: true,
            }),
            EngineDefaults::default(),
        );

        assert!(ctx.engine().await.is_err());
        assert_eq!(ctx.state(), EngineState::Uninitialized);
        assert!(ctx.engine().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct HangFirstInit {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EngineInitializer for HangFirstInit {
        async fn initialize(&self) -> ReelResult<Arc<dyn MediaEngine>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            Ok(Arc::new(NullEngine))
        }
    }

    #[tokio::test]
    async fn test_abandoned_initialization_resets_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = EngineContext::new(
            Box::new(HangFirstInit {
                calls: calls.clone(),
            }),
            EngineDefaults::default(),
        );

        let mut pending = Box::pin(ctx.engine());
        tokio::select! {
            _ = pending.as_mut() => panic!("first initialization should hang"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
        assert_eq!(ctx.state(), EngineState::Initializing);

        drop(pending);
        assert_eq!(ctx.state(), EngineState::Uninitialized);

        let engine = ctx.engine().await.unwrap();
        assert_eq!(engine.name(), "null");
        assert_eq!(ctx.state(), EngineState::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
