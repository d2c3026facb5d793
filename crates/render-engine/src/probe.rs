//! Duration probing for resolved scenes.
//!
//! Every video and audio channel is probed independently and concurrently.
//! A failed probe is logged and recorded as zero seconds; it never aborts
//! the run.

use std::sync::Arc;

use futures_util::future::join_all;
use scenereel_common::error::{ReelError, ReelResult};
use scenereel_project_model::{Asset, Channel};
use scenereel_scene_timeline::{ProbedScene, ResolvedScene, SceneDurations};

use crate::engine::MediaEngine;
use crate::workspace::WorkDir;

/// Probe one bound asset. Errors come back as [`ReelError::AssetProbe`].
pub async fn probe_asset(
    engine: &dyn MediaEngine,
    work: &WorkDir,
    asset: &Asset,
) -> ReelResult<f64> {
    let path = work
        .stage(asset)
        .map_err(|e| ReelError::asset_probe(asset.path(), e.to_string()))?;
    let secs = engine
        .probe_duration(&path)
        .await
        .map_err(|e| ReelError::asset_probe(asset.path(), e.to_string()))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(ReelError::asset_probe(
            asset.path(),
            format!("reported invalid duration {secs}"),
        ));
    }
    Ok(secs)
}

async fn probe_channel(
    engine: &dyn MediaEngine,
    work: &WorkDir,
    scene: &ResolvedScene,
    channel: Channel,
) -> f64 {
    let Some(asset) = scene.asset(channel) else {
        return 0.0;
    };
    match probe_asset(engine, work, asset).await {
        Ok(secs) => {
            tracing::debug!(
                scene_id = scene.id,
                %channel,
                asset = asset.path(),
                duration_secs = secs,
                "Probed duration"
            );
            secs
        }
        Err(e) => {
            tracing::warn!(
                scene_id = scene.id,
                %channel,
                error = %e,
                "Duration probe failed, treating as 0s"
            );
            0.0
        }
    }
}

/// Measure video and audio durations of every scene.
///
/// Output order matches input order.
pub async fn probe_scenes(
    engine: Arc<dyn MediaEngine>,
    work: &WorkDir,
    scenes: Vec<ResolvedScene>,
) -> Vec<ProbedScene> {
    let engine = engine.as_ref();
    let durations = join_all(scenes.iter().map(|scene| async move {
        let (video, audio) = futures_util::join!(
            probe_channel(engine, work, scene, Channel::Video),
            probe_channel(engine, work, scene, Channel::Audio),
        );
        SceneDurations::new(video, audio)
    }))
    .await;

    scenes
        .into_iter()
        .zip(durations)
        .map(|(scene, durations)| ProbedScene::new(scene, durations))
        .collect()
}
