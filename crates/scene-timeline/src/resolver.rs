//! Asset resolution: map scene references to concrete assets.
//!
//! Per channel, first match wins:
//! 1. Exact file name (case-insensitive)
//! 2. File name without extension
//! 3. Substring containment in either direction
//! 4. Positional patterns on the scene id, used when no reference is
//!    declared or nothing above matched
//!
//! An unmatched channel is a valid outcome. Assets are not claimed: two
//! scenes may resolve to the same file.

use regex::Regex;
use scenereel_project_model::{Asset, AssetPool, Channel, SceneSpec};

/// How a channel binding was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Stem,
    Substring,
    Positional,
}

/// A scene after resolution: bound assets per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedScene {
    pub id: u32,
    pub video: Option<Asset>,
    pub audio: Option<Asset>,
    pub subtitle: Option<Asset>,
}

impl ResolvedScene {
    pub fn empty(id: u32) -> Self {
        Self {
            id,
            video: None,
            audio: None,
            subtitle: None,
        }
    }

    pub fn asset(&self, channel: Channel) -> Option<&Asset> {
        match channel {
            Channel::Video => self.video.as_ref(),
            Channel::Audio => self.audio.as_ref(),
            Channel::Subtitle => self.subtitle.as_ref(),
        }
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut Option<Asset> {
        match channel {
            Channel::Video => &mut self.video,
            Channel::Audio => &mut self.audio,
            Channel::Subtitle => &mut self.subtitle,
        }
    }

    /// Whether no channel was bound.
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none() && self.subtitle.is_none()
    }
}

/// Resolves scene specs against a borrowed asset pool.
#[derive(Debug, Clone, Copy)]
pub struct AssetResolver<'a> {
    pool: &'a AssetPool,
}

impl<'a> AssetResolver<'a> {
    pub fn new(pool: &'a AssetPool) -> Self {
        Self { pool }
    }

    /// Resolve all three channels of one scene.
    pub fn resolve(&self, spec: &SceneSpec) -> ResolvedScene {
        let mut scene = ResolvedScene::empty(spec.id);
        for channel in Channel::ALL {
            match self.resolve_channel(spec, channel) {
                Some((asset, kind)) => {
                    tracing::debug!(
                        scene_id = spec.id,
                        %channel,
                        asset = asset.path(),
                        match_kind = ?kind,
                        "Bound asset"
                    );
                    *scene.slot_mut(channel) = Some(asset.clone());
                }
                None => {
                    tracing::debug!(scene_id = spec.id, %channel, "No asset for channel");
                }
            }
        }
        scene
    }

    /// Resolve every scene, preserving document order.
    pub fn resolve_all(&self, specs: &[SceneSpec]) -> Vec<ResolvedScene> {
        specs.iter().map(|spec| self.resolve(spec)).collect()
    }

    /// Resolve a single channel, reporting which rule matched.
    pub fn resolve_channel(
        &self,
        spec: &SceneSpec,
        channel: Channel,
    ) -> Option<(&'a Asset, MatchKind)> {
        let candidates = self.pool.candidates(channel);
        if candidates.is_empty() {
            return None;
        }

        if let Some(reference) = spec.reference(channel) {
            if let Some(hit) = match_reference(candidates, reference) {
                return Some(hit);
            }
            tracing::debug!(
                scene_id = spec.id,
                %channel,
                reference,
                "Reference did not match, trying positional patterns"
            );
        }

        match_positional(candidates, spec.id).map(|asset| (asset, MatchKind::Positional))
    }
}

fn match_reference<'a>(candidates: &'a [Asset], reference: &str) -> Option<(&'a Asset, MatchKind)> {
    let wanted = reference.to_lowercase();

    if let Some(asset) = candidates
        .iter()
        .find(|a| a.file_name().to_lowercase() == wanted)
    {
        return Some((asset, MatchKind::Exact));
    }

    if let Some(asset) = candidates.iter().find(|a| a.stem().to_lowercase() == wanted) {
        return Some((asset, MatchKind::Stem));
    }

    candidates
        .iter()
        .find(|a| {
            let stem = a.stem().to_lowercase();
            !stem.is_empty() && (wanted.contains(&stem) || stem.contains(&wanted))
        })
        .map(|asset| (asset, MatchKind::Substring))
}

/// Filename patterns tying an asset to a scene id, highest priority first.
///
/// `scene<sep>?<id>` must not be followed by another digit, so `scene_2`
/// never claims scene 20 or 12.
pub fn positional_patterns(id: u32) -> Vec<Regex> {
    [
        format!(r"(?i)scene[_\-\s]?{id}(?:[^0-9]|$)"),
        format!(r"(?i)^{id}[_\-\s]"),
        format!(r"(?i)[_\-\s]{id}[_\-\s]"),
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
}

fn match_positional(candidates: &[Asset], id: u32) -> Option<&Asset> {
    positional_patterns(id).iter().find_map(|pattern| {
        candidates
            .iter()
            .find(|asset| pattern.is_match(asset.file_name()))
    })
}
