//! Scene document: the declarative, ordered list of scenes.
//!
//! ```json
//! {
//!   "scenes": [
//!     { "id": 1, "video": "intro.mp4", "audio": "intro voice", "subtitle": "intro" },
//!     { "video": "clip_scene_2.mp4" }
//!   ],
//!   "settings": { "sync_mode": "speed" }
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::asset::Channel;
use crate::settings::RenderSettings;
use crate::ModelError;

/// One declared scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSpec {
    /// Positive scene identifier.
    pub id: u32,
    /// Free-text video reference.
    pub video_ref: Option<String>,
    /// Free-text audio reference.
    pub audio_ref: Option<String>,
    /// Free-text subtitle reference.
    pub subtitle_ref: Option<String>,
}

impl SceneSpec {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            video_ref: None,
            audio_ref: None,
            subtitle_ref: None,
        }
    }

    pub fn with_video(mut self, reference: impl Into<String>) -> Self {
        self.video_ref = Some(reference.into());
        self
    }

    pub fn with_audio(mut self, reference: impl Into<String>) -> Self {
        self.audio_ref = Some(reference.into());
        self
    }

    pub fn with_subtitle(mut self, reference: impl Into<String>) -> Self {
        self.subtitle_ref = Some(reference.into());
        self
    }

    /// The non-blank reference declared for a channel.
    pub fn reference(&self, channel: Channel) -> Option<&str> {
        let reference = match channel {
            Channel::Video => self.video_ref.as_deref(),
            Channel::Audio => self.audio_ref.as_deref(),
            Channel::Subtitle => self.subtitle_ref.as_deref(),
        };
        reference.map(str::trim).filter(|r| !r.is_empty())
    }
}

/// A parsed and validated scene document.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDocument {
    /// Scenes in document order.
    pub scenes: Vec<SceneSpec>,
    /// Settings embedded in the document, if any.
    pub settings: Option<RenderSettings>,
}

#[derive(Deserialize)]
struct RawDocument {
    scenes: Option<Vec<RawScene>>,
    #[serde(default)]
    settings: Option<RenderSettings>,
}

#[derive(Deserialize)]
struct RawScene {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default, alias = "videoRef")]
    video: Option<String>,
    #[serde(default, alias = "audioRef")]
    audio: Option<String>,
    #[serde(default, alias = "subtitleRef", alias = "subtitles")]
    subtitle: Option<String>,
}

impl SceneDocument {
    /// Parse and validate a JSON scene document.
    ///
    /// Scenes without an id get their 1-based position. The scene array must
    /// exist and be non-empty; ids must be positive and unique.
    pub fn parse(content: &str) -> Result<Self, ModelError> {
        let raw: RawDocument =
            serde_json::from_str(content).map_err(|e| ModelError::ParseError {
                origin: "scene document".to_string(),
                source: e,
            })?;

        let raw_scenes = raw.scenes.ok_or_else(|| ModelError::ValidationError {
            message: "missing \"scenes\" array".to_string(),
        })?;
        if raw_scenes.is_empty() {
            return Err(ModelError::ValidationError {
                message: "\"scenes\" array is empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut scenes = Vec::with_capacity(raw_scenes.len());
        for (index, raw_scene) in raw_scenes.into_iter().enumerate() {
            let id = match raw_scene.id {
                None => index as u64 + 1,
                Some(id) if id > 0 && id <= u32::MAX as i64 => id as u64,
                Some(id) => {
                    return Err(ModelError::ValidationError {
                        message: format!("scene #{} has invalid id {id}", index + 1),
                    })
                }
            } as u32;

            if !seen.insert(id) {
                return Err(ModelError::ValidationError {
                    message: format!("duplicate scene id {id}"),
                });
            }

            scenes.push(SceneSpec {
                id,
                video_ref: raw_scene.video,
                audio_ref: raw_scene.audio,
                subtitle_ref: raw_scene.subtitle,
            });
        }

        Ok(Self {
            scenes,
            settings: raw.settings,
        })
    }

    /// Read and parse a scene document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SyncMode;

    #[test]
    fn test_parse_defaults_ids_by_position() {
        let doc = SceneDocument::parse(
            r#"{"scenes": [{"video": "a.mp4"}, {"id": 7, "videoRef": "b"}, {}]}"#,
        )
        .unwrap();
        let ids: Vec<u32> = doc.scenes.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 7, 3]);
        assert_eq!(doc.scenes[1].video_ref.as_deref(), Some("b"));
        assert!(doc.settings.is_none());
    }

    #[test]
    fn test_parse_embedded_settings() {
        let doc = SceneDocument::parse(
            r#"{"scenes": [{"id": 1}], "settings": {"sync_mode": "speed"}}"#,
        )
        .unwrap();
        assert_eq!(doc.settings.unwrap().sync_mode, SyncMode::Speed);
    }

    #[test]
    fn test_parse_rejects_structural_problems() {
        for doc in [
            "not json",
            r#"{"clips": []}"#,
            r#"{"scenes": []}"#,
            r#"{"scenes": [{"id": 0}]}"#,
            r#"{"scenes": [{"id": -3}]}"#,
            r#"{"scenes": [{"id": 2}, {"id": 2}]}"#,
        ] {
            assert!(SceneDocument::parse(doc).is_err(), "accepted: {doc}");
        }
    }

    #[test]
    fn test_document_errors_are_config_parse() {
        use scenereel_common::error::ReelError;

        for doc in [
            "{\"scenes\": [",
            r#"{"scenes": [{"id": 0}]}"#,
            r#"{"scenes": [{"id": 4}, {"id": 4}]}"#,
            r#"{"scenes": []}"#,
        ] {
            let err = ReelError::from(SceneDocument::parse(doc).unwrap_err());
            assert_eq!(err.kind(), "config_parse", "document: {doc}");
        }
    }

    #[test]
    fn test_missing_document_is_file_not_found() {
        use scenereel_common::error::ReelError;

        let dir = tempfile::tempdir().unwrap();
        let err = SceneDocument::load(dir.path().join("scenes.json")).unwrap_err();
        assert_eq!(ReelError::from(err).kind(), "file_not_found");
    }

    #[test]
    fn test_blank_reference_is_absent() {
        let spec = SceneSpec::new(1).with_video("  ").with_audio(" voice.mp3 ");
        assert_eq!(spec.reference(Channel::Video), None);
        assert_eq!(spec.reference(Channel::Audio), Some("voice.mp3"));
        assert_eq!(spec.reference(Channel::Subtitle), None);
    }
}
