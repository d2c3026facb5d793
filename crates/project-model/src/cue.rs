//! Timed subtitle cues.
//!
//! Parsing of caption file formats happens outside this workspace; the
//! [`CueDecoder`] trait is the seam where a parser plugs in. The bundled
//! [`JsonCueDecoder`] accepts a plain JSON list of cues.

use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::ModelError;

/// One timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start time in seconds.
    pub start_time: f64,
    /// End time in seconds.
    pub end_time: f64,
    /// Display text. May contain line breaks.
    pub text: String,
    /// Whether the text reads right-to-left.
    pub is_rtl: bool,
}

impl Cue {
    /// Create a cue, deriving directionality from the text.
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        let text = text.into();
        let is_rtl = Script::detect(&text).is_rtl();
        Self {
            start_time,
            end_time,
            text,
            is_rtl,
        }
    }

    /// A cue is usable only when it has finite, strictly ordered bounds.
    pub fn is_valid(&self) -> bool {
        self.start_time.is_finite() && self.end_time.is_finite() && self.start_time < self.end_time
    }

    /// Whether `t` lies within `[start_time, end_time]`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_time && t <= self.end_time
    }

    /// Copy of this cue moved by `delta` seconds.
    pub fn shifted(&self, delta: f64) -> Self {
        Self {
            start_time: self.start_time + delta,
            end_time: self.end_time + delta,
            text: self.text.clone(),
            is_rtl: self.is_rtl,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Dominant writing system of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Hebrew,
    Arabic,
    OtherRtl,
    Ltr,
}

impl Script {
    /// Classify text by its first strongly-directional character.
    pub fn detect(text: &str) -> Self {
        for ch in text.chars() {
            let cp = ch as u32;
            match cp {
                0x0590..=0x05FF | 0xFB1D..=0xFB4F => return Script::Hebrew,
                0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF | 0xFB50..=0xFDFF
                | 0xFE70..=0xFEFF => return Script::Arabic,
                // Syriac, Thaana, N'Ko
                0x0700..=0x074F | 0x0780..=0x07BF | 0x07C0..=0x07FF => return Script::OtherRtl,
                _ if ch.is_alphabetic() => return Script::Ltr,
                _ => {}
            }
        }
        Script::Ltr
    }

    pub fn is_rtl(self) -> bool {
        !matches!(self, Script::Ltr)
    }
}

/// Turns a subtitle asset into an ordered cue sequence.
pub trait CueDecoder: Send + Sync {
    /// Decode all cues in source order.
    fn decode(&self, asset: &Asset) -> Result<Vec<Cue>, ModelError>;

    /// Whether this decoder understands the asset's format.
    fn supports(&self, asset: &Asset) -> bool;
}

/// Decoder for JSON cue lists: `[{"start": 0.0, "end": 1.5, "text": "..."}]`.
///
/// `rtl` may be given per cue; when omitted it is derived from the text.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCueDecoder;

#[derive(Deserialize)]
struct RawCue {
    #[serde(alias = "startTime")]
    start: f64,
    #[serde(alias = "endTime")]
    end: f64,
    text: String,
    #[serde(default, alias = "isRTL")]
    rtl: Option<bool>,
}

impl JsonCueDecoder {
    pub fn decode_str(&self, origin: &str, content: &str) -> Result<Vec<Cue>, ModelError> {
        let raw: Vec<RawCue> =
            serde_json::from_str(content).map_err(|e| ModelError::ParseError {
                origin: origin.to_string(),
                source: e,
            })?;
        Ok(raw
            .into_iter()
            .map(|r| {
                let mut cue = Cue::new(r.start, r.end, r.text);
                if let Some(rtl) = r.rtl {
                    cue.is_rtl = rtl;
                }
                cue
            })
            .collect())
    }
}

impl CueDecoder for JsonCueDecoder {
    fn decode(&self, asset: &Asset) -> Result<Vec<Cue>, ModelError> {
        let content =
            std::str::from_utf8(asset.bytes()).map_err(|e| ModelError::ValidationError {
                message: format!("{} is not valid UTF-8: {e}", asset.path()),
            })?;
        self.decode_str(asset.path(), content)
    }

    fn supports(&self, asset: &Asset) -> bool {
        asset.extension().as_deref() == Some("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_detection() {
        assert_eq!(Script::detect("שלום עולם"), Script::Hebrew);
        assert_eq!(Script::detect("مرحبا"), Script::Arabic);
        assert_eq!(Script::detect("Hello"), Script::Ltr);
        assert_eq!(Script::detect("123 - مرحبا"), Script::Arabic);
        assert_eq!(Script::detect(""), Script::Ltr);
    }

    #[test]
    fn test_cue_new_sets_rtl() {
        assert!(Cue::new(0.0, 1.0, "שלום").is_rtl);
        assert!(!Cue::new(0.0, 1.0, "hi").is_rtl);
    }

    #[test]
    fn test_cue_validity() {
        assert!(Cue::new(0.0, 1.0, "a").is_valid());
        assert!(!Cue::new(1.0, 1.0, "a").is_valid());
        assert!(!Cue::new(2.0, 1.0, "a").is_valid());
        assert!(!Cue::new(f64::NAN, 1.0, "a").is_valid());
    }

    #[test]
    fn test_contains_is_inclusive() {
        let cue = Cue::new(1.0, 2.0, "a");
        assert!(cue.contains(1.0));
        assert!(cue.contains(2.0));
        assert!(!cue.contains(2.01));
    }

    #[test]
    fn test_json_decoder() {
        let json = r#"[
            {"start": 0.0, "end": 1.5, "text": "Hello"},
            {"startTime": 2.0, "endTime": 3.0, "text": "forced", "isRTL": true}
        ]"#;
        let cues = JsonCueDecoder.decode_str("cues.json", json).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Hello");
        assert!(!cues[0].is_rtl);
        assert!(cues[1].is_rtl);
    }

    #[test]
    fn test_json_decoder_rejects_malformed() {
        let err = JsonCueDecoder.decode_str("cues.json", "{not json").unwrap_err();
        assert!(matches!(err, ModelError::ParseError { .. }));
    }

    proptest::proptest! {
        #[test]
        fn prop_shift_preserves_duration_and_validity(
            start in 0.0f64..1000.0,
            len in 0.001f64..60.0,
            delta in -500.0f64..500.0,
        ) {
            let cue = Cue::new(start, start + len, "line");
            let moved = cue.shifted(delta);
            proptest::prop_assert!((moved.duration() - cue.duration()).abs() < 1e-9);
            proptest::prop_assert!(moved.is_valid());
            proptest::prop_assert_eq!(moved.is_rtl, cue.is_rtl);
        }
    }
}
