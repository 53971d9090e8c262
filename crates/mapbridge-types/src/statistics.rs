//! Result snapshots produced by the mapping engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A raw, densely packed image (no row padding).
///
/// Colour images use interleaved BGR (3 channels) or BGRA (4 channels).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    /// An image with no pixels carries no data for this cycle.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }

    /// Number of bytes a packed buffer of these dimensions must hold.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

/// A visual-word keypoint as reported by the engine's feature detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub angle: f32,
    pub response: f32,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub octave: i32,
    pub class_id: i32,
}

/// One immutable result record produced per processed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Identifier of the node created for the frame; increases monotonically.
    pub ref_id: i32,
    /// Node the reference was matched with; non-positive when no closure was
    /// detected.
    pub loop_closure_id: i32,
    /// Present only when the engine ran with extended statistics enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedStatistics>,
}

impl Statistics {
    /// A brief snapshot without the extended section.
    pub fn new(ref_id: i32, loop_closure_id: i32) -> Self {
        Self {
            ref_id,
            loop_closure_id,
            extended: None,
        }
    }

    pub fn with_extended(mut self, extended: ExtendedStatistics) -> Self {
        self.extended = Some(extended);
        self
    }

    pub fn is_extended(&self) -> bool {
        self.extended.is_some()
    }

    pub fn has_loop_closure(&self) -> bool {
        self.loop_closure_id > 0
    }
}

/// Detailed payload of an extended snapshot.
///
/// Maps are ordered by key. Word maps keep the engine's insertion order for
/// keypoints sharing a word id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedStatistics {
    pub ref_image: Image,
    pub loop_image: Image,
    pub posterior: BTreeMap<i32, f32>,
    pub likelihood: BTreeMap<i32, f32>,
    pub weights: BTreeMap<i32, i32>,
    pub ref_words: BTreeMap<i32, Vec<KeyPoint>>,
    pub loop_words: BTreeMap<i32, Vec<KeyPoint>>,
    pub data: BTreeMap<String, f32>,
}

impl ExtendedStatistics {
    /// Append `keypoint` under `word_id`, after any keypoints already there.
    pub fn push_ref_word(&mut self, word_id: i32, keypoint: KeyPoint) {
        self.ref_words.entry(word_id).or_default().push(keypoint);
    }

    pub fn push_loop_word(&mut self, word_id: i32, keypoint: KeyPoint) {
        self.loop_words.entry(word_id).or_default().push(keypoint);
    }
}
