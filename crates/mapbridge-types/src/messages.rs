//! Outbound message shapes and the wire image format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::statistics::KeyPoint;

/// Capture metadata attached to every wire image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: DateTime<Utc>,
    /// Logical source of the image, e.g. `"camera"`.
    pub frame_id: String,
}

impl Header {
    /// Header stamped with the current time.
    pub fn now(frame_id: impl Into<String>) -> Self {
        Self {
            stamp: Utc::now(),
            frame_id: frame_id.into(),
        }
    }
}

/// Transport image, shaped like `sensor_msgs/Image`.
///
/// `step` is the length of one row in bytes and may exceed
/// `width * channels` when rows are padded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMsg {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    /// `mono8`, `bgr8`, `rgb8` or `bgra8`.
    pub encoding: String,
    pub step: u32,
    #[serde(default)]
    pub data: Vec<u8>,
}

/// Field-for-field copy of a [`KeyPoint`] in wire naming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyPointMsg {
    pub angle: f32,
    pub response: f32,
    pub ptx: f32,
    pub pty: f32,
    pub size: f32,
    pub octave: i32,
    pub class_id: i32,
}

impl From<&KeyPoint> for KeyPointMsg {
    fn from(kp: &KeyPoint) -> Self {
        Self {
            angle: kp.angle,
            response: kp.response,
            ptx: kp.x,
            pty: kp.y,
            size: kp.size,
            octave: kp.octave,
            class_id: kp.class_id,
        }
    }
}

impl From<KeyPoint> for KeyPointMsg {
    fn from(kp: KeyPoint) -> Self {
        Self::from(&kp)
    }
}

/// Brief per-snapshot message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub ref_id: i32,
    pub loop_closure_id: i32,
}

/// Detailed per-snapshot message.
///
/// `detail` is `None` for snapshots produced without extended statistics;
/// the message then carries the same identifiers as [`Info`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoEx {
    pub ref_id: i32,
    pub loop_closure_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<InfoExDetail>,
}

/// Extended part of [`InfoEx`]: optional images plus index-aligned key and
/// value sequences. An empty pair means "no data this cycle".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoExDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_image: Option<ImageMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_image: Option<ImageMsg>,

    pub posterior_keys: Vec<i32>,
    pub posterior_values: Vec<f32>,
    pub likelihood_keys: Vec<i32>,
    pub likelihood_values: Vec<f32>,
    pub weights_keys: Vec<i32>,
    pub weights_values: Vec<i32>,

    pub ref_words_keys: Vec<i32>,
    pub ref_words_values: Vec<KeyPointMsg>,
    pub loop_words_keys: Vec<i32>,
    pub loop_words_values: Vec<KeyPointMsg>,

    pub stats_keys: Vec<String>,
    pub stats_values: Vec<f32>,
}

impl InfoExDetail {
    /// Lengths of every key/value pair, labelled, for cardinality checks.
    pub fn sequence_lengths(&self) -> [(&'static str, usize, usize); 6] {
        [
            ("posterior", self.posterior_keys.len(), self.posterior_values.len()),
            ("likelihood", self.likelihood_keys.len(), self.likelihood_values.len()),
            ("weights", self.weights_keys.len(), self.weights_values.len()),
            ("ref_words", self.ref_words_keys.len(), self.ref_words_values.len()),
            ("loop_words", self.loop_words_keys.len(), self.loop_words_values.len()),
            ("stats", self.stats_keys.len(), self.stats_values.len()),
        ]
    }
}
