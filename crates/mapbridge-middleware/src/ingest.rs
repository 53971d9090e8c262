//! Frame ingest: wire images in, [`EventPayload::FrameIngested`] events out.

use std::sync::Arc;

use mapbridge_types::{Event, EventPayload, ImageMsg};
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::codec::ImageCodec;

pub const INGEST_SOURCE: &str = "mapbridge-middleware::ingest/image";

/// Feeds camera frames to the engine through the bus.
#[derive(Clone)]
pub struct FrameIngest {
    bus: EventBus,
    codec: Arc<dyn ImageCodec>,
}

impl FrameIngest {
    pub fn new(bus: EventBus, codec: Arc<dyn ImageCodec>) -> Self {
        Self { bus, codec }
    }

    /// Decode `wire` and post it as a [`EventPayload::FrameIngested`] event.
    ///
    /// An empty payload means the source had nothing this tick and is
    /// dropped silently. A payload that cannot be decoded is logged and
    /// dropped. Returns whether an event was posted.
    pub fn on_frame_received(&self, wire: &ImageMsg) -> bool {
        if wire.data.is_empty() {
            debug!("empty frame dropped");
            return false;
        }

        match self.codec.decode(wire) {
            Ok(frame) => {
                debug!(width = frame.width, height = frame.height, channels = frame.channels, "received image");
                self.bus.post(Event::new(
                    INGEST_SOURCE,
                    EventPayload::FrameIngested(Arc::new(frame)),
                ));
                true
            }
            Err(e) => {
                warn!(encoding = %wire.encoding, error = %e, "frame dropped");
                false
            }
        }
    }
}
