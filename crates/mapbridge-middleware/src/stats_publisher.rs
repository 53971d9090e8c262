//! Statistics publisher: engine snapshots in, [`Info`] / [`InfoEx`] out.
//!
//! The publisher registers for [`EventKind::EngineResult`] once, at
//! construction, and keeps no state between snapshots. For each snapshot it
//! reads the subscriber counts of both outbound channels exactly once. When
//! nobody listens on either channel the snapshot is discarded before any
//! image is encoded or any map is flattened.
//!
//! The detailed message is assembled before anything is published, so a
//! malformed snapshot publishes nothing at all.

use std::sync::Arc;

use async_trait::async_trait;
use mapbridge_types::{
    BridgeError, Event, EventKind, EventPayload, ExtendedStatistics, Header, Image, ImageMsg, Info,
    InfoEx, InfoExDetail, KeyPointMsg, Statistics,
};
use tracing::{debug, instrument, trace};

use crate::bus::{EventBus, Subscription};
use crate::codec::ImageCodec;
use crate::flatten::{flatten, flatten_multi};
use crate::handler::EventHandler;
use crate::outbound::OutboundChannel;

/// Logical source label attached to every published image.
pub const IMAGE_FRAME_ID: &str = "camera";

pub const INFO_TOPIC: &str = "info";
pub const INFO_EX_TOPIC: &str = "infoEx";

/// The two outbound channels fed by the publisher.
#[derive(Clone, Debug)]
pub struct InfoChannels {
    pub info: OutboundChannel<Info>,
    pub info_ex: OutboundChannel<Arc<InfoEx>>,
}

impl InfoChannels {
    pub fn new(capacity: usize) -> Self {
        Self {
            info: OutboundChannel::new(INFO_TOPIC, capacity),
            info_ex: OutboundChannel::new(INFO_EX_TOPIC, capacity),
        }
    }
}

/// Live registration of a [`StatisticsTranslator`] on the bus.
pub struct StatisticsPublisher {
    subscription: Subscription,
}

impl StatisticsPublisher {
    /// Register a translator for `EngineResult` events on `bus`.
    pub fn new(bus: &EventBus, channels: InfoChannels, codec: Arc<dyn ImageCodec>) -> Self {
        let translator = Arc::new(StatisticsTranslator::new(channels, codec));
        Self {
            subscription: bus.subscribe(EventKind::EngineResult, translator),
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

/// Translates one snapshot at a time into outbound messages.
pub struct StatisticsTranslator {
    channels: InfoChannels,
    codec: Arc<dyn ImageCodec>,
}

impl StatisticsTranslator {
    pub fn new(channels: InfoChannels, codec: Arc<dyn ImageCodec>) -> Self {
        Self { channels, codec }
    }

    /// Translate and publish `stats` on whichever channels have subscribers.
    #[instrument(skip_all, fields(ref_id = stats.ref_id))]
    pub fn process(&self, stats: &Statistics) -> Result<(), BridgeError> {
        let brief = self.channels.info.subscriber_count();
        let detailed = self.channels.info_ex.subscriber_count();
        if brief == 0 && detailed == 0 {
            trace!(ref_id = stats.ref_id, "no subscribers, snapshot skipped");
            return Ok(());
        }

        let info_ex = if detailed > 0 {
            Some(self.build_info_ex(stats)?)
        } else {
            None
        };

        if brief > 0 {
            debug!(ref_id = stats.ref_id, "sending info");
            self.channels.info.publish(Info {
                ref_id: stats.ref_id,
                loop_closure_id: stats.loop_closure_id,
            });
        }
        if let Some(msg) = info_ex {
            debug!(ref_id = stats.ref_id, extended = msg.detail.is_some(), "sending infoEx");
            self.channels.info_ex.publish(Arc::new(msg));
        }
        Ok(())
    }

    fn build_info_ex(&self, stats: &Statistics) -> Result<InfoEx, BridgeError> {
        let detail = match &stats.extended {
            Some(ext) => Some(self.build_detail(stats.ref_id, ext)?),
            None => None,
        };
        Ok(InfoEx {
            ref_id: stats.ref_id,
            loop_closure_id: stats.loop_closure_id,
            detail,
        })
    }

    fn build_detail(&self, ref_id: i32, ext: &ExtendedStatistics) -> Result<InfoExDetail, BridgeError> {
        let header = Header::now(IMAGE_FRAME_ID);
        let ref_image = self.encode_if_present(ref_id, "ref", &ext.ref_image, &header)?;
        let loop_image = self.encode_if_present(ref_id, "loop", &ext.loop_image, &header)?;

        let (posterior_keys, posterior_values) = flatten(&ext.posterior);
        let (likelihood_keys, likelihood_values) = flatten(&ext.likelihood);
        let (weights_keys, weights_values) = flatten(&ext.weights);
        let (ref_words_keys, ref_words_values) = flatten_multi(&ext.ref_words, KeyPointMsg::from);
        let (loop_words_keys, loop_words_values) = flatten_multi(&ext.loop_words, KeyPointMsg::from);
        let (stats_keys, stats_values) = flatten(&ext.data);

        let detail = InfoExDetail {
            ref_image,
            loop_image,
            posterior_keys,
            posterior_values,
            likelihood_keys,
            likelihood_values,
            weights_keys,
            weights_values,
            ref_words_keys,
            ref_words_values,
            loop_words_keys,
            loop_words_values,
            stats_keys,
            stats_values,
        };

        check_cardinality(ref_id, &detail)?;
        Ok(detail)
    }

    fn encode_if_present(
        &self,
        ref_id: i32,
        which: &str,
        image: &Image,
        header: &Header,
    ) -> Result<Option<ImageMsg>, BridgeError> {
        if image.is_empty() {
            return Ok(None);
        }
        self.codec
            .encode(image, header.clone())
            .map(Some)
            .map_err(|e| BridgeError::MalformedSnapshot {
                ref_id,
                details: format!("{which} image: {e}"),
            })
    }
}

/// Reject a detail whose key and value sequences differ in length.
///
/// Sequences flattened from ordered maps always agree; this guards details
/// assembled from other sources before they reach a subscriber.
fn check_cardinality(ref_id: i32, detail: &InfoExDetail) -> Result<(), BridgeError> {
    match detail
        .sequence_lengths()
        .into_iter()
        .find(|(_, keys, values)| keys != values)
    {
        Some((name, keys, values)) => Err(BridgeError::MalformedSnapshot {
            ref_id,
            details: format!("{name} has {keys} keys but {values} values"),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl EventHandler for StatisticsTranslator {
    fn name(&self) -> &str {
        "statistics-publisher"
    }

    async fn handle(&self, event: &Event) -> Result<(), BridgeError> {
        match &event.payload {
            EventPayload::EngineResult(stats) => self.process(stats),
            other => {
                debug!(kind = ?other.kind(), "ignoring non-result event");
                Ok(())
            }
        }
    }
}
