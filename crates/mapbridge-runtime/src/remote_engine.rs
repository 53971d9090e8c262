//! An [`Engine`] that lives on the other side of the gateway.
//!
//! Every engine-bound event is forwarded to the `engine` outbound channel,
//! where gateway clients subscribed to that topic pick it up. Results come
//! back as `engine_result` publishes and are posted on the bus by the
//! gateway.

use async_trait::async_trait;
use mapbridge_middleware::{EventHandler, OutboundChannel};
use mapbridge_types::{BridgeError, Event, ParameterTable};
use tracing::debug;

use crate::engine::Engine;

pub const ENGINE_TOPIC: &str = "engine";

pub struct RemoteEngine {
    channel: OutboundChannel<Event>,
    defaults: ParameterTable,
}

impl RemoteEngine {
    pub fn new(capacity: usize) -> Self {
        Self::with_defaults(capacity, mapbridge_params::default_parameters())
    }

    pub fn with_defaults(capacity: usize, defaults: ParameterTable) -> Self {
        Self {
            channel: OutboundChannel::new(ENGINE_TOPIC, capacity),
            defaults,
        }
    }

    pub fn channel(&self) -> &OutboundChannel<Event> {
        &self.channel
    }
}

#[async_trait]
impl EventHandler for RemoteEngine {
    fn name(&self) -> &str {
        "remote-engine"
    }

    async fn handle(&self, event: &Event) -> Result<(), BridgeError> {
        if self.channel.publish(event.clone()) == 0 {
            debug!(kind = ?event.kind(), "no remote engine attached, event dropped");
        }
        Ok(())
    }
}

impl Engine for RemoteEngine {
    fn default_parameters(&self) -> ParameterTable {
        self.defaults.clone()
    }
}
