//! The handler capability every bus consumer implements.
//!
//! The bridge never calls the engine directly. It posts to the
//! [`EventBus`][crate::bus::EventBus]; the engine, the statistics publisher
//! and any test double register an [`EventHandler`] for the kinds they
//! consume.

use std::sync::Arc;

use async_trait::async_trait;
use mapbridge_types::{BridgeError, Event};

/// Something that consumes events delivered by the bus.
///
/// # Contract
///
/// * `handle` receives each event of a subscribed kind, in post order, on
///   the bus's delivery task. The event is shared with other handlers and
///   must be treated as read-only.
/// * An `Err` is logged by the bus and does not stop delivery of later
///   events.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Label used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, event: &Event) -> Result<(), BridgeError>;
}

/// Adapts a synchronous closure into an [`EventHandler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

/// Wrap `f` as a named handler.
pub fn handler_fn<F>(name: impl Into<String>, f: F) -> Arc<FnHandler<F>>
where
    F: Fn(&Event) -> Result<(), BridgeError> + Send + Sync + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> Result<(), BridgeError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &Event) -> Result<(), BridgeError> {
        (self.f)(event)
    }
}
