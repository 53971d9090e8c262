//! Headless, typed, kind-routed publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every event of its kind without any single subscriber
//! blocking the poster or the others.
//!
//! # Lanes
//!
//! Traffic is partitioned into one lane per [`EventKind`]:
//!
//! | Kind | Typical traffic |
//! |---|---|
//! | [`EventKind::FrameIngested`] | Decoded camera frames for the engine |
//! | [`EventKind::EngineResult`] | Statistics snapshots produced by the engine |
//! | [`EventKind::ControlCommand`] | Reset / delete / dump requests |
//! | [`EventKind::ConfigUpdated`] | Full parameter tables pushed to the engine |
//! | [`EventKind::ConfigLoaded`] | Startup-complete announcement |
//!
//! # Handlers
//!
//! [`EventBus::subscribe`] spawns one Tokio task per registration. The task
//! owns its own lane receiver, so per-kind post order is preserved for each
//! handler and registering or dropping a handler never takes a lock that a
//! running handler could be holding. A handler that errors or panics is
//! logged and keeps receiving subsequent events.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use mapbridge_types::{Event, EventKind};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::handler::EventHandler;

/// Default lane capacity (number of buffered events before the oldest ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 256;

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast lanes.
#[derive(Clone, Debug)]
pub struct EventBus {
    frame_ingested: broadcast::Sender<Event>,
    engine_result: broadcast::Sender<Event>,
    control_command: broadcast::Sender<Event>,
    config_updated: broadcast::Sender<Event>,
    config_loaded: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given lane capacity.
    ///
    /// The `capacity` is applied to every lane independently.
    pub fn new(capacity: usize) -> Self {
        let (frame_ingested, _) = broadcast::channel(capacity);
        let (engine_result, _) = broadcast::channel(capacity);
        let (control_command, _) = broadcast::channel(capacity);
        let (config_updated, _) = broadcast::channel(capacity);
        let (config_loaded, _) = broadcast::channel(capacity);
        Self {
            frame_ingested,
            engine_result,
            control_command,
            config_updated,
            config_loaded,
        }
    }

    /// Post `event` to every subscriber of its kind.
    ///
    /// Never blocks and never fails. Returns the number of receivers that
    /// were handed the event; `0` means nobody is listening on that lane,
    /// which is a normal condition.
    pub fn post(&self, event: Event) -> usize {
        let kind = event.kind();
        match self.lane(kind).send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(_)) => {
                debug!(?kind, "event posted with no subscribers");
                0
            }
        }
    }

    /// Register `handler` for every event of `kind` posted from now on.
    ///
    /// Safe to call from inside another handler. The registration lives as
    /// long as the returned [`Subscription`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Subscription {
        let mut receiver = self.lane(kind).subscribe();
        let handler_name = handler.name().to_string();
        let task_name = handler_name.clone();

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => deliver(handler.as_ref(), &task_name, &event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(handler = %task_name, ?kind, lagged_by = n, "event handler lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Subscription {
            kind,
            handler_name,
            task,
        }
    }

    /// Remove a handler registration. Events already queued for it are
    /// discarded.
    pub fn unsubscribe(&self, subscription: Subscription) {
        debug!(
            handler = %subscription.handler_name,
            kind = ?subscription.kind,
            "unsubscribing handler"
        );
        drop(subscription);
    }

    /// Subscribe a raw receiver to one lane.
    ///
    /// For observers that prefer pulling events over registering a handler.
    pub fn subscribe_to(&self, kind: EventKind) -> KindReceiver {
        KindReceiver {
            kind,
            receiver: self.lane(kind).subscribe(),
        }
    }

    /// Number of handlers and raw receivers currently attached to `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lane(kind).receiver_count()
    }

    fn lane(&self, kind: EventKind) -> &broadcast::Sender<Event> {
        match kind {
            EventKind::FrameIngested => &self.frame_ingested,
            EventKind::EngineResult => &self.engine_result,
            EventKind::ControlCommand => &self.control_command,
            EventKind::ConfigUpdated => &self.config_updated,
            EventKind::ConfigLoaded => &self.config_loaded,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

async fn deliver(handler: &dyn EventHandler, handler_name: &str, event: &Event) {
    match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(handler = %handler_name, kind = ?event.kind(), event_id = %event.id, error = %e, "event handler failed");
        }
        Err(_) => {
            error!(handler = %handler_name, kind = ?event.kind(), event_id = %event.id, "event handler panicked");
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription handle
// ---------------------------------------------------------------------------

/// A live handler registration. Dropping it unsubscribes the handler.
#[derive(Debug)]
pub struct Subscription {
    kind: EventKind,
    handler_name: String,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Raw lane receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`EventKind`] lane.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct KindReceiver {
    kind: EventKind,
    receiver: broadcast::Receiver<Event>,
}

impl KindReceiver {
    /// Wait for the next event on this lane.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the receiver fell
    ///   behind and `n` events were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – every bus clone is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking receive, for asserting that nothing is queued.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }
}
