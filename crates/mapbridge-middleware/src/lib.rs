//! `mapbridge-middleware` – the event-driven core of the bridge.
//!
//! Routes events between the host, the engine and outbound consumers
//! without the components ever calling each other directly.
//!
//! # Modules
//!
//! - [`bus`] – typed, kind-routed publish/subscribe event bus built on Tokio
//!   broadcast channels, with isolated handler tasks.
//! - [`handler`] – the [`EventHandler`] capability bus consumers implement.
//! - [`outbound`] – fan-out channels with observable subscriber counts.
//! - [`codec`] – wire image ⇄ packed frame conversion.
//! - [`ingest`] – inbound frames → `FrameIngested` events.
//! - [`command`] – fire-and-forget command endpoints.
//! - [`flatten`] – map → index-aligned sequence helpers.
//! - [`stats_publisher`] – subscriber-gated translation of engine snapshots
//!   into `Info` / `InfoEx` messages.

pub mod bus;
pub mod codec;
pub mod command;
pub mod flatten;
pub mod handler;
pub mod ingest;
pub mod outbound;
pub mod stats_publisher;

pub use bus::{EventBus, KindReceiver, Subscription};
pub use codec::{ImageCodec, RawCodec};
pub use command::CommandDispatcher;
pub use handler::{EventHandler, FnHandler, handler_fn};
pub use ingest::FrameIngest;
pub use outbound::OutboundChannel;
pub use stats_publisher::{InfoChannels, StatisticsPublisher, StatisticsTranslator};
