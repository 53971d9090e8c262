//! `mapbridge-runtime` – assembles a running bridge.
//!
//! # Modules
//!
//! - [`bridge`] – [`Bridge`]: registers the engine, loads parameters and
//!   owns the ingest, command, sync and statistics components.
//! - [`engine`] – the [`Engine`] capability an attached mapping engine
//!   implements.
//! - [`remote_engine`] – [`RemoteEngine`]: an engine reached through the
//!   gateway's `engine` topic.
//! - [`ws_gateway`] – [`Gateway`]: the JSON-over-WebSocket host surface.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.

pub mod bridge;
pub mod engine;
pub mod remote_engine;
pub mod telemetry;
pub mod ws_gateway;

pub use bridge::{Bridge, BridgeConfig};
pub use engine::Engine;
pub use remote_engine::RemoteEngine;
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use ws_gateway::Gateway;
