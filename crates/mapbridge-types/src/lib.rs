//! `mapbridge-types` – shared vocabulary of the bridge.
//!
//! Everything that crosses a crate boundary lives here: the bus [`Event`]
//! envelope and its closed set of [`EventKind`]s, the engine's
//! [`Statistics`] snapshot, the outbound [`Info`] / [`InfoEx`] messages, the
//! [`ParameterTable`] exchanged with the configuration store, and the
//! workspace-wide [`BridgeError`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod messages;
pub mod params;
pub mod statistics;

pub use messages::{Header, ImageMsg, Info, InfoEx, InfoExDetail, KeyPointMsg};
pub use params::ParameterTable;
pub use statistics::{ExtendedStatistics, Image, KeyPoint, Statistics};

/// Imperative commands the host can hand to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlCommand {
    /// Clear working and short-term memory, keep the long-term database.
    ResetMemory,
    /// Drop every memory including the long-term database.
    DeleteMemory,
    /// Write the memory graph to disk for offline inspection.
    DumpMemory,
    /// Write the last prediction matrix to disk.
    DumpPrediction,
}

impl ControlCommand {
    pub const ALL: [ControlCommand; 4] = [
        ControlCommand::ResetMemory,
        ControlCommand::DeleteMemory,
        ControlCommand::DumpMemory,
        ControlCommand::DumpPrediction,
    ];

    /// Name of the request/response endpoint that dispatches this command.
    pub fn service_name(self) -> &'static str {
        match self {
            ControlCommand::ResetMemory => "resetMemory",
            ControlCommand::DeleteMemory => "deleteMemory",
            ControlCommand::DumpMemory => "dumpMemory",
            ControlCommand::DumpPrediction => "dumpPrediction",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

impl FromStr for ControlCommand {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControlCommand::ALL
            .into_iter()
            .find(|cmd| cmd.service_name() == s)
            .ok_or_else(|| BridgeError::UnknownService(s.to_string()))
    }
}

/// Discriminant of [`EventPayload`], used to route events onto bus lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    FrameIngested,
    EngineResult,
    ControlCommand,
    ConfigUpdated,
    ConfigLoaded,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::FrameIngested,
        EventKind::EngineResult,
        EventKind::ControlCommand,
        EventKind::ConfigUpdated,
        EventKind::ConfigLoaded,
    ];
}

/// Unified event wrapper for the bus.
///
/// Events are immutable once posted. Large payloads sit behind an [`Arc`] so
/// fanning an event out to many handlers never copies pixel buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "mapbridge-middleware::ingest"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped with the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Variants of data that can be routed over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A decoded camera frame for the engine to process.
    FrameIngested(Arc<Image>),
    /// One result snapshot produced by the engine.
    EngineResult(Arc<Statistics>),
    ControlCommand(ControlCommand),
    /// Full replacement configuration for the engine.
    ConfigUpdated(Arc<ParameterTable>),
    /// Parameters have been pushed to the store; startup may proceed.
    ConfigLoaded(Arc<ParameterTable>),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::FrameIngested(_) => EventKind::FrameIngested,
            EventPayload::EngineResult(_) => EventKind::EngineResult,
            EventPayload::ControlCommand(_) => EventKind::ControlCommand,
            EventPayload::ConfigUpdated(_) => EventKind::ConfigUpdated,
            EventPayload::ConfigLoaded(_) => EventKind::ConfigLoaded,
        }
    }
}

/// Global error type for the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Frame decode error: {0}")]
    Decode(String),

    #[error("Image encode error: {0}")]
    Encode(String),

    #[error("Malformed snapshot {ref_id}: {details}")]
    MalformedSnapshot { ref_id: i32, details: String },

    #[error("Cannot {operation} while parameter sync is {state}")]
    InvalidState { operation: &'static str, state: String },

    #[error("Config file error at {path}: {details}")]
    ConfigIo { path: String, details: String },

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Handler error: {0}")]
    Handler(String),
}
