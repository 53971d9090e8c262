//! [`Bridge`] – wires the engine, the bus and the bridge components together.
//!
//! # Startup
//!
//! 1. The engine is registered for its four inbound event kinds.
//! 2. The statistics publisher registers for `EngineResult`.
//! 3. Parameters are loaded (defaults ⊕ file), pushed to the store and
//!    `ConfigLoaded` is posted.
//! 4. Optionally a `DeleteMemory` command is posted.
//! 5. The sync controller enters `Running` and store edits are honoured.
//!
//! Steps 3 and 4 fix the posting order only. The engine receives each kind
//! on its own lane, so it may handle `DeleteMemory` before `ConfigLoaded`.

use std::path::PathBuf;
use std::sync::Arc;

use mapbridge_middleware::bus::DEFAULT_CAPACITY;
use mapbridge_middleware::{
    CommandDispatcher, EventBus, EventHandler, FrameIngest, ImageCodec, InfoChannels, RawCodec,
    StatisticsPublisher, Subscription,
};
use mapbridge_params::defaults::default_working_directory;
use mapbridge_params::{ParamStore, ParamSync, TomlConfigFile};
use mapbridge_types::{BridgeError, EventKind, ParameterTable};
use tracing::info;

use crate::engine::Engine;

/// Event kinds delivered to the engine.
pub const ENGINE_EVENT_KINDS: [EventKind; 4] = [
    EventKind::FrameIngested,
    EventKind::ControlCommand,
    EventKind::ConfigUpdated,
    EventKind::ConfigLoaded,
];

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub parameters_file: PathBuf,
    /// Post a `DeleteMemory` command right after parameters are loaded.
    pub delete_memory_on_start: bool,
    /// Capacity of every bus lane and outbound channel.
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            parameters_file: default_working_directory().join("parameters.toml"),
            delete_memory_on_start: false,
            event_capacity: DEFAULT_CAPACITY,
        }
    }
}

pub struct Bridge {
    bus: EventBus,
    commands: CommandDispatcher,
    ingest: FrameIngest,
    params: ParamSync,
    info: InfoChannels,
    _publisher: StatisticsPublisher,
    _engine_subscriptions: Vec<Subscription>,
}

impl Bridge {
    /// Assemble a running bridge around `engine`.
    ///
    /// Must be called inside a Tokio runtime. Fails when the parameter file
    /// exists but cannot be read or parsed.
    pub fn start<E: Engine>(
        engine: Arc<E>,
        store: Arc<dyn ParamStore>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let bus = EventBus::new(config.event_capacity);
        let codec: Arc<dyn ImageCodec> = Arc::new(RawCodec);

        let engine_subscriptions = ENGINE_EVENT_KINDS
            .iter()
            .map(|&kind| bus.subscribe(kind, Arc::clone(&engine) as Arc<dyn EventHandler>))
            .collect();

        let info = InfoChannels::new(config.event_capacity);
        let publisher = StatisticsPublisher::new(&bus, info.clone(), Arc::clone(&codec));

        let params = ParamSync::new(
            engine.default_parameters(),
            store,
            TomlConfigFile::new(&config.parameters_file),
            bus.clone(),
        );
        params.load()?;

        let commands = CommandDispatcher::new(bus.clone());
        if config.delete_memory_on_start {
            info!("deleting memory on start");
            commands.delete_memory();
        }

        params.start()?;
        info!(engine = %engine.name(), "bridge started");

        Ok(Self {
            ingest: FrameIngest::new(bus.clone(), codec),
            bus,
            commands,
            params,
            info,
            _publisher: publisher,
            _engine_subscriptions: engine_subscriptions,
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn commands(&self) -> &CommandDispatcher {
        &self.commands
    }

    pub fn ingest(&self) -> &FrameIngest {
        &self.ingest
    }

    pub fn params(&self) -> &ParamSync {
        &self.params
    }

    pub fn info_channels(&self) -> &InfoChannels {
        &self.info
    }

    /// Config-change notification from the host.
    pub fn parameters_updated(&self) -> Result<ParameterTable, BridgeError> {
        self.params.parameters_updated()
    }

    /// Persist parameters. Only the first call succeeds.
    pub fn shutdown(&self) -> Result<ParameterTable, BridgeError> {
        info!("bridge shutting down");
        self.params.save()
    }
}
