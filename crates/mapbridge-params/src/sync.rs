//! [`ParamSync`] – keeps the shared store, the config file and the engine's
//! parameter table consistent.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──load──▶ Loaded ──start──▶ Running ──save──▶ Saved
//!                          │  ▲                │  ▲
//!                          └──┘ load           └──┘ parameters_updated
//! ```
//!
//! Every table the controller produces is keyed by the default set: values
//! from the file or the store override defaults, unknown keys are dropped
//! and missing keys are back-filled.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mapbridge_middleware::EventBus;
use mapbridge_types::{BridgeError, Event, EventPayload, ParameterTable};
use tracing::{debug, info, instrument, warn};

use crate::defaults::{DATABASE_NAME, WORKING_DIRECTORY};
use crate::file::ConfigFile;
use crate::store::ParamStore;

pub const SYNC_SOURCE: &str = "mapbridge-params::sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialized,
    Loaded,
    Running,
    Saved,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Uninitialized => "Uninitialized",
            SyncState::Loaded => "Loaded",
            SyncState::Running => "Running",
            SyncState::Saved => "Saved",
        };
        f.write_str(name)
    }
}

/// Bidirectional parameter synchronisation controller.
pub struct ParamSync {
    defaults: ParameterTable,
    store: Arc<dyn ParamStore>,
    file: Box<dyn ConfigFile>,
    bus: EventBus,
    state: Mutex<SyncState>,
}

impl ParamSync {
    pub fn new(
        defaults: ParameterTable,
        store: Arc<dyn ParamStore>,
        file: impl ConfigFile + 'static,
        bus: EventBus,
    ) -> Self {
        Self {
            defaults,
            store,
            file: Box::new(file),
            bus,
            state: Mutex::new(SyncState::Uninitialized),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.lock_state()
    }

    pub fn defaults(&self) -> &ParameterTable {
        &self.defaults
    }

    /// Merge defaults with the config file, push the result into the store
    /// and post [`EventPayload::ConfigLoaded`] once every key is written.
    ///
    /// A missing file is not an error: the defaults alone are pushed.
    #[instrument(skip_all)]
    pub fn load(&self) -> Result<ParameterTable, BridgeError> {
        let mut state = self.lock_state();
        if !matches!(*state, SyncState::Uninitialized | SyncState::Loaded) {
            return Err(invalid("load", *state));
        }

        info!(path = %self.file.location(), "loading parameters");
        let overrides = match self.file.read()? {
            Some(table) => table,
            None => {
                warn!(path = %self.file.location(), "config file doesn't exist, using defaults");
                ParameterTable::new()
            }
        };

        let merged = self.defaults.overlay_table(&overrides);
        for (key, value) in merged.iter() {
            self.store.set(key, value);
        }
        *state = SyncState::Loaded;

        debug!(parameters = merged.len(), "parameters pushed to store");
        self.bus.post(Event::new(
            SYNC_SOURCE,
            EventPayload::ConfigLoaded(Arc::new(merged.clone())),
        ));
        Ok(merged)
    }

    /// Enter the running state, after which store edits are honoured.
    pub fn start(&self) -> Result<(), BridgeError> {
        let mut state = self.lock_state();
        match *state {
            SyncState::Loaded => {
                *state = SyncState::Running;
                Ok(())
            }
            SyncState::Running => Ok(()),
            other => Err(invalid("start", other)),
        }
    }

    /// React to an external "parameters changed" notification: re-read the
    /// store and post the full table as [`EventPayload::ConfigUpdated`].
    #[instrument(skip_all)]
    pub fn parameters_updated(&self) -> Result<ParameterTable, BridgeError> {
        let state = self.lock_state();
        if *state != SyncState::Running {
            return Err(invalid("update parameters", *state));
        }

        let merged = self.read_back();
        info!(parameters = merged.len(), "updating parameters");
        self.bus.post(Event::new(
            SYNC_SOURCE,
            EventPayload::ConfigUpdated(Arc::new(merged.clone())),
        ));
        Ok(merged)
    }

    /// Persist the current store values to the config file, overwriting it.
    ///
    /// This is the only point parameters reach durable storage. A failed
    /// write leaves the state unchanged so the save can be retried.
    #[instrument(skip_all)]
    pub fn save(&self) -> Result<ParameterTable, BridgeError> {
        let mut state = self.lock_state();
        if *state == SyncState::Saved {
            return Err(invalid("save", *state));
        }

        info!(path = %self.file.location(), "saving parameters");
        if !self.file.exists() {
            warn!(path = %self.file.location(), "config file doesn't exist, a new one will be created");
        }

        let merged = self.read_back();
        self.file.write(&merged)?;
        *state = SyncState::Saved;

        report_database_size(&merged);
        Ok(merged)
    }

    /// `defaults ⊕ store`.
    fn read_back(&self) -> ParameterTable {
        self.defaults.overlay(|key| self.store.get(key))
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn invalid(operation: &'static str, state: SyncState) -> BridgeError {
    BridgeError::InvalidState {
        operation,
        state: state.to_string(),
    }
}

fn report_database_size(table: &ParameterTable) {
    let Some(dir) = table.get(WORKING_DIRECTORY) else {
        return;
    };
    let path = Path::new(dir).join(DATABASE_NAME);
    match fs::metadata(&path) {
        Ok(meta) => info!(
            path = %path.display(),
            size_mb = meta.len() / 1_000_000,
            "long-term memory database"
        ),
        Err(_) => debug!(path = %path.display(), "no long-term memory database yet"),
    }
}
