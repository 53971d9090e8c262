//! The mapping engine as seen by the bridge.

use mapbridge_middleware::EventHandler;
use mapbridge_types::ParameterTable;

/// A mapping engine attached to the bridge.
///
/// The engine consumes `FrameIngested`, `ControlCommand`, `ConfigUpdated` and
/// `ConfigLoaded` events through its [`EventHandler`] implementation and
/// answers with `EngineResult` events posted on the same bus. It never sees
/// the bridge itself, so tests substitute mock engines freely.
pub trait Engine: EventHandler {
    /// The parameter set this engine understands. Only these keys are ever
    /// loaded, pushed or saved.
    fn default_parameters(&self) -> ParameterTable {
        mapbridge_params::default_parameters()
    }
}
