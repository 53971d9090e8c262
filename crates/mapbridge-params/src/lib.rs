//! `mapbridge-params` – parameter synchronisation.
//!
//! # Modules
//!
//! - [`store`] – the shared [`ParamStore`] and an in-process implementation.
//! - [`file`] – the TOML-backed [`ConfigFile`].
//! - [`defaults`] – the engine's built-in parameter set.
//! - [`sync`] – [`ParamSync`], which loads, updates and saves parameter
//!   tables and announces them on the event bus.

pub mod defaults;
pub mod file;
pub mod store;
pub mod sync;

pub use defaults::default_parameters;
pub use file::{ConfigFile, TomlConfigFile};
pub use store::{MemoryParamStore, ParamStore};
pub use sync::{ParamSync, SyncState};
