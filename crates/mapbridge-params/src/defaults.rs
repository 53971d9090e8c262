//! The engine's built-in parameter set.
//!
//! These keys define which parameters exist. Config files and the store can
//! only override values for keys listed here.

use std::path::PathBuf;

use mapbridge_types::ParameterTable;

/// Directory holding the engine's long-term memory database.
pub const WORKING_DIRECTORY: &str = "Core/WorkingDirectory";

/// File name of the long-term memory database inside [`WORKING_DIRECTORY`].
pub const DATABASE_NAME: &str = "LTM.db";

const DEFAULTS: &[(&str, &str)] = &[
    ("Core/LoopThr", "0.11"),
    ("Core/MaxRetrieved", "2"),
    ("Core/TimeThr", "0"),
    ("Core/PublishStats", "true"),
    ("Core/PublishImage", "true"),
    ("Bayes/PredictionLC", "0.1 0.36 0.30 0.16 0.062 0.0151 0.00255 0.000324 2.5e-05 1.3e-06 4.8e-08 1.2e-09 1.9e-11 2.2e-13 1.7e-15 8.5e-18 2.9e-20 6.9e-23"),
    ("Bayes/VirtualPlacePriorThr", "0.9"),
    ("Kp/DetectorStrategy", "0"),
    ("Kp/MaxFeatures", "400"),
    ("Kp/NndrRatio", "0.8"),
    ("Kp/IncrementalDictionary", "true"),
    ("Mem/STMSize", "10"),
    ("Mem/RehearsalSimilarity", "0.2"),
    ("Mem/IncrementalMemory", "true"),
    ("Mem/NotLinkedNodesKept", "true"),
];

/// Built-in default parameters, including a working directory under the
/// user's home.
pub fn default_parameters() -> ParameterTable {
    let mut table: ParameterTable = DEFAULTS.iter().copied().collect();
    table.insert(
        WORKING_DIRECTORY,
        default_working_directory().display().to_string(),
    );
    table
}

/// `$HOME/.mapbridge`, falling back to the current directory.
pub fn default_working_directory() -> PathBuf {
    PathBuf::from(
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
    .join(".mapbridge")
}
