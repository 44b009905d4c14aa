use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading, saving, or mutating the script registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("script {field} must not be empty")]
    Validation { field: &'static str },

    #[error("failed to read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize config")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write config {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the process supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to launch '{name}'")]
    Launch {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{name}' is not running")]
    NotRunning { name: String },

    #[error("'{name}' is already running")]
    AlreadyRunning { name: String },
}
