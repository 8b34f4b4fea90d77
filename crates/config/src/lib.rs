// Configuration loading

pub mod job;
pub mod secrets;
pub mod settings;

use std::path::PathBuf;

/// Errors from reading config-like files (jobs, explicit settings paths).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("{0}")]
    Invalid(String),
}
