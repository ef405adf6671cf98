use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load settings from {path}: {reason}")]
    Settings { path: PathBuf, reason: String },

    #[error("sensitivity must be in 0..=100, got {0}")]
    InvalidSensitivity(i64),

    #[error("invalid trace: {0}")]
    Trace(String),

    #[error("no home directory for the current user")]
    NoHome,

    #[error("settings watcher failed: {0}")]
    Watch(#[from] notify::Error),
}

impl Error {
    pub fn settings(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Settings {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
