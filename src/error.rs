//! Error type shared by every stage of a simulation run

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::grid::Face;

/// Errors raised while configuring, running or exporting a simulation.
///
/// Configuration errors surface from the call that detects them; nothing is
/// retried. Numerically degenerate values are clamped instead of reported.
#[derive(Debug, Error)]
pub enum FdtdError {
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Material index {index} is out of range (model defines {count} materials)")]
    MaterialIndexOutOfRange { index: u32, count: usize },

    #[error("CPML on {face} is {thickness} cells thick but the axis only has {extent} cells")]
    CpmlTooThick {
        face: Face,
        thickness: usize,
        extent: usize,
    },

    #[error("CPML requested on {face} but the axis is periodic")]
    CpmlOnPeriodicAxis { face: Face },

    #[error("Invalid incidence: {0}")]
    InvalidIncidence(String),

    #[error("Invalid Bloch axis: {0}")]
    InvalidBlochAxis(String),

    #[error("Invalid spectrum: {0}")]
    InvalidSpectrum(String),

    #[error("Invalid sensor '{name}': {reason}")]
    InvalidSensor { name: String, reason: String },

    #[error("Engine is not ready to step (state: {state})")]
    NotReady { state: String },

    #[error("Worker pool could not be created: {0}")]
    WorkerPool(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed data in {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FdtdError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FdtdError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn sensor(name: &str, reason: impl Into<String>) -> Self {
        FdtdError::InvalidSensor {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FdtdError>;
