//! Error types for the solver core.

use thiserror::Error;

use crate::io::OutputError;
use crate::types::{GridCoord, SubdomainRank};

/// Errors raised by the time-marching core.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Gas temperature went negative after the closure step.
    #[error(
        "negative temperature Tg={temperature:e} K at {coord} in {subdomain} \
         (iteration {iteration}, p={pressure:e} Pa, dt={dt:e} s)"
    )]
    NegativeTemperature {
        coord: GridCoord,
        subdomain: SubdomainRank,
        iteration: usize,
        temperature: f64,
        pressure: f64,
        dt: f64,
    },

    /// The globally reduced stable timestep collapsed to zero.
    #[error("global timestep is zero at iteration {iteration}")]
    ZeroTimestep { iteration: usize },

    /// A grid coordinate outside the addressed grid.
    #[error("index {coord} out of bounds for {nx}x{ny} grid")]
    IndexOutOfBounds { coord: GridCoord, nx: usize, ny: usize },

    /// Node storage could not be reserved.
    #[error("cannot allocate {nodes} nodes")]
    Allocation { nodes: usize },

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Grid cannot be split as requested.
    #[error("decomposition failed: {0}")]
    Decomposition(String),

    /// A subdomain worker stopped answering.
    #[error("worker {rank} disconnected")]
    WorkerDisconnected { rank: SubdomainRank },

    /// Snapshot, residual history or profile output failed.
    #[error(transparent)]
    Output(#[from] OutputError),

    /// Storage failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML configuration.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl SolverError {
    /// Whether the error reports a numerical blow-up rather than a resource fault.
    pub fn is_instability(&self) -> bool {
        matches!(
            self,
            SolverError::NegativeTemperature { .. } | SolverError::ZeroTimestep { .. }
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SolverError>;
