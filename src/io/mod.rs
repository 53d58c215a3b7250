//! File output: residual history, flow snapshots and wall heat-flux profiles.

mod heat_flux;
mod residual_history;
mod snapshot;

use thiserror::Error;

pub use heat_flux::{write_heat_flux_x, write_heat_flux_y};
pub use residual_history::ResidualHistory;
pub use snapshot::{GnuplotSnapshot, NullSnapshot, SnapshotFrame, SnapshotMode, SnapshotSink};

/// Error type for output operations.
#[derive(Debug, Error)]
pub enum OutputError {
    /// I/O error during file operations.
    #[error("output I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data does not match the writer's expectations.
    #[error("invalid output data: {0}")]
    InvalidData(String),
}
