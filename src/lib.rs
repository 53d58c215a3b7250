//! # deeps2d
//!
//! Time-marching core of a 2D compressible, reacting, turbulent flow solver
//! built on DEEPS, a density-based hybrid explicit/implicit scheme.
//!
//! This crate provides:
//! - A structured grid of flow nodes with typed boundary and turbulence conditions
//! - The two-stage update (`stage1`, `stage2`) with an adaptive blending factor
//! - Eleven blending laws between the explicit and implicit treatment
//! - Residual monitoring and a CFL-limited global timestep
//! - Decomposition along x with one-row halo exchange, on serial,
//!   rayon and message-passing backends
//! - Near-wall heat flux, wall distance and y+
//! - A configurable run driver with residual history and snapshot output

pub mod decomposition;
pub mod error;
pub mod grid;
pub mod io;
pub mod simulation;
pub mod solver;
pub mod types;

pub use decomposition::{Backend, HaloMode, Partition, SubdomainSet};
pub use error::{Result, SolverError};
pub use grid::{
    BoundaryCondition, ConditionSet, EquationLayout, FlowNode, FlowNodeCore, Grid2D, Primitive,
    TurbulenceCondition, TurbulenceModel, uniform_grid,
};
pub use io::{GnuplotSnapshot, OutputError, ResidualHistory, SnapshotMode, SnapshotSink};
pub use simulation::{
    Monitor, RunObserver, RunOutcome, Schedule, Simulation, SimulationResult, SolverConfig,
};
pub use solver::{
    BlendingFunction, ChemistryModel, GlobalResiduals, IdealGasClosure, NoReactions, NodeClosure,
    SimulationContext, SolverKernel, StandardBlending, stage1, stage2,
};
pub use types::{EquationIndex, GridCoord, GridSpacing, Resolution2D, SubdomainRank};
