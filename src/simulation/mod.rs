//! Time-march driver.
//!
//! [`Simulation`] ties together:
//! - the solver kernel (stages, blending law, closure, chemistry)
//! - a subdomain backend selected by [`SolverConfig`]
//! - residual monitoring, progress logging and file output
//!
//! # Example
//! ```no_run
//! use deeps2d::grid::{EquationLayout, Primitive, uniform_grid};
//! use deeps2d::simulation::{Simulation, SolverConfig};
//! use deeps2d::types::Resolution2D;
//!
//! let config = SolverConfig::from_file("case.toml")?;
//! let layout = EquationLayout::new(config.num_species);
//! let air = Primitive { rho: 1.2, u: 30.0, v: 0.0, p: 1.0e5 };
//! let grid = uniform_grid(&layout, Resolution2D::new(128, 64), air, &[])?;
//!
//! let result = Simulation::new(config, grid)?.run()?;
//! println!("{:?}", result.outcome);
//! # Ok::<(), deeps2d::SolverError>(())
//! ```

mod config;
mod diagnostics;
mod runner;

pub use config::{ClosureConfig, DecompositionConfig, Monitor, OutputConfig, Schedule, SolverConfig};
pub use diagnostics::{XCut, format_duration, mass_flow_rate_x};
pub use runner::{RunObserver, RunOutcome, Simulation, SimulationResult};
