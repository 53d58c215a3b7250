//! DEEPS time-marching kernels.
//!
//! One iteration of the scheme on a (sub)grid is:
//! 1. [`stage1`] - blended explicit/implicit update into the provisional
//!    [`FlowNodeCore`](crate::grid::FlowNodeCore) buffer
//! 2. [`stage2`] - relative change, blending feedback, commit, gradients,
//!    chemistry and closure, negative-temperature check, local CFL timestep
//! 3. [`reduce_residuals`] across subdomains
//! 4. [`wall_heat_flux`] once ghost rows are current

pub mod blending;
mod closure;
mod context;
mod residual;
mod stage1;
mod stage2;
mod wall;

#[cfg(test)]
pub(crate) mod test_support;

pub use blending::{BlendingFunction, BlendingSample, BoxedBlending, StandardBlending, create_blending};
pub use closure::{
    ChemistryModel, ClosureParams, IdealGasClosure, NoReactions, NodeClosure, SourceInjection,
    TurbulenceExtendedModel,
};
pub use context::{ClosureSettings, SimulationContext, SolverKernel};
pub use residual::{EquationResidual, GlobalResiduals, ResidualAggregate, reduce_residuals};
pub use stage1::stage1;
pub use stage2::{LocalRows, stage2};
pub use wall::{WallFriction, recalc_y_plus, set_min_distance_to_wall, wall_heat_flux};
