//! Per-iteration context and the immutable solver kernel shared by all
//! subdomains.

use std::fmt;
use std::sync::Arc;

use crate::grid::EquationLayout;
use crate::solver::{BlendingFunction, ChemistryModel, ClosureParams, NodeClosure, TurbulenceExtendedModel};
use crate::types::GridSpacing;

/// State of the time march threaded explicitly through both stages.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationContext {
    /// Global iteration number.
    pub iteration: usize,
    /// Simulated time, seconds.
    pub elapsed_time: f64,
    /// Timestep of this iteration.
    pub dt: f64,
    pub cfl: f64,
    /// Upper bound of the blending factor for this iteration.
    pub beta_min: f64,
    pub turbulence_active: bool,
    pub source_injection_active: bool,
}

impl SimulationContext {
    pub fn new(dt: f64, cfl: f64, beta_min: f64) -> Self {
        Self {
            iteration: 0,
            elapsed_time: 0.0,
            dt,
            cfl,
            beta_min,
            turbulence_active: false,
            source_injection_active: false,
        }
    }
}

/// Closure coefficients fixed for the whole run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosureSettings {
    pub sigma_w: f64,
    pub sigma_f: f64,
    pub extended_model: TurbulenceExtendedModel,
    pub boundary_layer_thickness: f64,
}

impl Default for ClosureSettings {
    fn default() -> Self {
        Self {
            sigma_w: 0.0,
            sigma_f: 0.0,
            extended_model: TurbulenceExtendedModel::Standard,
            boundary_layer_thickness: 0.0,
        }
    }
}

/// Everything the stages need besides the node data.
#[derive(Clone)]
pub struct SolverKernel {
    pub layout: EquationLayout,
    pub spacing: GridSpacing,
    pub blending: Arc<dyn BlendingFunction>,
    pub closure: Arc<dyn NodeClosure>,
    pub chemistry: Arc<dyn ChemistryModel>,
    pub closure_settings: ClosureSettings,
}

impl SolverKernel {
    /// Closure switches for the given iteration: flow-only before the
    /// turbulence start, turbulence-only afterwards.
    pub fn closure_params(&self, ctx: &SimulationContext) -> ClosureParams {
        let s = &self.closure_settings;
        ClosureParams {
            enable_turbulence: ctx.turbulence_active,
            enable_flow: !ctx.turbulence_active,
            sigma_w: s.sigma_w,
            sigma_f: s.sigma_f,
            extended_model: s.extended_model,
            boundary_layer_thickness: s.boundary_layer_thickness,
            source_injection: ctx.source_injection_active,
        }
    }
}

impl fmt::Debug for SolverKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolverKernel")
            .field("layout", &self.layout)
            .field("spacing", &self.spacing)
            .field("blending", &self.blending.name())
            .field("closure", &self.closure.name())
            .field("chemistry", &self.chemistry.name())
            .finish()
    }
}
