//! Run configuration, loaded from TOML.
//!
//! ```toml
//! dx = 1.0e-3
//! dy = 1.0e-3
//! blending = "SQR"
//! cfl = 0.5
//! cfl_schedule = [[0, 0.1], [2000, 0.5]]
//! monitor = "max_residual"
//! exit_value = 1.0e-6
//!
//! [decomposition]
//! subdomains = 4
//! backend = { kind = "message_passing", halo = "buffered" }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::decomposition::Backend;
use crate::error::{Result, SolverError};
use crate::solver::{ClosureSettings, SourceInjection, StandardBlending, TurbulenceExtendedModel};
use crate::types::{EquationIndex, GridSpacing};

use super::diagnostics::XCut;

/// Piecewise-linear table of `(iteration, value)` points.
///
/// Held constant before the first and after the last point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    points: Vec<(usize, f64)>,
}

impl Schedule {
    /// Build from points in any order.
    pub fn new(mut points: Vec<(usize, f64)>) -> Self {
        points.sort_by_key(|p| p.0);
        Self { points }
    }

    pub fn points(&self) -> &[(usize, f64)] {
        &self.points
    }

    /// Value at `iteration`, `None` for an empty table.
    pub fn value_at(&self, iteration: usize) -> Option<f64> {
        let first = self.points.first()?;
        if iteration <= first.0 {
            return Some(first.1);
        }
        for pair in self.points.windows(2) {
            let (i0, v0) = pair[0];
            let (i1, v1) = pair[1];
            if iteration <= i1 {
                if i1 == i0 {
                    return Some(v1);
                }
                let t = (iteration - i0) as f64 / (i1 - i0) as f64;
                return Some(v0 + (v1 - v0) * t);
            }
        }
        self.points.last().map(|p| p.1)
    }

    fn is_sorted(&self) -> bool {
        self.points.windows(2).all(|w| w[0].0 <= w[1].0)
    }
}

/// Quantity compared against `exit_value` at the end of every outer cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Monitor {
    /// Largest per-equation RMS residual.
    #[default]
    MaxResidual,
    /// RMS residual of one equation.
    Equation(EquationIndex),
    /// Simulated time; the run ends once it reaches `exit_value`.
    SimulatedTime,
}

/// Turbulence closure coefficients.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosureConfig {
    pub sigma_w: f64,
    pub sigma_f: f64,
    pub extended_model: TurbulenceExtendedModel,
    pub boundary_layer_thickness: f64,
}

impl Default for ClosureConfig {
    fn default() -> Self {
        Self {
            sigma_w: 0.0,
            sigma_f: 0.0,
            extended_model: TurbulenceExtendedModel::Standard,
            boundary_layer_thickness: 0.0,
        }
    }
}

impl From<ClosureConfig> for ClosureSettings {
    fn from(c: ClosureConfig) -> Self {
        Self {
            sigma_w: c.sigma_w,
            sigma_f: c.sigma_f,
            extended_model: c.extended_model,
            boundary_layer_thickness: c.boundary_layer_thickness,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    pub subdomains: usize,
    pub backend: Backend,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            subdomains: 1,
            backend: Backend::Serial,
        }
    }
}

/// Output cadence and destinations. Unset paths disable that output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Inner iterations between progress lines and history rows.
    pub output_every: usize,
    /// Outer cycles between appended snapshots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_every: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual_history: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat_flux_x: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat_flux_y: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_every: 100,
            save_every: None,
            residual_history: None,
            snapshot: None,
            heat_flux_x: None,
            heat_flux_y: None,
        }
    }
}

/// Configuration of a time-marching run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub dx: f64,
    pub dy: f64,
    /// x-coordinate of grid row 0.
    pub x0: f64,
    pub num_species: usize,
    pub blending: StandardBlending,
    pub cfl: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfl_schedule: Option<Schedule>,
    /// Upper bound of the blending factor.
    pub beta0: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta_schedule: Option<Schedule>,
    pub monitor: Monitor,
    pub exit_value: f64,
    /// Inner iterations per outer cycle.
    pub inner_steps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cycles: Option<usize>,
    pub initial_dt: f64,
    pub adiabatic_wall: bool,
    /// First iteration with the turbulence closure enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turbulence_start: Option<usize>,
    /// Injection switches on once the iteration count exceeds this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_start: Option<usize>,
    /// Volumetric injection handed to the ideal-gas closure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injection: Option<SourceInjection>,
    pub closure: ClosureConfig,
    pub decomposition: DecompositionConfig,
    pub output: OutputConfig,
    pub x_cuts: Vec<XCut>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            dx: 1.0e-3,
            dy: 1.0e-3,
            x0: 0.0,
            num_species: 0,
            blending: StandardBlending::default(),
            cfl: 0.5,
            cfl_schedule: None,
            beta0: 0.95,
            beta_schedule: None,
            monitor: Monitor::MaxResidual,
            exit_value: 1.0e-6,
            inner_steps: 100,
            max_cycles: None,
            initial_dt: 1.0e-8,
            adiabatic_wall: true,
            turbulence_start: None,
            source_start: None,
            injection: None,
            closure: ClosureConfig::default(),
            decomposition: DecompositionConfig::default(),
            output: OutputConfig::default(),
            x_cuts: Vec::new(),
        }
    }
}

impl SolverConfig {
    /// Parse and validate.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| SolverError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SolverError::InvalidConfig(format!("{name} must be positive, got {value}")))
            }
        }

        positive("dx", self.dx)?;
        positive("dy", self.dy)?;
        positive("cfl", self.cfl)?;
        positive("initial_dt", self.initial_dt)?;
        if !(self.beta0 > 0.0 && self.beta0 <= 1.0) {
            return Err(SolverError::InvalidConfig(format!(
                "beta0 must lie in (0, 1], got {}",
                self.beta0
            )));
        }
        if self.inner_steps == 0 {
            return Err(SolverError::InvalidConfig("inner_steps must be at least 1".into()));
        }
        if self.decomposition.subdomains == 0 {
            return Err(SolverError::InvalidConfig("at least one subdomain is required".into()));
        }
        if self.output.output_every == 0 {
            return Err(SolverError::InvalidConfig("output_every must be at least 1".into()));
        }
        if self.output.save_every == Some(0) {
            return Err(SolverError::InvalidConfig("save_every must be at least 1".into()));
        }
        for (name, schedule) in [("cfl_schedule", &self.cfl_schedule), ("beta_schedule", &self.beta_schedule)] {
            if let Some(s) = schedule
                && !s.is_sorted()
            {
                return Err(SolverError::InvalidConfig(format!("{name} iterations must be ascending")));
            }
        }
        if let Some(s) = &self.cfl_schedule
            && let Some(&(it, v)) = s.points().iter().find(|p| !(p.1.is_finite() && p.1 > 0.0))
        {
            return Err(SolverError::InvalidConfig(format!(
                "cfl_schedule value at iteration {it} must be positive, got {v}"
            )));
        }
        if let Some(s) = &self.beta_schedule
            && let Some(&(it, v)) = s.points().iter().find(|p| !(p.1 > 0.0 && p.1 <= 1.0))
        {
            return Err(SolverError::InvalidConfig(format!(
                "beta_schedule value at iteration {it} must lie in (0, 1], got {v}"
            )));
        }
        if let Some(inj) = self.injection
            && !(inj.mass_rate.is_finite() && inj.total_enthalpy.is_finite())
        {
            return Err(SolverError::InvalidConfig(format!("injection must be finite, got {inj:?}")));
        }
        if let Monitor::Equation(k) = self.monitor {
            let n = crate::grid::EquationLayout::new(self.num_species).num_equations();
            if k.get() >= n {
                return Err(SolverError::InvalidConfig(format!(
                    "monitored equation {k} outside 0..{n}"
                )));
            }
        }
        Ok(())
    }

    pub fn spacing(&self) -> GridSpacing {
        GridSpacing::new(self.dx, self.dy)
    }

    /// CFL number at `iteration`: the smaller of `cfl` and its schedule.
    pub fn cfl_at(&self, iteration: usize) -> f64 {
        scheduled(self.cfl, self.cfl_schedule.as_ref(), iteration)
    }

    /// Blending bound at `iteration`: the smaller of `beta0` and its schedule.
    pub fn beta_min_at(&self, iteration: usize) -> f64 {
        scheduled(self.beta0, self.beta_schedule.as_ref(), iteration)
    }

    pub fn turbulence_active(&self, iteration: usize) -> bool {
        self.turbulence_start.is_some_and(|start| iteration >= start)
    }

    pub fn source_injection_active(&self, iteration: usize) -> bool {
        self.source_start.is_some_and(|start| iteration > start)
    }

    pub fn with_spacing(mut self, dx: f64, dy: f64) -> Self {
        self.dx = dx;
        self.dy = dy;
        self
    }

    pub fn with_species(mut self, num_species: usize) -> Self {
        self.num_species = num_species;
        self
    }

    pub fn with_blending(mut self, blending: StandardBlending) -> Self {
        self.blending = blending;
        self
    }

    pub fn with_cfl(mut self, cfl: f64) -> Self {
        self.cfl = cfl;
        self
    }

    pub fn with_beta0(mut self, beta0: f64) -> Self {
        self.beta0 = beta0;
        self
    }

    pub fn with_monitor(mut self, monitor: Monitor, exit_value: f64) -> Self {
        self.monitor = monitor;
        self.exit_value = exit_value;
        self
    }

    pub fn with_inner_steps(mut self, inner_steps: usize) -> Self {
        self.inner_steps = inner_steps;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    pub fn with_initial_dt(mut self, dt: f64) -> Self {
        self.initial_dt = dt;
        self
    }

    pub fn with_adiabatic_wall(mut self, adiabatic: bool) -> Self {
        self.adiabatic_wall = adiabatic;
        self
    }

    pub fn with_decomposition(mut self, subdomains: usize, backend: Backend) -> Self {
        self.decomposition = DecompositionConfig { subdomains, backend };
        self
    }

    pub fn with_output_every(mut self, output_every: usize) -> Self {
        self.output.output_every = output_every;
        self
    }
}

fn scheduled(base: f64, schedule: Option<&Schedule>, iteration: usize) -> f64 {
    match schedule.and_then(|s| s.value_at(iteration)) {
        Some(v) => base.min(v),
        None => base,
    }
}
