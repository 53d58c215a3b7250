//! Simulation runner: the outer convergence loop around the inner time march.

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::error::{Result, SolverError};
use crate::grid::{BoundaryCondition, EquationLayout, FlowNode, Grid2D, collect_wall_nodes};
use crate::io::{
    GnuplotSnapshot, NullSnapshot, ResidualHistory, SnapshotFrame, SnapshotMode, SnapshotSink,
    write_heat_flux_x, write_heat_flux_y,
};
use crate::solver::{
    BlendingFunction, ChemistryModel, GlobalResiduals, IdealGasClosure, NoReactions, NodeClosure,
    SimulationContext, SolverKernel, WallFriction, recalc_y_plus, reduce_residuals,
    set_min_distance_to_wall,
};

use super::config::{Monitor, SolverConfig};
use super::diagnostics::{format_duration, mass_flow_rate_x};

// =============================================================================
// Run Outcome
// =============================================================================

/// Why a run ended without error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The monitored quantity reached the exit value.
    Converged,
    /// The interrupt flag was raised.
    Interrupted,
    /// `max_cycles` outer cycles ran without convergence.
    MaxCyclesReached,
}

/// Result of a simulation run.
#[derive(Clone, Debug)]
pub struct SimulationResult {
    pub outcome: RunOutcome,
    /// Inner iterations performed.
    pub iterations: usize,
    /// Completed outer cycles.
    pub cycles: usize,
    /// Simulated time reached, seconds.
    pub elapsed_time: f64,
    /// Timestep the next iteration would use.
    pub final_dt: f64,
    /// Total wall-clock time in seconds.
    pub wall_time: f64,
    /// Residuals of the last iteration.
    pub residuals: GlobalResiduals,
}

impl SimulationResult {
    pub fn converged(&self) -> bool {
        self.outcome == RunOutcome::Converged
    }
}

// =============================================================================
// Observer
// =============================================================================

/// Hooks into a running simulation. All methods default to no-ops.
pub trait RunObserver {
    /// Called on every output step, after the residual history row.
    fn on_progress(&mut self, _ctx: &SimulationContext, _residuals: &GlobalResiduals) {}

    /// Called after each outer cycle with the gathered global grid.
    fn on_cycle(&mut self, _cycle: usize, _grid: &Grid2D<FlowNode>) {}

    /// Called exactly once when the run fails.
    fn on_abort(&mut self, _error: &SolverError) {}
}

struct Silent;

impl RunObserver for Silent {}

// =============================================================================
// Simulation Runner
// =============================================================================

/// High-level simulation runner.
///
/// Owns the global grid; during a run the grid is split over a
/// [`SubdomainSet`](crate::decomposition::SubdomainSet) and gathered back at
/// the end of every outer cycle.
///
/// # Example
///
/// ```no_run
/// use deeps2d::grid::{EquationLayout, Primitive, uniform_grid};
/// use deeps2d::simulation::{Simulation, SolverConfig};
/// use deeps2d::types::Resolution2D;
///
/// let config = SolverConfig::default().with_inner_steps(50).with_max_cycles(4);
/// let layout = EquationLayout::new(config.num_species);
/// let air = Primitive { rho: 1.2, u: 30.0, v: 0.0, p: 1.0e5 };
/// let grid = uniform_grid(&layout, Resolution2D::new(64, 32), air, &[])?;
///
/// let mut sim = Simulation::new(config, grid)?;
/// let result = sim.run()?;
/// println!("{:?} after {} iterations", result.outcome, result.iterations);
/// # Ok::<(), deeps2d::SolverError>(())
/// ```
pub struct Simulation {
    config: SolverConfig,
    layout: EquationLayout,
    grid: Grid2D<FlowNode>,
    blending: Arc<dyn BlendingFunction>,
    closure: Arc<dyn NodeClosure>,
    chemistry: Arc<dyn ChemistryModel>,
    snapshot: Box<dyn SnapshotSink>,
    history: Option<ResidualHistory>,
    interrupt: Arc<AtomicBool>,
}

impl Simulation {
    /// Validate `config` against `grid` and set up the default
    /// collaborators: the configured blending law, an ideal-gas closure,
    /// frozen chemistry and the configured snapshot file.
    pub fn new(config: SolverConfig, grid: Grid2D<FlowNode>) -> Result<Self> {
        config.validate()?;
        let layout = EquationLayout::new(config.num_species);
        let n = layout.num_equations();
        if let Some(node) = grid.as_slice().iter().find(|node| node.s.len() != n) {
            return Err(SolverError::InvalidConfig(format!(
                "grid nodes carry {} equations, {} species need {}",
                node.s.len(),
                config.num_species,
                n
            )));
        }

        let snapshot: Box<dyn SnapshotSink> = match &config.output.snapshot {
            Some(path) => Box::new(GnuplotSnapshot::new(path.clone())),
            None => Box::new(NullSnapshot),
        };
        let injection = config.injection;
        Ok(Self {
            blending: Arc::new(config.blending),
            config,
            layout,
            grid,
            closure: Arc::new(IdealGasClosure {
                injection,
                ..IdealGasClosure::default()
            }),
            chemistry: Arc::new(NoReactions),
            snapshot,
            history: None,
            interrupt: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_closure(mut self, closure: impl NodeClosure + 'static) -> Self {
        self.closure = Arc::new(closure);
        self
    }

    pub fn with_chemistry(mut self, chemistry: impl ChemistryModel + 'static) -> Self {
        self.chemistry = Arc::new(chemistry);
        self
    }

    /// Replace the configured blending law.
    pub fn with_blending(mut self, blending: impl BlendingFunction + 'static) -> Self {
        self.blending = Arc::new(blending);
        self
    }

    pub fn with_snapshot_sink(mut self, sink: impl SnapshotSink + 'static) -> Self {
        self.snapshot = Box::new(sink);
        self
    }

    /// Use `history` instead of the configured residual history file.
    pub fn with_residual_history(mut self, history: ResidualHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Flag checked before every inner iteration; raising it ends the run
    /// with [`RunOutcome::Interrupted`].
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn layout(&self) -> &EquationLayout {
        &self.layout
    }

    /// The global grid, current as of the last gathered cycle.
    pub fn grid(&self) -> &Grid2D<FlowNode> {
        &self.grid
    }

    pub fn into_grid(self) -> Grid2D<FlowNode> {
        self.grid
    }

    pub fn run(&mut self) -> Result<SimulationResult> {
        self.run_with_observer(&mut Silent)
    }

    /// Run until convergence, interruption, `max_cycles` or a fatal error.
    ///
    /// # Errors
    ///
    /// Numerical instability ([`SolverError::NegativeTemperature`],
    /// [`SolverError::ZeroTimestep`]), decomposition, worker and output
    /// failures. Every worker is stopped before the error is returned and
    /// `observer.on_abort` is called once.
    pub fn run_with_observer(&mut self, observer: &mut dyn RunObserver) -> Result<SimulationResult> {
        match self.march(observer) {
            Ok(result) => Ok(result),
            Err(err) => {
                error!(error = %err, "run aborted");
                observer.on_abort(&err);
                Err(err)
            }
        }
    }

    fn kernel(&self) -> SolverKernel {
        SolverKernel {
            layout: self.layout,
            spacing: self.config.spacing(),
            blending: Arc::clone(&self.blending),
            closure: Arc::clone(&self.closure),
            chemistry: Arc::clone(&self.chemistry),
            closure_settings: self.config.closure.into(),
        }
    }

    fn refresh_context(&self, ctx: &mut SimulationContext) {
        let it = ctx.iteration;
        ctx.cfl = self.config.cfl_at(it);
        ctx.beta_min = self.config.beta_min_at(it);
        ctx.turbulence_active = self.config.turbulence_active(it);
        ctx.source_injection_active = self.config.source_injection_active(it);
    }

    fn march(&mut self, observer: &mut dyn RunObserver) -> Result<SimulationResult> {
        let wall_clock = Instant::now();
        let config = self.config.clone();
        let spacing = config.spacing();
        let kernel = Arc::new(self.kernel());

        let mut ctx = SimulationContext::new(config.initial_dt, config.cfl, config.beta0);
        self.refresh_context(&mut ctx);

        let walls = collect_wall_nodes(&self.grid);
        set_min_distance_to_wall(&mut self.grid, &walls, spacing);
        let params = kernel.closure_params(&ctx);
        for node in self.grid.as_mut_slice() {
            if node.conditions.has(BoundaryCondition::NodeIsSet) {
                self.closure.close(node, &self.layout, &params);
            }
        }

        let mut set = config
            .decomposition
            .backend
            .build(&self.grid, config.decomposition.subdomains, kernel)?;

        let mut history = match self.history.take() {
            Some(h) => Some(h),
            None => match &config.output.residual_history {
                Some(path) => Some(ResidualHistory::create(path, &self.layout.equation_names())?),
                None => None,
            },
        };

        info!(
            grid = %self.grid.resolution(),
            subdomains = set.len(),
            blending = self.blending.name(),
            closure = self.closure.name(),
            chemistry = self.chemistry.name(),
            "starting time march"
        );

        let mut residuals = GlobalResiduals::empty(self.layout.num_equations());
        let mut cycles = 0;

        let outcome = 'outer: loop {
            let cycle_start = Instant::now();
            let mut block_start = Instant::now();
            let mut block_steps = 0usize;

            for _ in 0..config.inner_steps {
                if self.interrupt.load(Ordering::Relaxed) {
                    break 'outer RunOutcome::Interrupted;
                }
                self.refresh_context(&mut ctx);

                set.stage1(&ctx)?;
                residuals = reduce_residuals(set.stage2(&ctx)?);
                if residuals.dt_min <= 0.0 {
                    error!(iteration = ctx.iteration, "computational instability: zero global timestep");
                    return Err(SolverError::ZeroTimestep {
                        iteration: ctx.iteration,
                    });
                }
                set.exchange_halos()?;
                if !config.adiabatic_wall {
                    set.wall_heat_flux(ctx.dt)?;
                }

                ctx.elapsed_time += ctx.dt;
                ctx.iteration += 1;
                if residuals.dt_min.is_finite() {
                    ctx.dt = residuals.dt_min;
                }
                block_steps += 1;

                if ctx.iteration % config.output.output_every == 0 {
                    let block = block_start.elapsed().as_secs_f64();
                    let step_time = block / block_steps as f64;
                    let (k, rms) = monitored(config.monitor, &residuals);
                    info!(
                        step = ctx.iteration,
                        equation = %self.layout.equation_name(k),
                        residual_pct = rms * 100.0,
                        step_time,
                        steps_per_sec = if block > 0.0 { block_steps as f64 / block } else { 0.0 },
                        dt = ctx.dt,
                        "progress"
                    );
                    if let Some(h) = history.as_mut() {
                        h.write_row(ctx.iteration, &residuals)?;
                        h.flush()?;
                    }
                    observer.on_progress(&ctx, &residuals);
                    block_start = Instant::now();
                    block_steps = 0;
                }
            }

            cycles += 1;
            set.gather(&mut self.grid)?;
            let friction = WallFriction::compute(&self.grid, &walls);
            recalc_y_plus(&mut self.grid, &friction, spacing);
            self.log_cuts();

            self.write_snapshot(&ctx, SnapshotMode::Overwrite)?;
            if config.output.save_every.is_some_and(|every| cycles % every == 0) {
                self.write_snapshot(&ctx, SnapshotMode::Append)?;
            }

            let cycle_time = cycle_start.elapsed();
            let secs = cycle_time.as_secs_f64();
            info!(
                cycle = cycles,
                time = %format_duration(cycle_time),
                steps_per_sec = if secs > 0.0 { config.inner_steps as f64 / secs } else { 0.0 },
                "computation cycle finished"
            );
            observer.on_cycle(cycles, &self.grid);
            set.scatter(&self.grid)?;

            if self.is_converged(&ctx, &residuals) {
                break RunOutcome::Converged;
            }
            if config.max_cycles.is_some_and(|max| cycles >= max) {
                break RunOutcome::MaxCyclesReached;
            }
        };

        if outcome == RunOutcome::Interrupted {
            set.gather(&mut self.grid)?;
            info!(iteration = ctx.iteration, "interrupted by user");
        }
        self.write_snapshot(&ctx, SnapshotMode::Overwrite)?;
        self.write_heat_flux()?;
        if let Some(mut h) = history {
            h.flush()?;
        }
        set.shutdown();

        let wall_time = wall_clock.elapsed();
        info!(
            ?outcome,
            iterations = ctx.iteration,
            cycles,
            simulated_time = ctx.elapsed_time,
            wall_time = %format_duration(wall_time),
            "time march finished"
        );

        Ok(SimulationResult {
            outcome,
            iterations: ctx.iteration,
            cycles,
            elapsed_time: ctx.elapsed_time,
            final_dt: ctx.dt,
            wall_time: wall_time.as_secs_f64(),
            residuals,
        })
    }

    fn is_converged(&self, ctx: &SimulationContext, residuals: &GlobalResiduals) -> bool {
        match self.config.monitor {
            Monitor::SimulatedTime => ctx.elapsed_time >= self.config.exit_value,
            monitor => monitored_residual(monitor, residuals) < self.config.exit_value,
        }
    }

    fn log_cuts(&self) {
        let spacing = self.config.spacing();
        for (n, cut) in self.config.x_cuts.iter().enumerate() {
            match mass_flow_rate_x(&self.grid, cut, spacing, self.config.x0) {
                Some(flow) => info!(
                    cut = n + 1,
                    x = cut.x0,
                    y = cut.y0,
                    dy = cut.dy,
                    mass_flow = flow,
                    "mass flow rate (kg/s/m)"
                ),
                None => warn!(cut = n + 1, x = cut.x0, "cut lies outside the grid"),
            }
        }
    }

    fn write_snapshot(&mut self, ctx: &SimulationContext, mode: SnapshotMode) -> Result<()> {
        let frame = SnapshotFrame {
            grid: &self.grid,
            layout: &self.layout,
            spacing: self.config.spacing(),
            x0: self.config.x0,
            iteration: ctx.iteration,
            time: ctx.elapsed_time,
        };
        self.snapshot.write_snapshot(&frame, mode)?;
        debug!(?mode, iteration = ctx.iteration, "snapshot written");
        Ok(())
    }

    fn write_heat_flux(&self) -> Result<()> {
        let spacing = self.config.spacing();
        if let Some(path) = &self.config.output.heat_flux_x {
            let mut w = BufWriter::new(File::create(path)?);
            write_heat_flux_x(&mut w, &self.grid, spacing, self.config.x0)?;
        }
        if let Some(path) = &self.config.output.heat_flux_y {
            let mut w = BufWriter::new(File::create(path)?);
            write_heat_flux_y(&mut w, &self.grid, spacing, self.config.x0)?;
        }
        Ok(())
    }
}

/// Monitored equation and its RMS residual.
fn monitored(monitor: Monitor, residuals: &GlobalResiduals) -> (usize, f64) {
    match monitor {
        Monitor::Equation(k) => (k.get(), residuals.rms(k.get())),
        Monitor::MaxResidual | Monitor::SimulatedTime => residuals.max_rms(),
    }
}

fn monitored_residual(monitor: Monitor, residuals: &GlobalResiduals) -> f64 {
    monitored(monitor, residuals).1
}
