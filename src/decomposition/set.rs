//! The [`SubdomainSet`] interface and the in-process backends.

use std::sync::Arc;

use crate::error::Result;
use crate::grid::{FlowNode, Grid2D};
use crate::solver::{ResidualAggregate, SimulationContext, SolverKernel};

use super::partition::{Subdomain, exchange_all};

/// A collection of subdomains advanced in lock step.
///
/// Each call is a barrier: it returns once every subdomain has finished the
/// step. The runner drives one iteration as `stage1`, `stage2`, reduction,
/// `exchange_halos` and, for non-adiabatic walls, `wall_heat_flux`.
pub trait SubdomainSet {
    /// Number of subdomains.
    fn len(&self) -> usize;

    fn stage1(&mut self, ctx: &SimulationContext) -> Result<()>;

    /// Per-subdomain aggregates, one per subdomain in rank order.
    ///
    /// On instability every subdomain has stopped sweeping when this
    /// returns, and the error of the lowest failing rank is reported.
    fn stage2(&mut self, ctx: &SimulationContext) -> Result<Vec<ResidualAggregate>>;

    /// Refresh all ghost rows from their owners.
    fn exchange_halos(&mut self) -> Result<()>;

    fn wall_heat_flux(&mut self, dt: f64) -> Result<()>;

    /// Copy every owned row into `global`.
    fn gather(&mut self, global: &mut Grid2D<FlowNode>) -> Result<()>;

    /// Refresh every subdomain, ghosts included, from `global`.
    fn scatter(&mut self, global: &Grid2D<FlowNode>) -> Result<()>;

    /// Stop all workers. Idempotent; further calls may fail.
    fn shutdown(&mut self) {}

    fn name(&self) -> &'static str;
}

// =============================================================================
// Serial
// =============================================================================

/// All subdomains on the calling thread, in rank order.
pub struct SerialSubdomains {
    kernel: Arc<SolverKernel>,
    subdomains: Vec<Subdomain>,
}

impl SerialSubdomains {
    pub fn new(kernel: Arc<SolverKernel>, subdomains: Vec<Subdomain>) -> Self {
        Self { kernel, subdomains }
    }

    pub fn subdomains(&self) -> &[Subdomain] {
        &self.subdomains
    }
}

impl SubdomainSet for SerialSubdomains {
    fn len(&self) -> usize {
        self.subdomains.len()
    }

    fn stage1(&mut self, ctx: &SimulationContext) -> Result<()> {
        for s in &mut self.subdomains {
            s.stage1(&self.kernel, ctx);
        }
        Ok(())
    }

    fn stage2(&mut self, ctx: &SimulationContext) -> Result<Vec<ResidualAggregate>> {
        self.subdomains
            .iter_mut()
            .map(|s| s.stage2(&self.kernel, ctx))
            .collect()
    }

    fn exchange_halos(&mut self) -> Result<()> {
        exchange_all(&mut self.subdomains);
        Ok(())
    }

    fn wall_heat_flux(&mut self, dt: f64) -> Result<()> {
        for s in &mut self.subdomains {
            s.wall_heat_flux(&self.kernel, dt);
        }
        Ok(())
    }

    fn gather(&mut self, global: &mut Grid2D<FlowNode>) -> Result<()> {
        for s in &self.subdomains {
            s.gather_into(global);
        }
        Ok(())
    }

    fn scatter(&mut self, global: &Grid2D<FlowNode>) -> Result<()> {
        for s in &mut self.subdomains {
            s.scatter_from(global);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "serial"
    }
}

// =============================================================================
// Shared memory (rayon)
// =============================================================================

/// Subdomains swept concurrently on the rayon thread pool.
#[cfg(feature = "parallel")]
pub struct SharedMemorySubdomains {
    kernel: Arc<SolverKernel>,
    subdomains: Vec<Subdomain>,
}

#[cfg(feature = "parallel")]
impl SharedMemorySubdomains {
    pub fn new(kernel: Arc<SolverKernel>, subdomains: Vec<Subdomain>) -> Self {
        Self { kernel, subdomains }
    }
}

#[cfg(feature = "parallel")]
impl SubdomainSet for SharedMemorySubdomains {
    fn len(&self) -> usize {
        self.subdomains.len()
    }

    fn stage1(&mut self, ctx: &SimulationContext) -> Result<()> {
        use rayon::prelude::*;

        let kernel = &self.kernel;
        self.subdomains
            .par_iter_mut()
            .for_each(|s| s.stage1(kernel, ctx));
        Ok(())
    }

    fn stage2(&mut self, ctx: &SimulationContext) -> Result<Vec<ResidualAggregate>> {
        use rayon::prelude::*;

        let kernel = &self.kernel;
        // Collect every outcome first so the reported failure is the
        // lowest rank's, independent of scheduling.
        let results: Vec<Result<ResidualAggregate>> = self
            .subdomains
            .par_iter_mut()
            .map(|s| s.stage2(kernel, ctx))
            .collect();
        results.into_iter().collect()
    }

    fn exchange_halos(&mut self) -> Result<()> {
        exchange_all(&mut self.subdomains);
        Ok(())
    }

    fn wall_heat_flux(&mut self, dt: f64) -> Result<()> {
        use rayon::prelude::*;

        let kernel = &self.kernel;
        self.subdomains
            .par_iter_mut()
            .for_each(|s| s.wall_heat_flux(kernel, dt));
        Ok(())
    }

    fn gather(&mut self, global: &mut Grid2D<FlowNode>) -> Result<()> {
        for s in &self.subdomains {
            s.gather_into(global);
        }
        Ok(())
    }

    fn scatter(&mut self, global: &Grid2D<FlowNode>) -> Result<()> {
        use rayon::prelude::*;

        self.subdomains
            .par_iter_mut()
            .for_each(|s| s.scatter_from(global));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "shared-memory"
    }
}
