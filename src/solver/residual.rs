//! Residual aggregation and the global reduction across subdomains.

use crate::types::{GridCoord, SubdomainRank};

/// Running statistics of the relative change of one equation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EquationResidual {
    /// Largest relative change.
    pub max: f64,
    /// Global coordinate of `max`; the lowest coordinate wins ties.
    pub max_at: Option<GridCoord>,
    /// Sum of squared relative changes.
    pub sum_sq: f64,
    pub count: u64,
}

impl EquationResidual {
    /// Add one node's relative change.
    pub fn record(&mut self, delta: f64, at: GridCoord) {
        self.sum_sq += delta * delta;
        self.count += 1;
        self.offer_max(delta, Some(at));
    }

    fn offer_max(&mut self, value: f64, at: Option<GridCoord>) {
        let Some(at) = at else {
            return;
        };
        let better = match self.max_at {
            None => true,
            Some(current) => value > self.max || (value == self.max && at < current),
        };
        if better {
            self.max = value;
            self.max_at = Some(at);
        }
    }

    /// Fold another aggregate into this one.
    pub fn merge(&mut self, other: &EquationResidual) {
        self.sum_sq += other.sum_sq;
        self.count += other.count;
        self.offer_max(other.max, other.max_at);
    }

    /// `sqrt(sum_sq / count)`, zero when nothing was recorded.
    pub fn rms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum_sq / self.count as f64).sqrt()
        }
    }
}

/// Per-subdomain result of one Stage2 sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct ResidualAggregate {
    pub rank: SubdomainRank,
    pub equations: Vec<EquationResidual>,
    /// Smallest stable timestep of the sweep.
    pub dt_min: f64,
}

impl ResidualAggregate {
    pub fn new(rank: SubdomainRank, num_equations: usize) -> Self {
        Self {
            rank,
            equations: vec![EquationResidual::default(); num_equations],
            dt_min: f64::INFINITY,
        }
    }

    #[inline]
    pub fn offer_dt(&mut self, dt: f64) {
        self.dt_min = self.dt_min.min(dt);
    }
}

/// Globally reduced residuals and timestep of one iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalResiduals {
    pub equations: Vec<EquationResidual>,
    pub dt_min: f64,
}

impl GlobalResiduals {
    pub fn empty(num_equations: usize) -> Self {
        Self {
            equations: vec![EquationResidual::default(); num_equations],
            dt_min: f64::INFINITY,
        }
    }

    #[inline]
    pub fn rms(&self, k: usize) -> f64 {
        self.equations[k].rms()
    }

    /// Equation with the largest RMS residual and that RMS; the lowest
    /// equation index wins ties.
    pub fn max_rms(&self) -> (usize, f64) {
        let mut best = (0, 0.0);
        for (k, eq) in self.equations.iter().enumerate() {
            let rms = eq.rms();
            if rms > best.1 {
                best = (k, rms);
            }
        }
        best
    }
}

/// Combine per-subdomain aggregates.
///
/// Aggregates are folded in rank order whatever order they arrive in, so the
/// floating-point sums (and hence the result) do not depend on arrival
/// order.
pub fn reduce_residuals(mut parts: Vec<ResidualAggregate>) -> GlobalResiduals {
    parts.sort_by_key(|p| p.rank);
    let num_equations = parts.iter().map(|p| p.equations.len()).max().unwrap_or(0);
    let mut global = GlobalResiduals::empty(num_equations);
    for part in &parts {
        for (acc, eq) in global.equations.iter_mut().zip(&part.equations) {
            acc.merge(eq);
        }
        global.dt_min = global.dt_min.min(part.dt_min);
    }
    global
}
