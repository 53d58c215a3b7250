//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::grid::{EquationLayout, FlowNode, Grid2D, Primitive};
use crate::solver::{
    ClosureParams, ClosureSettings, IdealGasClosure, NoReactions, SolverKernel, StandardBlending,
};
use crate::types::GridSpacing;

pub(crate) fn air() -> Primitive {
    Primitive {
        rho: 1.0,
        u: 0.0,
        v: 0.0,
        p: 1.0e5,
    }
}

pub(crate) fn kernel(num_species: usize) -> SolverKernel {
    SolverKernel {
        layout: EquationLayout::new(num_species),
        spacing: GridSpacing::new(1.0e-3, 1.0e-3),
        blending: Arc::new(StandardBlending::Sqrt),
        closure: Arc::new(IdealGasClosure::default()),
        chemistry: Arc::new(NoReactions),
        closure_settings: ClosureSettings::default(),
    }
}

/// Run the closure over every node.
pub(crate) fn closed(kernel: &SolverKernel, mut grid: Grid2D<FlowNode>) -> Grid2D<FlowNode> {
    let params = ClosureParams::default();
    for node in grid.as_mut_slice() {
        kernel.closure.close(node, &kernel.layout, &params);
    }
    grid
}
