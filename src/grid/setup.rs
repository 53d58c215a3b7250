//! Grid initialisation helpers.

use tracing::debug;

use crate::error::Result;
use crate::grid::{
    BoundaryCondition, EquationLayout, FlowNode, Grid2D, Primitive, StencilDistances,
};
use crate::types::{GridCoord, Resolution2D};

/// Set stencil distances for a rectangular grid: 1 towards every existing
/// neighbour, 0 at the grid edges.
pub fn init_stencil_distances(grid: &mut Grid2D<FlowNode>) {
    let (nx, ny) = (grid.nx(), grid.ny());
    for i in 0..nx {
        for (j, node) in grid.row_mut(i).iter_mut().enumerate() {
            node.stencil = StencilDistances {
                left: usize::from(i > 0),
                right: usize::from(i + 1 < nx),
                up: usize::from(j + 1 < ny),
                down: usize::from(j > 0),
            };
        }
    }
}

/// Coordinates of all no-slip and wall-law nodes in storage order.
pub fn collect_wall_nodes(grid: &Grid2D<FlowNode>) -> Vec<GridCoord> {
    let walls: Vec<GridCoord> = grid
        .iter_coords()
        .filter(|(_, node)| node.is_wall())
        .map(|(c, _)| c)
        .collect();
    debug!(count = walls.len(), "collected wall nodes");
    walls
}

/// A grid of set nodes holding one uniform primitive state.
///
/// Fluxes and transport properties are not filled; run the closure over the
/// grid before the first step.
pub fn uniform_grid(
    layout: &EquationLayout,
    resolution: Resolution2D,
    state: Primitive,
    mass_fractions: &[f64],
) -> Result<Grid2D<FlowNode>> {
    let mut node = FlowNode::new(layout);
    node.conditions.insert(BoundaryCondition::NodeIsSet);
    node.set_primitive(layout, state, mass_fractions);

    let mut grid = Grid2D::filled(resolution, node)?;
    init_stencil_distances(&mut grid);
    Ok(grid)
}
