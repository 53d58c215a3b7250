//! Near-wall treatment: convective heat flux into solid neighbours, wall
//! distance and y+.

use std::ops::Range;

use tracing::debug;

use crate::grid::{EquationLayout, FlowNode, Grid2D};
use crate::types::{GridCoord, GridSpacing};

/// Update the wall heat-flux source of every owned fluid node that touches a
/// solid node.
///
/// For each solid neighbour at distance `d`:
///
/// ```text
/// lam_eff = mean(lam + lam_t) of the node and its opposite neighbour
/// Q       = -lam_eff * (T_solid - T_fluid) / d
/// ```
///
/// `Q` is averaged with the node's previous flux when that was positive.
/// The node's energy source `SrcAdd[RhoE]` is reset and then accumulates
/// `-dt * Q / d`; `q_conv` keeps the mean of the contributions.
///
/// Only neighbours inside the local grid are considered, so ghost rows must
/// be current.
pub fn wall_heat_flux(nodes: &mut Grid2D<FlowNode>, rows: Range<usize>, spacing: GridSpacing, dt: f64) {
    let (nx, ny) = (nodes.nx(), nodes.ny());
    let mut updates: Vec<(usize, usize, f64, f64)> = Vec::new();

    for i in rows {
        for j in 0..ny {
            let node = &nodes[(i, j)];
            if !node.is_active() {
                continue;
            }
            let own = node.lam + node.lam_t;
            let previous = node.q_conv;

            // (solid neighbour, opposite neighbour, distance)
            let directions = [
                (i.checked_sub(1).map(|l| (l, j)), (i + 1 < nx).then(|| (i + 1, j)), spacing.dx),
                ((i + 1 < nx).then(|| (i + 1, j)), i.checked_sub(1).map(|l| (l, j)), spacing.dx),
                (j.checked_sub(1).map(|d| (i, d)), (j + 1 < ny).then(|| (i, j + 1)), spacing.dy),
                ((j + 1 < ny).then(|| (i, j + 1)), j.checked_sub(1).map(|d| (i, d)), spacing.dy),
            ];

            let mut source = 0.0;
            let mut q_sum = 0.0;
            let mut contributions = 0usize;
            for (solid, opposite, d) in directions {
                let Some(solid) = solid.map(|s| &nodes[s]).filter(|s| s.is_solid()) else {
                    continue;
                };
                let lam_eff = match opposite.map(|o| &nodes[o]).filter(|o| !o.is_solid()) {
                    Some(o) => 0.5 * (own + o.lam + o.lam_t),
                    None => own,
                };
                let mut q = -lam_eff * (solid.tg - node.tg) / d;
                if previous > 0.0 {
                    q = 0.5 * (previous + q);
                }
                source -= dt * q / d;
                q_sum += q;
                contributions += 1;
            }

            if contributions > 0 {
                updates.push((i, j, source, q_sum / contributions as f64));
            }
        }
    }

    for (i, j, source, q) in updates {
        let node = &mut nodes[(i, j)];
        node.src_add[EquationLayout::RHO_E] = source;
        node.q_conv = q;
    }
}

/// Set `l_min` of every active node to its distance from the nearest wall
/// node, floored at `min(dx, dy)`.
///
/// Coordinates of `grid` are taken as global coordinates.
pub fn set_min_distance_to_wall(grid: &mut Grid2D<FlowNode>, walls: &[GridCoord], spacing: GridSpacing) {
    if walls.is_empty() {
        debug!("no wall nodes; wall distances left unchanged");
        return;
    }
    let min_l = spacing.min();
    let ny = grid.ny();
    for (n, node) in grid.as_mut_slice().iter_mut().enumerate() {
        if !node.is_active() {
            continue;
        }
        let here = GridCoord::new(n / ny, n % ny);
        let nearest = walls
            .iter()
            .map(|w| here.distance(*w, spacing.dx, spacing.dy))
            .fold(f64::INFINITY, f64::min);
        node.l_min = nearest.max(min_l);
    }
}

/// Friction velocity at every wall node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WallFriction {
    walls: Vec<GridCoord>,
    velocity: Vec<f64>,
}

impl WallFriction {
    /// `U_w = sqrt((|dU/dy| + |dV/dx|) * mu / rho + 1e-30)` at each wall node
    /// of a gathered grid.
    pub fn compute(grid: &Grid2D<FlowNode>, walls: &[GridCoord]) -> Self {
        let velocity = walls
            .iter()
            .map(|&w| {
                let node = &grid[w];
                let g = &node.gradients;
                let rho = node.s[EquationLayout::RHO];
                let shear = (g.dudy.abs() + g.dvdx.abs()) * node.mu;
                if rho > 0.0 {
                    (shear / rho + 1.0e-30).sqrt()
                } else {
                    0.0
                }
            })
            .collect();
        Self {
            walls: walls.to_vec(),
            velocity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.walls.is_empty()
    }

    /// Nearest wall node to `at`, its distance and friction velocity. The
    /// first wall in collection order wins ties.
    pub fn nearest(&self, at: GridCoord, spacing: GridSpacing) -> Option<(GridCoord, f64, f64)> {
        let mut best: Option<(GridCoord, f64, f64)> = None;
        for (w, &u_w) in self.walls.iter().zip(&self.velocity) {
            let d = at.distance(*w, spacing.dx, spacing.dy);
            if best.is_none_or(|(_, bd, _)| d < bd) {
                best = Some((*w, d, u_w));
            }
        }
        best
    }
}

/// Recompute `y+ = U_w * l * rho / mu` of every active node from the
/// friction velocity of its nearest wall node. `l` is the distance to that
/// node, at least `min(dx, dy)`.
pub fn recalc_y_plus(grid: &mut Grid2D<FlowNode>, friction: &WallFriction, spacing: GridSpacing) {
    if friction.is_empty() {
        return;
    }
    let min_l = spacing.min();
    let ny = grid.ny();
    for (n, node) in grid.as_mut_slice().iter_mut().enumerate() {
        if !node.is_active() || node.mu <= 0.0 {
            continue;
        }
        let here = GridCoord::new(n / ny, n % ny);
        if let Some((_, d, u_w)) = friction.nearest(here, spacing) {
            let l = d.max(min_l);
            node.y_plus = u_w * l * node.s[EquationLayout::RHO] / node.mu;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{BoundaryCondition, Primitive, uniform_grid};
    use crate::types::Resolution2D;
    use approx::assert_relative_eq;

    fn grid(nx: usize, ny: usize) -> Grid2D<FlowNode> {
        let layout = EquationLayout::new(0);
        let mut g = uniform_grid(
            &layout,
            Resolution2D::new(nx, ny),
            Primitive {
                rho: 1.0,
                u: 0.0,
                v: 0.0,
                p: 1.0e5,
            },
            &[],
        )
        .unwrap();
        for node in g.as_mut_slice() {
            node.lam = 0.02;
            node.mu = 1.8e-5;
        }
        g
    }

    #[test]
    fn test_heat_flux_into_cold_solid() {
        let h = GridSpacing::new(1.0e-3, 1.0e-3);
        let mut g = grid(3, 3);
        for j in 0..3 {
            g[(0, j)].conditions.insert(BoundaryCondition::Solid);
            g[(0, j)].tg = 300.0;
        }
        for i in 1..3 {
            for j in 0..3 {
                g[(i, j)].tg = 400.0;
            }
        }
        wall_heat_flux(&mut g, 0..3, h, 1.0e-6);

        let node = &g[(1, 1)];
        // lam_eff = 0.02, Q = -0.02 * (300 - 400) / 1e-3 = 2000 W/m²
        assert_relative_eq!(node.q_conv, 2000.0, max_relative = 1e-12);
        assert_relative_eq!(
            node.src_add[EquationLayout::RHO_E],
            -1.0e-6 * 2000.0 / 1.0e-3,
            max_relative = 1e-12
        );
        // Not adjacent to the solid.
        assert_eq!(g[(2, 1)].src_add[EquationLayout::RHO_E], 0.0);
        assert_eq!(g[(2, 1)].q_conv, 0.0);
    }

    #[test]
    fn test_heat_flux_damped_by_previous_value() {
        let h = GridSpacing::new(1.0e-3, 1.0e-3);
        let mut g = grid(2, 1);
        g[(0, 0)].conditions.insert(BoundaryCondition::Solid);
        g[(0, 0)].tg = 300.0;
        g[(1, 0)].tg = 400.0;
        g[(1, 0)].q_conv = 1000.0;
        wall_heat_flux(&mut g, 0..2, h, 1.0);
        assert_relative_eq!(g[(1, 0)].q_conv, 1500.0, max_relative = 1e-12);
    }

    #[test]
    fn test_heat_flux_source_is_reset_each_call() {
        let h = GridSpacing::new(1.0e-3, 1.0e-3);
        let mut g = grid(2, 1);
        g[(0, 0)].conditions.insert(BoundaryCondition::Solid);
        g[(0, 0)].tg = 300.0;
        g[(1, 0)].tg = 300.0;
        g[(1, 0)].src_add[EquationLayout::RHO_E] = 5.0;
        wall_heat_flux(&mut g, 0..2, h, 1.0);
        assert_eq!(g[(1, 0)].src_add[EquationLayout::RHO_E], 0.0);
    }

    #[test]
    fn test_min_distance_to_wall() {
        let h = GridSpacing::new(1.0e-3, 2.0e-3);
        let mut g = grid(4, 3);
        let walls = [GridCoord::new(0, 0)];
        set_min_distance_to_wall(&mut g, &walls, h);
        assert_eq!(g[(0, 0)].l_min, 1.0e-3);
        assert_relative_eq!(g[(3, 0)].l_min, 3.0e-3, max_relative = 1e-12);
        assert_relative_eq!(g[(0, 2)].l_min, 4.0e-3, max_relative = 1e-12);
    }

    #[test]
    fn test_y_plus_from_nearest_wall() {
        let h = GridSpacing::new(1.0e-3, 1.0e-3);
        let mut g = grid(1, 4);
        g[(0, 0)].conditions.insert(BoundaryCondition::WallNoSlip);
        g[(0, 0)].gradients.dudy = 1.0e4;
        let walls = [GridCoord::new(0, 0)];
        let friction = WallFriction::compute(&g, &walls);

        let u_w = (1.0e4 * 1.8e-5 + 1.0e-30f64).sqrt();
        recalc_y_plus(&mut g, &friction, h);
        assert_relative_eq!(g[(0, 0)].y_plus, u_w * 1.0e-3 / 1.8e-5, max_relative = 1e-12);
        assert_relative_eq!(g[(0, 3)].y_plus, u_w * 3.0e-3 / 1.8e-5, max_relative = 1e-12);
    }

    #[test]
    fn test_nearest_prefers_first_on_tie() {
        let g = grid(3, 1);
        let walls = [GridCoord::new(0, 0), GridCoord::new(2, 0)];
        let f = WallFriction::compute(&g, &walls);
        let (w, d, _) = f.nearest(GridCoord::new(1, 0), GridSpacing::new(1.0, 1.0)).unwrap();
        assert_eq!(w, GridCoord::new(0, 0));
        assert_eq!(d, 1.0);
    }
}
