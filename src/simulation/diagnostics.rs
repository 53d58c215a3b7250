//! Run diagnostics: mass flow through vertical cuts and timing helpers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::grid::{EquationLayout, FlowNode, Grid2D};
use crate::types::GridSpacing;

/// A vertical cut `x = x0`, `y0 <= y <= y0 + dy`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct XCut {
    pub x0: f64,
    pub y0: f64,
    pub dy: f64,
}

/// Mass flow rate through `cut` per unit depth, kg/(s·m).
///
/// Sums `rho·U·dy` over the active nodes of the grid row nearest to
/// `cut.x0`. Returns `None` when the cut lies outside the grid.
pub fn mass_flow_rate_x(grid: &Grid2D<FlowNode>, cut: &XCut, spacing: GridSpacing, x_origin: f64) -> Option<f64> {
    let fi = ((cut.x0 - x_origin) / spacing.dx).round();
    if !(0.0..grid.nx() as f64).contains(&fi) {
        return None;
    }
    let i = fi as usize;

    let j0 = (cut.y0 / spacing.dy).round().max(0.0) as usize;
    let j1 = ((cut.y0 + cut.dy) / spacing.dy).round().max(0.0) as usize;
    if j0 >= grid.ny() {
        return None;
    }
    let j1 = j1.min(grid.ny() - 1);

    let flow = grid.row(i)[j0..=j1]
        .iter()
        .filter(|n| n.is_active())
        .map(|n| n.s[EquationLayout::RHO_U] * spacing.dy)
        .sum();
    Some(flow)
}

/// `1h 02m 03.4s`-style rendering of a wall-clock duration.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    let hours = (secs / 3600.0).floor();
    let minutes = ((secs - hours * 3600.0) / 60.0).floor();
    let rest = secs - hours * 3600.0 - minutes * 60.0;
    if hours > 0.0 {
        format!("{}h {:02}m {:04.1}s", hours as u64, minutes as u64, rest)
    } else if minutes > 0.0 {
        format!("{}m {:04.1}s", minutes as u64, rest)
    } else {
        format!("{:.3}s", rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{BoundaryCondition, Primitive, uniform_grid};
    use crate::types::Resolution2D;
    use approx::assert_relative_eq;

    fn stream() -> Grid2D<FlowNode> {
        let layout = EquationLayout::new(0);
        let state = Primitive {
            rho: 1.2,
            u: 10.0,
            v: 0.0,
            p: 1.0e5,
        };
        uniform_grid(&layout, Resolution2D::new(5, 11), state, &[]).unwrap()
    }

    #[test]
    fn test_mass_flow_of_uniform_stream() {
        let grid = stream();
        let h = GridSpacing::new(0.01, 0.01);
        let cut = XCut {
            x0: 0.02,
            y0: 0.0,
            dy: 0.04,
        };
        // five nodes, j = 0..=4
        let flow = mass_flow_rate_x(&grid, &cut, h, 0.0).unwrap();
        assert_relative_eq!(flow, 5.0 * 12.0 * 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_mass_flow_skips_solids_and_clips() {
        let mut grid = stream();
        grid[(2, 0)].conditions.insert(BoundaryCondition::Solid);
        let h = GridSpacing::new(0.01, 0.01);
        let cut = XCut {
            x0: 0.02,
            y0: 0.0,
            dy: 1.0,
        };
        let flow = mass_flow_rate_x(&grid, &cut, h, 0.0).unwrap();
        assert_relative_eq!(flow, 10.0 * 12.0 * 0.01, epsilon = 1e-12);

        let outside = XCut { x0: 1.0, ..cut };
        assert_eq!(mass_flow_rate_x(&grid, &outside, h, 0.0), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_duration(Duration::from_secs(62)), "1m 02.0s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03.0s");
    }
}
