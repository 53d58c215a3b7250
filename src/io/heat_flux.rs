//! Wall heat-flux profiles.

use std::io::Write;

use super::OutputError;
use crate::grid::{FlowNode, Grid2D};
use crate::types::GridSpacing;

fn solid_neighbour_y(grid: &Grid2D<FlowNode>, i: usize, j: usize) -> bool {
    (j > 0 && grid[(i, j - 1)].is_solid()) || (j + 1 < grid.ny() && grid[(i, j + 1)].is_solid())
}

fn solid_neighbour_x(grid: &Grid2D<FlowNode>, i: usize, j: usize) -> bool {
    (i > 0 && grid[(i - 1, j)].is_solid()) || (i + 1 < grid.nx() && grid[(i + 1, j)].is_solid())
}

/// Write `x y q_conv Tg` for every fluid node with a solid neighbour along
/// y, walking rows in increasing x.
pub fn write_heat_flux_x<W: Write>(
    w: &mut W,
    grid: &Grid2D<FlowNode>,
    spacing: GridSpacing,
    x0: f64,
) -> Result<usize, OutputError> {
    writeln!(w, "# x y Qconv Tg")?;
    let mut written = 0;
    for i in 0..grid.nx() {
        for j in 0..grid.ny() {
            let node = &grid[(i, j)];
            if node.is_active() && solid_neighbour_y(grid, i, j) {
                let x = x0 + i as f64 * spacing.dx;
                writeln!(w, "{:e} {:e} {:e} {:e}", x, j as f64 * spacing.dy, node.q_conv, node.tg)?;
                written += 1;
            }
        }
    }
    Ok(written)
}

/// Write `y x q_conv Tg` for every fluid node with a solid neighbour along
/// x, walking columns in increasing y.
pub fn write_heat_flux_y<W: Write>(
    w: &mut W,
    grid: &Grid2D<FlowNode>,
    spacing: GridSpacing,
    x0: f64,
) -> Result<usize, OutputError> {
    writeln!(w, "# y x Qconv Tg")?;
    let mut written = 0;
    for j in 0..grid.ny() {
        for i in 0..grid.nx() {
            let node = &grid[(i, j)];
            if node.is_active() && solid_neighbour_x(grid, i, j) {
                let x = x0 + i as f64 * spacing.dx;
                writeln!(w, "{:e} {:e} {:e} {:e}", j as f64 * spacing.dy, x, node.q_conv, node.tg)?;
                written += 1;
            }
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{BoundaryCondition, EquationLayout, Primitive, uniform_grid};
    use crate::types::Resolution2D;

    fn channel() -> Grid2D<FlowNode> {
        let layout = EquationLayout::new(1);
        let state = Primitive {
            rho: 1.0,
            u: 0.0,
            v: 0.0,
            p: 1.0e5,
        };
        let mut grid = uniform_grid(&layout, Resolution2D::new(4, 3), state, &[1.0]).unwrap();
        for i in 0..4 {
            grid[(i, 0)].conditions.insert(BoundaryCondition::Solid);
            grid[(i, 1)].q_conv = 100.0 * i as f64;
        }
        grid
    }

    #[test]
    fn test_heat_flux_x_profile() {
        let grid = channel();
        let mut out = Vec::new();
        let n = write_heat_flux_x(&mut out, &grid, GridSpacing::new(0.1, 0.1), 0.0).unwrap();
        assert_eq!(n, 4);
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows.len(), 4);
        let q: f64 = rows[3].split_whitespace().nth(2).unwrap().parse().unwrap();
        assert_eq!(q, 300.0);
    }

    #[test]
    fn test_heat_flux_y_without_side_walls_is_empty() {
        let grid = channel();
        let mut out = Vec::new();
        let n = write_heat_flux_y(&mut out, &grid, GridSpacing::new(0.1, 0.1), 0.0).unwrap();
        assert_eq!(n, 0);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }
}
