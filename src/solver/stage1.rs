//! Stage1: explicit/implicit blended update into the provisional buffer.
//!
//! Reads the live node grid only and writes the provisional state `S` and
//! the flux derivatives `dSdx`/`dSdy` into the [`FlowNodeCore`] grid, so a
//! sweep is independent of node visiting order.

use std::ops::Range;

use crate::grid::{FlowNode, FlowNodeCore, Grid2D};
use crate::solver::{SimulationContext, SolverKernel};

/// Local indices of the four stencil neighbours of `(i, j)`, clamped to the
/// grid.
#[inline]
pub(crate) fn neighbours(nodes: &Grid2D<FlowNode>, i: usize, j: usize) -> [(usize, usize); 4] {
    let st = nodes[(i, j)].stencil;
    let left = i.saturating_sub(st.left);
    let right = (i + st.right).min(nodes.nx() - 1);
    let down = j.saturating_sub(st.down);
    let up = (j + st.up).min(nodes.ny() - 1);
    [(left, j), (right, j), (i, up), (i, down)]
}

/// Run Stage1 over `rows` of a local grid.
///
/// For every active node and every solved, non-fixed equation:
///
/// ```text
/// next = S*beta + (1-beta)*(dxx*(S[l]+S[r]) + dyy*(S[u]+S[d]))*0.5
///        - (dt/dx * dX + dt/dy * (dY [+ F/(j+1)])) + Src*dt + SrcAdd
/// ```
///
/// where `dX`, `dY` are flux differences over the stencil, replaced by
/// neighbour interpolation under zero-gradient conditions and by the
/// neighbours' mean derivative under zero-curvature conditions.
pub fn stage1(
    nodes: &Grid2D<FlowNode>,
    core: &mut Grid2D<FlowNodeCore>,
    rows: Range<usize>,
    kernel: &SolverKernel,
    ctx: &SimulationContext,
) {
    let layout = &kernel.layout;
    let h = kernel.spacing;
    let (dxx, dyy) = (h.dxx(), h.dyy());
    let dtdx = ctx.dt / h.dx;
    let dtdy = ctx.dt / h.dy;

    for i in rows {
        for j in 0..nodes.ny() {
            let node = &nodes[(i, j)];
            if !node.is_active() {
                continue;
            }

            let [l, r, u, d] = neighbours(nodes, i, j);
            let (left, right, up, down) = (&nodes[l], &nodes[r], &nodes[u], &nodes[d]);

            let st = node.stencil;
            let (n1, n2) = (st.left as f64, st.right as f64);
            let (n3, n4) = (st.up as f64, st.down as f64);
            let n_n = st.span_x() as f64;
            let m_m = st.span_y() as f64;
            let axisymmetric = node.is_axisymmetric();

            let next = &mut core[(i, j)];

            for k in 0..node.num_active_equations(layout) {
                let Some(c) = node.constraints(k, layout) else {
                    continue;
                };
                if c.fixed {
                    continue;
                }

                let beta = node.beta[k];
                let mut current = node.s[k];

                let mut d_x = if c.zero_grad_x {
                    current = (left.s[k] * n2 + right.s[k] * n1) / n_n;
                    0.0
                } else {
                    (right.a[k] - left.a[k]) / n_n
                };
                let mut d_y = if c.zero_grad_y {
                    current = (up.s[k] * n3 + down.s[k] * n4) / m_m;
                    0.0
                } else {
                    (up.b[k] - down.b[k]) / m_m
                };
                next.dsdx[k] = d_x;
                next.dsdy[k] = d_y;

                if c.zero_curv_x {
                    d_x = (left.dsdx[k] + right.dsdx[k]) * 0.5;
                }
                if c.zero_curv_y {
                    d_y = (up.dsdy[k] + down.dsdy[k]) * 0.5;
                }
                if axisymmetric {
                    d_y += node.f[k] / (j + 1) as f64;
                }

                let implicit = (dxx * (left.s[k] + right.s[k]) + dyy * (up.s[k] + down.s[k])) * 0.5;
                next.s[k] = current * beta + (1.0 - beta) * implicit
                    - (dtdx * d_x + dtdy * d_y)
                    + node.src[k] * ctx.dt
                    + node.src_add[k];
            }
        }
    }
}
