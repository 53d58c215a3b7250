//! Stage2: blending feedback, commit, gradients, closure and local timestep.

use std::ops::Range;

use tracing::error;

use crate::error::{Result, SolverError};
use crate::grid::{EquationLayout, FlowNode, FlowNodeCore, Grid2D, NodeGradients, TurbulenceModel};
use crate::solver::stage1::neighbours;
use crate::solver::{BlendingSample, ResidualAggregate, SimulationContext, SolverKernel};
use crate::types::{GridCoord, GridSpacing, SubdomainRank};

/// Where a local grid sits in the global one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalRows {
    pub rank: SubdomainRank,
    /// Local rows swept by the stages.
    pub owned: (usize, usize),
    /// Global row of the first owned local row.
    pub global_start: usize,
}

impl LocalRows {
    /// A whole grid owned by one subdomain.
    pub fn whole(nx: usize) -> Self {
        Self {
            rank: SubdomainRank::ZERO,
            owned: (0, nx),
            global_start: 0,
        }
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.owned.0..self.owned.1
    }

    #[inline]
    pub fn global_coord(&self, i: usize, j: usize) -> GridCoord {
        GridCoord::new(self.global_start + i - self.owned.0, j)
    }
}

/// Run Stage2 over the owned rows of a local grid.
///
/// Gradients are computed for every active node from the pre-commit state
/// and parked in the core grid, then each node is committed, closed and
/// checked in turn. Returns the subdomain's residual aggregate, whose
/// `dt_min` is the smallest stable timestep of the swept nodes (infinite if
/// there are none).
///
/// # Errors
///
/// [`SolverError::NegativeTemperature`] as soon as a node's closure yields
/// `Tg < 0`; the sweep stops there.
pub fn stage2(
    nodes: &mut Grid2D<FlowNode>,
    core: &mut Grid2D<FlowNodeCore>,
    rows: LocalRows,
    kernel: &SolverKernel,
    ctx: &SimulationContext,
) -> Result<ResidualAggregate> {
    let layout = &kernel.layout;
    let h = kernel.spacing;

    for i in rows.range() {
        for j in 0..nodes.ny() {
            if nodes[(i, j)].is_active() {
                compute_gradients(nodes, &mut core[(i, j)], i, j, layout, h);
            }
        }
    }

    let blending = kernel.blending.as_ref();
    let uses_gradient = blending.uses_gradient();
    let uses_mach = blending.uses_mach();
    let params = kernel.closure_params(ctx);
    let mut aggregate = ResidualAggregate::new(rows.rank, layout.num_equations());

    for i in rows.range() {
        for j in 0..nodes.ny() {
            let node = &mut nodes[(i, j)];
            if !node.is_active() {
                continue;
            }
            let next = &core[(i, j)];
            let coord = rows.global_coord(i, j);
            let mach = if uses_mach { node.mach() } else { 0.0 };

            for k in 0..node.num_active_equations(layout) {
                let Some(c) = node.constraints(k, layout) else {
                    continue;
                };
                if c.fixed {
                    continue;
                }

                node.dsdx[k] = next.dsdx[k];
                node.dsdy[k] = next.dsdy[k];

                let s = node.s[k];
                if s != 0.0 {
                    let den = if EquationLayout::is_momentum(k) {
                        let ru = node.s[EquationLayout::RHO_U];
                        let rv = node.s[EquationLayout::RHO_V];
                        (ru * ru + rv * rv + 1.0e-30).sqrt()
                    } else {
                        s
                    };
                    let delta = if den.abs() > 1.0e-15 {
                        ((next.s[k] - s) / den).abs()
                    } else {
                        0.0
                    };
                    let gradient_factor = if uses_gradient {
                        let g = node.dsdx[k] * node.dsdx[k] + node.dsdy[k] * node.dsdy[k];
                        (g + 1.0e-30).sqrt() * (h.dx + h.dy) / s.abs()
                    } else {
                        0.0
                    };
                    let sample = BlendingSample {
                        delta,
                        gradient_factor,
                        mach,
                    };
                    node.beta[k] = blending.compute_beta(ctx.beta_min, node.beta[k], &sample);
                    aggregate.equations[k].record(delta, coord);
                }

                node.s[k] = next.s[k];
            }

            node.gradients = next.gradients;
            node.droydx.copy_from_slice(&next.droydx);
            node.droydy.copy_from_slice(&next.droydy);

            kernel.chemistry.apply(node, layout);
            kernel.closure.close(node, layout, &params);

            if node.tg < 0.0 || node.tg.is_nan() {
                error!(
                    tg = node.tg,
                    p = node.p,
                    dt = ctx.dt,
                    %coord,
                    subdomain = %rows.rank,
                    iteration = ctx.iteration,
                    "computational instability: negative temperature"
                );
                return Err(SolverError::NegativeTemperature {
                    coord,
                    subdomain: rows.rank,
                    iteration: ctx.iteration,
                    temperature: node.tg,
                    pressure: node.p,
                    dt: ctx.dt,
                });
            }

            let a = node.sound_speed();
            let dt_local = ctx.cfl * (h.dx / (a + node.u.abs())).min(h.dy / (a + node.v.abs()));
            aggregate.offer_dt(dt_local);
        }
    }

    Ok(aggregate)
}

/// Gradients of `U`, `V`, `Tg`, the turbulence scalars and the species
/// densities at `(i, j)`, written into `next`.
fn compute_gradients(
    nodes: &Grid2D<FlowNode>,
    next: &mut FlowNodeCore,
    i: usize,
    j: usize,
    layout: &EquationLayout,
    h: GridSpacing,
) {
    let node = &nodes[(i, j)];
    let [l, r, u, d] = neighbours(nodes, i, j);
    let (left, right, up, down) = (&nodes[l], &nodes[r], &nodes[u], &nodes[d]);

    let st = node.stencil;
    let n_n = st.span_x() as f64;
    let m_m = st.span_y() as f64;
    let dx_1 = 1.0 / h.dx;
    let dy_1 = 1.0 / h.dy;

    // Wall nodes weight each side by its stencil distance.
    let (wl, wr, wd, wu) = if node.is_wall() {
        (st.right as f64, st.left as f64, st.down as f64, st.up as f64)
    } else {
        (1.0, 1.0, 1.0, 1.0)
    };
    let ddx = |fl: f64, fr: f64| (fr * wr - fl * wl) * dx_1 / n_n;
    let ddy = |fd: f64, fu: f64| (fu * wu - fd * wd) * dy_1 / m_m;

    let mut g = NodeGradients {
        dudx: ddx(left.u, right.u),
        dvdx: ddx(left.v, right.v),
        dudy: ddy(down.u, up.u),
        dvdy: ddy(down.v, up.v),
        dtdx: (right.tg - left.tg) * dx_1 / n_n,
        dtdy: (up.tg - down.tg) * dy_1 / m_m,
        ..node.gradients
    };

    let rho = node.s[EquationLayout::RHO];
    let model = node.turbulence_model();
    if model != TurbulenceModel::None {
        let kk = layout.turb_k();
        g.dkdx = ddx(left.s[kk], right.s[kk]) / rho;
        g.dkdy = ddy(down.s[kk], up.s[kk]) / rho;
        if model == TurbulenceModel::KEpsilon {
            let ke = layout.turb_eps();
            g.depsdx = ddx(left.s[ke], right.s[ke]) / rho;
            g.depsdy = ddy(down.s[ke], up.s[ke]) / rho;
        }
    }
    next.gradients = g;

    let ns = layout.num_species();
    let species = node.constraints(EquationLayout::FIRST_SPECIES, layout);
    let zero_x = species.is_some_and(|c| c.zero_grad_x);
    let zero_y = species.is_some_and(|c| c.zero_grad_y);
    next.droydx[ns] = 0.0;
    next.droydy[ns] = 0.0;
    for (n, k) in layout.species().enumerate() {
        next.droydx[n] = if zero_x {
            0.0
        } else {
            (right.s[k] - left.s[k]) * dx_1 * 0.5
        };
        next.droydy[n] = if zero_y {
            0.0
        } else {
            (up.s[k] - down.s[k]) * dy_1 * 0.5
        };
        next.droydx[ns] += next.droydx[n];
        next.droydy[ns] += next.droydy[n];
    }
}
