//! Split of the grid into x-row subdomains with one-row ghosts.

use std::ops::Range;

use tracing::debug;

use crate::error::{Result, SolverError};
use crate::grid::{FlowNode, FlowNodeCore, Grid2D};
use crate::solver::{
    LocalRows, ResidualAggregate, SimulationContext, SolverKernel, stage1, stage2, wall_heat_flux,
};
use crate::types::{Resolution2D, SubdomainRank};

/// Owned global row ranges of each subdomain.
///
/// The first `nx % n` subdomains get one extra row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    owned: Vec<Range<usize>>,
}

impl Partition {
    /// Split `nx` rows into `parts` contiguous ranges.
    pub fn split(resolution: Resolution2D, parts: usize) -> Result<Self> {
        let nx = resolution.nx();
        if parts == 0 {
            return Err(SolverError::Decomposition(
                "number of subdomains must be positive".to_string(),
            ));
        }
        if parts > nx {
            return Err(SolverError::Decomposition(format!(
                "cannot split {} rows into {} subdomains",
                nx, parts
            )));
        }

        let base = nx / parts;
        let remainder = nx % parts;
        let mut owned = Vec::with_capacity(parts);
        let mut start = 0;
        for rank in 0..parts {
            let len = base + usize::from(rank < remainder);
            owned.push(start..start + len);
            start += len;
        }
        Ok(Self { owned })
    }

    pub fn len(&self) -> usize {
        self.owned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }

    /// Global rows owned by `rank`.
    pub fn owned(&self, rank: SubdomainRank) -> Range<usize> {
        self.owned[rank].clone()
    }

    /// Rank owning global row `i`.
    pub fn owner_of(&self, i: usize) -> Option<SubdomainRank> {
        self.owned
            .iter()
            .position(|r| r.contains(&i))
            .map(SubdomainRank::new)
    }

    /// Build all subdomains from a global grid.
    pub fn subdomains(&self, global: &Grid2D<FlowNode>, core_template: &FlowNodeCore) -> Result<Vec<Subdomain>> {
        (0..self.len())
            .map(|r| Subdomain::from_global(global, self, SubdomainRank::new(r), core_template))
            .collect()
    }
}

/// One contiguous slab of rows plus its ghost rows.
#[derive(Clone, Debug)]
pub struct Subdomain {
    rows: LocalRows,
    has_lower: bool,
    has_upper: bool,
    nodes: Grid2D<FlowNode>,
    core: Grid2D<FlowNodeCore>,
}

impl Subdomain {
    /// Copy the owned rows of `rank`, and its ghost rows, out of `global`.
    pub fn from_global(
        global: &Grid2D<FlowNode>,
        partition: &Partition,
        rank: SubdomainRank,
        core_template: &FlowNodeCore,
    ) -> Result<Self> {
        let owned = partition.owned(rank);
        let has_lower = rank.get() > 0;
        let has_upper = rank.get() + 1 < partition.len();
        let first = owned.start - usize::from(has_lower);
        let last = owned.end + usize::from(has_upper);
        let local_nx = last - first;
        let resolution = Resolution2D::new(local_nx, global.ny());

        let nodes = Grid2D::from_vec(resolution, global.rows(first..last).to_vec())?;
        let core = Grid2D::filled(resolution, core_template.clone())?;
        let lower = usize::from(has_lower);
        debug!(%rank, rows = ?owned, "subdomain created");

        Ok(Self {
            rows: LocalRows {
                rank,
                owned: (lower, lower + owned.len()),
                global_start: owned.start,
            },
            has_lower,
            has_upper,
            nodes,
            core,
        })
    }

    #[inline]
    pub fn rank(&self) -> SubdomainRank {
        self.rows.rank
    }

    pub fn local_rows(&self) -> LocalRows {
        self.rows
    }

    /// Global rows owned by this subdomain.
    pub fn owned_global(&self) -> Range<usize> {
        let len = self.rows.owned.1 - self.rows.owned.0;
        self.rows.global_start..self.rows.global_start + len
    }

    pub fn nodes(&self) -> &Grid2D<FlowNode> {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut Grid2D<FlowNode> {
        &mut self.nodes
    }

    pub fn stage1(&mut self, kernel: &SolverKernel, ctx: &SimulationContext) {
        stage1(&self.nodes, &mut self.core, self.rows.range(), kernel, ctx);
    }

    pub fn stage2(&mut self, kernel: &SolverKernel, ctx: &SimulationContext) -> Result<ResidualAggregate> {
        stage2(&mut self.nodes, &mut self.core, self.rows, kernel, ctx)
    }

    pub fn wall_heat_flux(&mut self, kernel: &SolverKernel, dt: f64) {
        wall_heat_flux(&mut self.nodes, self.rows.range(), kernel.spacing, dt);
    }

    /// First owned row, sent to the lower neighbour.
    pub fn head_row(&self) -> &[FlowNode] {
        self.nodes.row(self.rows.owned.0)
    }

    /// Last owned row, sent to the upper neighbour.
    pub fn tail_row(&self) -> &[FlowNode] {
        self.nodes.row(self.rows.owned.1 - 1)
    }

    pub fn has_lower(&self) -> bool {
        self.has_lower
    }

    pub fn has_upper(&self) -> bool {
        self.has_upper
    }

    /// Overwrite the lower ghost row.
    pub fn set_lower_ghost(&mut self, row: &[FlowNode]) {
        if self.has_lower {
            self.nodes.row_mut(0).clone_from_slice(row);
        }
    }

    /// Overwrite the upper ghost row.
    pub fn set_upper_ghost(&mut self, row: &[FlowNode]) {
        if self.has_upper {
            let last = self.nodes.nx() - 1;
            self.nodes.row_mut(last).clone_from_slice(row);
        }
    }

    /// Owned rows in storage order.
    pub fn owned_nodes(&self) -> &[FlowNode] {
        self.nodes.rows(self.rows.range())
    }

    /// Copy the owned rows into the global grid.
    pub fn gather_into(&self, global: &mut Grid2D<FlowNode>) {
        global
            .rows_mut(self.owned_global())
            .clone_from_slice(self.owned_nodes());
    }

    /// Refresh owned and ghost rows from the global grid.
    pub fn scatter_from(&mut self, global: &Grid2D<FlowNode>) {
        let owned = self.owned_global();
        let first = owned.start - usize::from(self.has_lower);
        let last = owned.end + usize::from(self.has_upper);
        self.nodes
            .as_mut_slice()
            .clone_from_slice(global.rows(first..last));
    }
}

/// Swap boundary rows between two adjacent subdomains.
pub fn exchange_adjacent(lower: &mut Subdomain, upper: &mut Subdomain) {
    upper.set_lower_ghost(lower.tail_row());
    lower.set_upper_ghost(upper.head_row());
}

/// Refresh every ghost row from its owner.
pub fn exchange_all(subdomains: &mut [Subdomain]) {
    for r in 1..subdomains.len() {
        let (left, right) = subdomains.split_at_mut(r);
        exchange_adjacent(&mut left[r - 1], &mut right[0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{EquationLayout, Primitive, uniform_grid};

    fn global(nx: usize, ny: usize) -> Grid2D<FlowNode> {
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
        // Tag every node with its global position.
        for i in 0..nx {
            for j in 0..ny {
                g[(i, j)].tg = (i * 100 + j) as f64;
            }
        }
        g
    }

    fn core() -> FlowNodeCore {
        FlowNodeCore::new(&EquationLayout::new(0))
    }

    #[test]
    fn test_split_with_remainder() {
        let p = Partition::split(Resolution2D::new(10, 3), 3).unwrap();
        assert_eq!(p.owned(SubdomainRank::new(0)), 0..4);
        assert_eq!(p.owned(SubdomainRank::new(1)), 4..7);
        assert_eq!(p.owned(SubdomainRank::new(2)), 7..10);
        assert_eq!(p.owner_of(6), Some(SubdomainRank::new(1)));
        assert_eq!(p.owner_of(10), None);
    }

    #[test]
    fn test_split_rejects_bad_counts() {
        assert!(Partition::split(Resolution2D::new(4, 4), 0).is_err());
        assert!(Partition::split(Resolution2D::new(4, 4), 5).is_err());
        assert_eq!(Partition::split(Resolution2D::new(4, 4), 4).unwrap().len(), 4);
    }

    #[test]
    fn test_subdomain_ghost_layout() {
        let g = global(6, 2);
        let p = Partition::split(g.resolution(), 3).unwrap();
        let subs = p.subdomains(&g, &core()).unwrap();

        assert_eq!(subs[0].nodes().nx(), 3);
        assert_eq!(subs[1].nodes().nx(), 4);
        assert_eq!(subs[2].nodes().nx(), 3);
        assert_eq!(subs[1].head_row()[0].tg, 200.0);
        assert_eq!(subs[1].tail_row()[1].tg, 301.0);
        assert_eq!(subs[1].local_rows().global_coord(1, 1).i, 2);
    }

    #[test]
    fn test_halo_round_trip() {
        let g = global(6, 3);
        let p = Partition::split(g.resolution(), 3).unwrap();
        let mut subs = p.subdomains(&g, &core()).unwrap();

        // Scribble on owned boundary rows, then exchange.
        for s in subs.iter_mut() {
            let owned = s.local_rows().owned;
            for node in s.nodes_mut().row_mut(owned.0) {
                node.p = -1.0;
            }
            for node in s.nodes_mut().row_mut(owned.1 - 1) {
                node.p = -2.0;
            }
        }
        exchange_all(&mut subs);

        // Every ghost equals the owner's boundary row.
        for r in 1..3 {
            let ghost = subs[r].nodes().row(0).to_vec();
            assert_eq!(ghost.as_slice(), subs[r - 1].tail_row());
        }
        for r in 0..2 {
            let last = subs[r].nodes().nx() - 1;
            let ghost = subs[r].nodes().row(last).to_vec();
            assert_eq!(ghost.as_slice(), subs[r + 1].head_row());
        }
    }

    #[test]
    fn test_gather_scatter_identity() {
        let g = global(5, 2);
        let p = Partition::split(g.resolution(), 2).unwrap();
        let mut subs = p.subdomains(&g, &core()).unwrap();

        let mut gathered = g.clone();
        for node in gathered.as_mut_slice() {
            node.tg = 0.0;
        }
        for s in &subs {
            s.gather_into(&mut gathered);
        }
        assert_eq!(gathered, g);

        let mut changed = g.clone();
        changed[(3, 1)].tg = -5.0;
        for s in subs.iter_mut() {
            s.scatter_from(&changed);
        }
        // Row 3 is owned by rank 1 and is the upper ghost of rank 0.
        assert_eq!(subs[1].nodes()[(1, 1)].tg, -5.0);
        let last = subs[0].nodes().nx() - 1;
        assert_eq!(subs[0].nodes()[(last, 1)].tg, -5.0);
    }
}
