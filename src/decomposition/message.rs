//! Message-passing backend: one worker thread per subdomain.
//!
//! Workers own their subdomain outright and talk over crossbeam channels:
//! commands and replies with the coordinator, boundary rows with their
//! neighbours. Nothing is shared between workers.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SolverError};
use crate::grid::{FlowNode, Grid2D};
use crate::solver::{ResidualAggregate, SimulationContext, SolverKernel};
use crate::types::SubdomainRank;

use super::partition::Subdomain;
use super::set::SubdomainSet;

/// How neighbouring workers hand over boundary rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaloMode {
    /// Rendezvous channels: each send waits for the matching receive.
    #[default]
    Blocking,
    /// Buffered channels: post both sends, then wait for both rows.
    Buffered,
}

enum Command {
    Stage1(SimulationContext),
    Stage2(SimulationContext),
    ExchangeHalos,
    WallHeatFlux(f64),
    Gather,
    Scatter(Arc<Grid2D<FlowNode>>),
    Stop,
}

enum Reply {
    Done,
    Residuals(ResidualAggregate),
    Rows { start: usize, nodes: Vec<FlowNode> },
    Failed(SolverError),
}

type Row = Vec<FlowNode>;

/// Channel ends a worker uses to reach its neighbours.
struct HaloLinks {
    mode: HaloMode,
    to_lower: Option<Sender<Row>>,
    from_lower: Option<Receiver<Row>>,
    to_upper: Option<Sender<Row>>,
    from_upper: Option<Receiver<Row>>,
}

impl HaloLinks {
    fn exchange(&self, sub: &mut Subdomain) -> Result<()> {
        let rank = sub.rank();
        let lost_lower = || SolverError::WorkerDisconnected { rank: rank.prev() };
        let lost_upper = || SolverError::WorkerDisconnected { rank: rank.next() };

        match self.mode {
            HaloMode::Blocking => {
                // Upper side first: the top rank starts the cascade downwards.
                if let (Some(tx), Some(rx)) = (&self.to_upper, &self.from_upper) {
                    tx.send(sub.tail_row().to_vec()).map_err(|_| lost_upper())?;
                    let row = rx.recv().map_err(|_| lost_upper())?;
                    sub.set_upper_ghost(&row);
                }
                if let (Some(tx), Some(rx)) = (&self.to_lower, &self.from_lower) {
                    let row = rx.recv().map_err(|_| lost_lower())?;
                    sub.set_lower_ghost(&row);
                    tx.send(sub.head_row().to_vec()).map_err(|_| lost_lower())?;
                }
            }
            HaloMode::Buffered => {
                if let Some(tx) = &self.to_upper {
                    tx.send(sub.tail_row().to_vec()).map_err(|_| lost_upper())?;
                }
                if let Some(tx) = &self.to_lower {
                    tx.send(sub.head_row().to_vec()).map_err(|_| lost_lower())?;
                }
                if let Some(rx) = &self.from_upper {
                    let row = rx.recv().map_err(|_| lost_upper())?;
                    sub.set_upper_ghost(&row);
                }
                if let Some(rx) = &self.from_lower {
                    let row = rx.recv().map_err(|_| lost_lower())?;
                    sub.set_lower_ghost(&row);
                }
            }
        }
        Ok(())
    }
}

fn run_worker(
    mut sub: Subdomain,
    kernel: Arc<SolverKernel>,
    commands: Receiver<Command>,
    replies: Sender<(SubdomainRank, Reply)>,
    links: HaloLinks,
) {
    let rank = sub.rank();
    for command in commands.iter() {
        let reply = match command {
            Command::Stage1(ctx) => {
                sub.stage1(&kernel, &ctx);
                Reply::Done
            }
            Command::Stage2(ctx) => match sub.stage2(&kernel, &ctx) {
                Ok(aggregate) => Reply::Residuals(aggregate),
                Err(e) => Reply::Failed(e),
            },
            Command::ExchangeHalos => match links.exchange(&mut sub) {
                Ok(()) => Reply::Done,
                Err(e) => Reply::Failed(e),
            },
            Command::WallHeatFlux(dt) => {
                sub.wall_heat_flux(&kernel, dt);
                Reply::Done
            }
            Command::Gather => Reply::Rows {
                start: sub.owned_global().start,
                nodes: sub.owned_nodes().to_vec(),
            },
            Command::Scatter(global) => {
                sub.scatter_from(&global);
                Reply::Done
            }
            Command::Stop => break,
        };
        if replies.send((rank, reply)).is_err() {
            break;
        }
    }
    debug!(%rank, "worker stopped");
}

struct Worker {
    rank: SubdomainRank,
    commands: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

/// Subdomains on dedicated worker threads.
///
/// Dropping the set stops and joins every worker.
pub struct MessagePassingSubdomains {
    workers: Vec<Worker>,
    replies: Receiver<(SubdomainRank, Reply)>,
    ny: usize,
}

impl MessagePassingSubdomains {
    const POLL: Duration = Duration::from_millis(50);

    /// Spawn one worker per subdomain.
    pub fn spawn(kernel: Arc<SolverKernel>, subdomains: Vec<Subdomain>, mode: HaloMode) -> Result<Self> {
        let n = subdomains.len();
        let ny = subdomains.first().map_or(0, |s| s.nodes().ny());
        let channel = || match mode {
            HaloMode::Blocking => bounded::<Row>(0),
            HaloMode::Buffered => unbounded::<Row>(),
        };

        let mut links: Vec<HaloLinks> = (0..n)
            .map(|_| HaloLinks {
                mode,
                to_lower: None,
                from_lower: None,
                to_upper: None,
                from_upper: None,
            })
            .collect();
        for r in 1..n {
            let (tx, rx) = channel();
            links[r - 1].to_upper = Some(tx);
            links[r].from_lower = Some(rx);
            let (tx, rx) = channel();
            links[r].to_lower = Some(tx);
            links[r - 1].from_upper = Some(rx);
        }

        let (reply_tx, replies) = unbounded();
        let mut workers = Vec::with_capacity(n);
        for (sub, link) in subdomains.into_iter().zip(links) {
            let rank = sub.rank();
            let (commands, command_rx) = unbounded();
            let kernel = Arc::clone(&kernel);
            let reply_tx = reply_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("deeps2d-{}", rank))
                .spawn(move || run_worker(sub, kernel, command_rx, reply_tx, link))?;
            workers.push(Worker {
                rank,
                commands,
                handle: Some(handle),
            });
        }
        debug!(workers = n, ?mode, "message-passing workers spawned");

        Ok(Self { workers, replies, ny })
    }

    fn broadcast(&self, make: impl Fn() -> Command) -> Result<()> {
        for w in &self.workers {
            w.commands
                .send(make())
                .map_err(|_| SolverError::WorkerDisconnected { rank: w.rank })?;
        }
        Ok(())
    }

    /// One reply per worker, sorted by rank.
    fn collect(&self) -> Result<Vec<(SubdomainRank, Reply)>> {
        let mut replies = Vec::with_capacity(self.workers.len());
        while replies.len() < self.workers.len() {
            match self.replies.recv_timeout(Self::POLL) {
                Ok(reply) => replies.push(reply),
                Err(RecvTimeoutError::Timeout) => {
                    // A worker that died without replying would stall us forever.
                    if let Some(dead) = self.workers.iter().find(|w| {
                        w.handle.as_ref().is_some_and(|h| h.is_finished())
                            && !replies.iter().any(|(r, _)| *r == w.rank)
                    }) {
                        return Err(SolverError::WorkerDisconnected { rank: dead.rank });
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let rank = self.workers.first().map_or(SubdomainRank::ZERO, |w| w.rank);
                    return Err(SolverError::WorkerDisconnected { rank });
                }
            }
        }
        replies.sort_by_key(|(rank, _)| *rank);
        Ok(replies)
    }

    fn round(&self, make: impl Fn() -> Command) -> Result<Vec<(SubdomainRank, Reply)>> {
        self.broadcast(make)?;
        let replies = self.collect()?;
        let mut ok = Vec::with_capacity(replies.len());
        let mut failure = None;
        for (rank, reply) in replies {
            match reply {
                Reply::Failed(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                other => ok.push((rank, other)),
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(ok),
        }
    }
}

impl SubdomainSet for MessagePassingSubdomains {
    fn len(&self) -> usize {
        self.workers.len()
    }

    fn stage1(&mut self, ctx: &SimulationContext) -> Result<()> {
        let ctx = *ctx;
        self.round(|| Command::Stage1(ctx)).map(|_| ())
    }

    fn stage2(&mut self, ctx: &SimulationContext) -> Result<Vec<ResidualAggregate>> {
        let ctx = *ctx;
        let replies = self.round(|| Command::Stage2(ctx))?;
        Ok(replies
            .into_iter()
            .filter_map(|(_, reply)| match reply {
                Reply::Residuals(aggregate) => Some(aggregate),
                _ => None,
            })
            .collect())
    }

    fn exchange_halos(&mut self) -> Result<()> {
        self.round(|| Command::ExchangeHalos).map(|_| ())
    }

    fn wall_heat_flux(&mut self, dt: f64) -> Result<()> {
        self.round(|| Command::WallHeatFlux(dt)).map(|_| ())
    }

    fn gather(&mut self, global: &mut Grid2D<FlowNode>) -> Result<()> {
        for (_, reply) in self.round(|| Command::Gather)? {
            if let Reply::Rows { start, nodes } = reply {
                let rows = nodes.len() / self.ny.max(1);
                global.rows_mut(start..start + rows).clone_from_slice(&nodes);
            }
        }
        Ok(())
    }

    fn scatter(&mut self, global: &Grid2D<FlowNode>) -> Result<()> {
        let shared = Arc::new(global.clone());
        self.round(|| Command::Scatter(Arc::clone(&shared))).map(|_| ())
    }

    fn shutdown(&mut self) {
        for w in &self.workers {
            // A worker that already exited has dropped its receiver.
            let _ = w.commands.send(Command::Stop);
        }
        for w in &mut self.workers {
            if let Some(handle) = w.handle.take()
                && handle.join().is_err()
            {
                warn!(rank = %w.rank, "worker panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "message-passing"
    }
}

impl Drop for MessagePassingSubdomains {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::{Partition, SerialSubdomains};
    use crate::grid::{FlowNodeCore, uniform_grid};
    use crate::solver::test_support::{air, closed, kernel};
    use crate::types::Resolution2D;

    fn setup(nx: usize, parts: usize) -> (Arc<SolverKernel>, Grid2D<FlowNode>, Vec<Subdomain>) {
        let kernel = Arc::new(kernel(0));
        let mut g = closed(
            &kernel,
            uniform_grid(&kernel.layout, Resolution2D::new(nx, 3), air(), &[]).unwrap(),
        );
        for i in 0..nx {
            for j in 0..3 {
                g[(i, j)].src_add[0] = 1.0e-4 * (i * 3 + j) as f64;
            }
        }
        let p = Partition::split(g.resolution(), parts).unwrap();
        let subs = p.subdomains(&g, &FlowNodeCore::new(&kernel.layout)).unwrap();
        (kernel, g, subs)
    }

    fn run_steps(set: &mut dyn SubdomainSet, global: &mut Grid2D<FlowNode>, steps: usize) {
        let ctx = SimulationContext::new(1.0e-7, 0.5, 0.9);
        for _ in 0..steps {
            set.stage1(&ctx).unwrap();
            let aggregates = set.stage2(&ctx).unwrap();
            assert_eq!(aggregates.len(), set.len());
            set.exchange_halos().unwrap();
        }
        set.gather(global).unwrap();
    }

    #[test]
    fn test_matches_serial_backend_bit_for_bit() {
        for mode in [HaloMode::Blocking, HaloMode::Buffered] {
            let (kernel, mut serial_grid, subs) = setup(7, 3);
            let mut serial = SerialSubdomains::new(Arc::clone(&kernel), subs);
            run_steps(&mut serial, &mut serial_grid, 4);

            let (kernel, mut mp_grid, subs) = setup(7, 3);
            let mut mp = MessagePassingSubdomains::spawn(kernel, subs, mode).unwrap();
            run_steps(&mut mp, &mut mp_grid, 4);

            assert_eq!(mp_grid, serial_grid, "mode {:?}", mode);
        }
    }

    #[test]
    fn test_halo_exchange_with_workers() {
        let (kernel, mut g, subs) = setup(6, 3);
        let mut mp = MessagePassingSubdomains::spawn(kernel, subs, HaloMode::Blocking).unwrap();
        g[(2, 0)].p = 7.0;
        mp.scatter(&g).unwrap();
        mp.exchange_halos().unwrap();
        let mut back = g.clone();
        for node in back.as_mut_slice() {
            node.p = 0.0;
        }
        mp.gather(&mut back).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn test_instability_reported_and_workers_stop() {
        let (kernel, mut g, _) = setup(6, 3);
        g[(4, 1)].src_add[3] = -1.0e7;
        let p = Partition::split(g.resolution(), 3).unwrap();
        let subs = p.subdomains(&g, &FlowNodeCore::new(&kernel.layout)).unwrap();
        let mut mp = MessagePassingSubdomains::spawn(kernel, subs, HaloMode::Buffered).unwrap();

        let ctx = SimulationContext::new(1.0e-7, 0.5, 1.0);
        mp.stage1(&ctx).unwrap();
        match mp.stage2(&ctx) {
            Err(SolverError::NegativeTemperature { subdomain, .. }) => {
                assert_eq!(subdomain, SubdomainRank::new(2));
            }
            other => panic!("expected instability, got {:?}", other.map(|v| v.len())),
        }
        mp.shutdown();
        assert!(mp.stage1(&ctx).is_err());
    }
}
