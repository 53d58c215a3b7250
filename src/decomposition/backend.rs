//! Backend selection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::grid::{FlowNode, FlowNodeCore, Grid2D};
use crate::solver::SolverKernel;

use super::message::{HaloMode, MessagePassingSubdomains};
use super::partition::Partition;
use super::set::{SerialSubdomains, SubdomainSet};

/// Execution backend of the subdomain set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backend {
    /// All subdomains on the calling thread.
    #[default]
    Serial,
    /// Subdomains swept on the rayon pool (`parallel` feature).
    SharedMemory,
    /// One worker thread per subdomain with channel-based halo exchange.
    MessagePassing {
        #[serde(default)]
        halo: HaloMode,
    },
}

impl Backend {
    /// Partition `global` into `parts` subdomains and hand them to this backend.
    pub fn build(
        self,
        global: &Grid2D<FlowNode>,
        parts: usize,
        kernel: Arc<SolverKernel>,
    ) -> Result<Box<dyn SubdomainSet>> {
        let partition = Partition::split(global.resolution(), parts)?;
        let subdomains = partition.subdomains(global, &FlowNodeCore::new(&kernel.layout))?;

        let set: Box<dyn SubdomainSet> = match self {
            Backend::Serial => Box::new(SerialSubdomains::new(kernel, subdomains)),
            Backend::SharedMemory => shared_memory(kernel, subdomains),
            Backend::MessagePassing { halo } => {
                Box::new(MessagePassingSubdomains::spawn(kernel, subdomains, halo)?)
            }
        };
        info!(backend = set.name(), subdomains = set.len(), "subdomain set ready");
        Ok(set)
    }
}

#[cfg(feature = "parallel")]
fn shared_memory(kernel: Arc<SolverKernel>, subdomains: Vec<super::Subdomain>) -> Box<dyn SubdomainSet> {
    Box::new(super::set::SharedMemorySubdomains::new(kernel, subdomains))
}

#[cfg(not(feature = "parallel"))]
fn shared_memory(kernel: Arc<SolverKernel>, subdomains: Vec<super::Subdomain>) -> Box<dyn SubdomainSet> {
    tracing::warn!("built without the `parallel` feature; falling back to the serial backend");
    Box::new(SerialSubdomains::new(kernel, subdomains))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        backend: Backend,
    }

    #[test]
    fn test_backend_from_toml() {
        let h: Holder = toml::from_str("backend = { kind = \"serial\" }").unwrap();
        assert_eq!(h.backend, Backend::Serial);

        let h: Holder =
            toml::from_str("backend = { kind = \"message_passing\", halo = \"buffered\" }").unwrap();
        assert_eq!(
            h.backend,
            Backend::MessagePassing {
                halo: HaloMode::Buffered
            }
        );

        let h: Holder = toml::from_str("backend = { kind = \"message_passing\" }").unwrap();
        assert_eq!(
            h.backend,
            Backend::MessagePassing {
                halo: HaloMode::Blocking
            }
        );
    }
}
