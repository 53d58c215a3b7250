//! Domain decomposition along x and the subdomain backends.
//!
//! The grid is split into contiguous x-row slabs. Each slab carries one ghost
//! row towards every neighbouring slab; ghosts are refreshed only by halo
//! exchange or by a scatter from the gathered global grid.

mod backend;
mod message;
mod partition;
mod set;

pub use backend::Backend;
pub use message::{HaloMode, MessagePassingSubdomains};
pub use partition::{Partition, Subdomain, exchange_adjacent, exchange_all};
#[cfg(feature = "parallel")]
pub use set::SharedMemorySubdomains;
pub use set::{SerialSubdomains, SubdomainSet};
