//! Strongly-typed domain types for safer APIs.
//!
//! - **Newtypes prevent mix-ups**: a `SubdomainRank` cannot be passed where an
//!   `EquationIndex` is expected
//! - **Named fields over positional**: `GridCoord { i, j }`,
//!   `GridSpacing { dx, dy }`
//! - **Zero-cost abstractions**: index newtypes are `#[repr(transparent)]`

mod coord;
mod indices;
mod resolution;

pub use coord::GridCoord;
pub use indices::{EquationIndex, SubdomainRank};
pub use resolution::{GridSpacing, Resolution2D};
