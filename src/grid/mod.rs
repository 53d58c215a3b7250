//! Grid and node store.
//!
//! A structured `nx × ny` grid of [`FlowNode`]s with a companion grid of
//! [`FlowNodeCore`]s for the provisional Stage1 state. Nodes hold no
//! references to each other; neighbours are resolved by index through the
//! stencil distances.

mod conditions;
mod layout;
mod node;
mod setup;
mod store;

pub use conditions::{
    BoundaryCondition, ConditionKind, ConditionSet, Constraint, EquationConstraints, FlowField,
    TurbulenceCondition, TurbulenceField, TurbulenceModel,
};
pub use layout::{EquationFamily, EquationLayout};
pub use node::{FlowNode, FlowNodeCore, NodeGradients, Primitive, StencilDistances};
pub use setup::{collect_wall_nodes, init_stencil_distances, uniform_grid};
pub use store::Grid2D;
