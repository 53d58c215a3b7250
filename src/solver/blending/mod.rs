//! Adaptive blending factor between explicit and implicit treatment.

mod standard;
mod traits;

pub use standard::{
    Hybrid, LimitedRelaxed, Linear, LinearRelaxed, LocalGradient, MachAdaptive, Mixed, Sqrt,
    SqrtRelaxed, Square, SquareRelaxed, StandardBlending, create_blending,
};
pub use traits::{BlendingFunction, BlendingSample, BoxedBlending};
