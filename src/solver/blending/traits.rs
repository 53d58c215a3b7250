//! Trait definitions for blending-factor functions.

/// Local quantities a blending function may depend on.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlendingSample {
    /// Relative change `|next - S| / |den|` of the equation, non-negative.
    pub delta: f64,
    /// Local gradient factor `|grad S| (dx+dy) / |S|`.
    pub gradient_factor: f64,
    /// Local Mach number.
    pub mach: f64,
}

/// Strategy that maps the local relative change of an equation to its next
/// blending factor `beta`.
///
/// `beta = 1` is fully explicit; smaller values pull the update towards the
/// implicit neighbour average. Every implementation returns a value in
/// `(0, beta_min]`.
///
/// # Extending
///
/// To add a new law:
/// 1. Create a (usually unit) struct
/// 2. Implement `BlendingFunction` for it
/// 3. Hand it to `Simulation::with_blending`
pub trait BlendingFunction: Send + Sync {
    /// Next `beta` for one equation of one node.
    ///
    /// # Arguments
    /// * `beta_min` - Upper bound for this iteration, in `(0, 1]`
    /// * `previous` - `beta` of the previous iteration
    /// * `sample` - Local relative change, gradient factor and Mach number
    fn compute_beta(&self, beta_min: f64, previous: f64, sample: &BlendingSample) -> f64;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Whether `sample.gradient_factor` is read.
    fn uses_gradient(&self) -> bool {
        false
    }

    /// Whether `sample.mach` is read.
    fn uses_mach(&self) -> bool {
        false
    }
}

/// Type alias for boxed blending functions.
pub type BoxedBlending = Box<dyn BlendingFunction>;
