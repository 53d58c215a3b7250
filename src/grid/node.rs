//! Flow node and its provisional-state companion.

use crate::grid::{
    BoundaryCondition, ConditionSet, EquationConstraints, EquationLayout, TurbulenceCondition,
    TurbulenceModel,
};

/// Neighbour offsets in grid steps: `left`/`right` along x, `up`/`down` along y.
///
/// Zero on a side means the node is at the grid edge there and the stencil
/// degenerates to the node itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StencilDistances {
    pub left: usize,
    pub right: usize,
    pub up: usize,
    pub down: usize,
}

impl StencilDistances {
    pub const INTERIOR: Self = Self {
        left: 1,
        right: 1,
        up: 1,
        down: 1,
    };

    /// Combined x-distance, at least 1.
    #[inline]
    pub fn span_x(&self) -> usize {
        (self.left + self.right).max(1)
    }

    /// Combined y-distance, at least 1.
    #[inline]
    pub fn span_y(&self) -> usize {
        (self.up + self.down).max(1)
    }
}

/// Velocity, temperature and turbulence gradients of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeGradients {
    pub dudx: f64,
    pub dudy: f64,
    pub dvdx: f64,
    pub dvdy: f64,
    pub dtdx: f64,
    pub dtdy: f64,
    pub dkdx: f64,
    pub dkdy: f64,
    pub depsdx: f64,
    pub depsdy: f64,
}

/// Primitive gas state used to initialise a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Primitive {
    pub rho: f64,
    pub u: f64,
    pub v: f64,
    pub p: f64,
}

/// State of one grid point.
///
/// Per-equation vectors have `EquationLayout::num_equations()` entries;
/// the species density gradients have one extra trailing entry holding
/// their sum.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowNode {
    /// Conserved vector.
    pub s: Vec<f64>,
    pub dsdx: Vec<f64>,
    pub dsdy: Vec<f64>,
    /// Blending factor per equation, in `(0, 1]`.
    pub beta: Vec<f64>,
    /// x-flux.
    pub a: Vec<f64>,
    /// y-flux.
    pub b: Vec<f64>,
    /// Axisymmetric flux.
    pub f: Vec<f64>,
    pub src: Vec<f64>,
    /// Additional source, already multiplied by the timestep.
    pub src_add: Vec<f64>,

    pub tg: f64,
    pub p: f64,
    pub u: f64,
    pub v: f64,
    /// Ratio of specific heats.
    pub gamma: f64,
    /// Specific gas constant, J/(kg K).
    pub r_gas: f64,
    pub mu: f64,
    pub lam: f64,
    pub mu_t: f64,
    pub lam_t: f64,
    /// Distance to the nearest wall node.
    pub l_min: f64,
    pub y_plus: f64,
    /// Convective heat flux into adjacent solid nodes, W/m².
    pub q_conv: f64,

    pub gradients: NodeGradients,
    pub droydx: Vec<f64>,
    pub droydy: Vec<f64>,

    pub conditions: ConditionSet<BoundaryCondition>,
    pub turbulence: ConditionSet<TurbulenceCondition>,
    pub stencil: StencilDistances,
}

impl FlowNode {
    /// A blank, unset node of air at rest.
    pub fn new(layout: &EquationLayout) -> Self {
        let n = layout.num_equations();
        let ns = layout.num_species();
        Self {
            s: vec![0.0; n],
            dsdx: vec![0.0; n],
            dsdy: vec![0.0; n],
            beta: vec![1.0; n],
            a: vec![0.0; n],
            b: vec![0.0; n],
            f: vec![0.0; n],
            src: vec![0.0; n],
            src_add: vec![0.0; n],
            tg: 0.0,
            p: 0.0,
            u: 0.0,
            v: 0.0,
            gamma: 1.4,
            r_gas: 287.0,
            mu: 0.0,
            lam: 0.0,
            mu_t: 0.0,
            lam_t: 0.0,
            l_min: 0.0,
            y_plus: 0.0,
            q_conv: 0.0,
            gradients: NodeGradients::default(),
            droydx: vec![0.0; ns + 1],
            droydy: vec![0.0; ns + 1],
            conditions: ConditionSet::empty(),
            turbulence: ConditionSet::empty(),
            stencil: StencilDistances::default(),
        }
    }

    /// Set, non-solid and not frozen.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.conditions.has(BoundaryCondition::NodeIsSet)
            && !self.conditions.has(BoundaryCondition::Solid)
            && !self.conditions.has(BoundaryCondition::Frozen)
    }

    #[inline]
    pub fn is_solid(&self) -> bool {
        self.conditions.has(BoundaryCondition::Solid)
    }

    /// No-slip or wall-law node.
    #[inline]
    pub fn is_wall(&self) -> bool {
        self.conditions.has(BoundaryCondition::WallNoSlip)
            || self.conditions.has(BoundaryCondition::WallLaw)
    }

    #[inline]
    pub fn is_axisymmetric(&self) -> bool {
        self.conditions.has(BoundaryCondition::Axisymmetric)
    }

    pub fn turbulence_model(&self) -> TurbulenceModel {
        if self.turbulence.has(TurbulenceCondition::KEpsilonModel) {
            TurbulenceModel::KEpsilon
        } else if self.turbulence.has(TurbulenceCondition::SpalartAllmarasModel) {
            TurbulenceModel::SpalartAllmaras
        } else {
            TurbulenceModel::None
        }
    }

    /// Number of equations solved at this node.
    #[inline]
    pub fn num_active_equations(&self, layout: &EquationLayout) -> usize {
        layout.active_equations(self.turbulence_model())
    }

    /// Constraints of equation `k`, or `None` when the slot is not solved here.
    pub fn constraints(&self, k: usize, layout: &EquationLayout) -> Option<EquationConstraints> {
        EquationConstraints::resolve(layout.family(k), &self.conditions, &self.turbulence)
    }

    /// Local speed of sound `sqrt(gamma R Tg)`.
    #[inline]
    pub fn sound_speed(&self) -> f64 {
        (self.gamma * self.r_gas * self.tg).sqrt()
    }

    /// Local Mach number.
    pub fn mach(&self) -> f64 {
        let a = self.sound_speed();
        if a > 0.0 {
            (self.u * self.u + self.v * self.v).sqrt() / a
        } else {
            0.0
        }
    }

    /// Load conserved variables from a primitive state.
    ///
    /// `mass_fractions` fills the species slots; missing entries are zero.
    /// Fluxes and transport properties are left to the closure.
    pub fn set_primitive(&mut self, layout: &EquationLayout, state: Primitive, mass_fractions: &[f64]) {
        let Primitive { rho, u, v, p } = state;
        self.s[EquationLayout::RHO] = rho;
        self.s[EquationLayout::RHO_U] = rho * u;
        self.s[EquationLayout::RHO_V] = rho * v;
        self.s[EquationLayout::RHO_E] = p / (self.gamma - 1.0) + 0.5 * rho * (u * u + v * v);
        for (n, k) in layout.species().enumerate() {
            self.s[k] = rho * mass_fractions.get(n).copied().unwrap_or(0.0);
        }
        self.u = u;
        self.v = v;
        self.p = p;
        self.tg = p / (rho * self.r_gas);
    }
}

/// Provisional next state of a node, written by Stage1 and committed by Stage2.
///
/// Stage2 also parks the freshly computed gradients here before applying
/// them, so that every gradient sees the pre-commit state of its neighbours.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowNodeCore {
    pub s: Vec<f64>,
    pub dsdx: Vec<f64>,
    pub dsdy: Vec<f64>,
    pub gradients: NodeGradients,
    pub droydx: Vec<f64>,
    pub droydy: Vec<f64>,
}

impl FlowNodeCore {
    pub fn new(layout: &EquationLayout) -> Self {
        let n = layout.num_equations();
        let ns = layout.num_species();
        Self {
            s: vec![0.0; n],
            dsdx: vec![0.0; n],
            dsdy: vec![0.0; n],
            gradients: NodeGradients::default(),
            droydx: vec![0.0; ns + 1],
            droydy: vec![0.0; ns + 1],
        }
    }
}
