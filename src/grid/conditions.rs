//! Typed boundary and turbulence condition sets.
//!
//! Every node carries a [`ConditionSet<BoundaryCondition>`] and a
//! [`ConditionSet<TurbulenceCondition>`]. Per-equation constraints (fixed
//! value, zero gradient, zero curvature) are conditions parameterised by the
//! field they constrain.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::grid::EquationFamily;

/// A condition that maps onto one bit of a [`ConditionSet`].
pub trait ConditionKind: Copy {
    /// Bit position, unique per condition value, below 64.
    fn bit(self) -> u32;
}

/// Constraint imposed on one conserved field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constraint {
    /// Value is held; neither stage touches it.
    Fixed,
    /// `dS/dx = 0`: the value is interpolated from the x-neighbours.
    ZeroGradX,
    /// `dS/dy = 0`: the value is interpolated from the y-neighbours.
    ZeroGradY,
    /// `d²S/dx² = 0`: the x-flux difference is the neighbours' mean derivative.
    ZeroCurvX,
    /// `d²S/dy² = 0`.
    ZeroCurvY,
}

impl Constraint {
    const COUNT: u32 = 5;

    fn ordinal(self) -> u32 {
        match self {
            Constraint::Fixed => 0,
            Constraint::ZeroGradX => 1,
            Constraint::ZeroGradY => 2,
            Constraint::ZeroCurvX => 3,
            Constraint::ZeroCurvY => 4,
        }
    }
}

/// Flow field a [`Constraint`] applies to. All species share one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowField {
    Density,
    MomentumX,
    MomentumY,
    Energy,
    Species,
}

impl FlowField {
    fn ordinal(self) -> u32 {
        match self {
            FlowField::Density => 0,
            FlowField::MomentumX => 1,
            FlowField::MomentumY => 2,
            FlowField::Energy => 3,
            FlowField::Species => 4,
        }
    }
}

/// Turbulence scalar a [`Constraint`] applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurbulenceField {
    K,
    Eps,
}

/// Node type and flow-field conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundaryCondition {
    /// Node was initialised by the grid builder; unset nodes are inactive.
    NodeIsSet,
    /// Solid body node, never updated.
    Solid,
    /// No-slip wall node.
    WallNoSlip,
    /// Wall-function node.
    WallLaw,
    /// Frozen node, skipped by both stages.
    Frozen,
    /// Node uses the axisymmetric source `F/(j+1)`.
    Axisymmetric,
    /// Constraint on one flow field.
    Flow(FlowField, Constraint),
}

impl ConditionKind for BoundaryCondition {
    fn bit(self) -> u32 {
        match self {
            BoundaryCondition::NodeIsSet => 0,
            BoundaryCondition::Solid => 1,
            BoundaryCondition::WallNoSlip => 2,
            BoundaryCondition::WallLaw => 3,
            BoundaryCondition::Frozen => 4,
            BoundaryCondition::Axisymmetric => 5,
            BoundaryCondition::Flow(field, c) => {
                6 + field.ordinal() * Constraint::COUNT + c.ordinal()
            }
        }
    }
}

/// Turbulence model selection and turbulence-field conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurbulenceCondition {
    KEpsilonModel,
    SpalartAllmarasModel,
    Field(TurbulenceField, Constraint),
}

impl ConditionKind for TurbulenceCondition {
    fn bit(self) -> u32 {
        match self {
            TurbulenceCondition::KEpsilonModel => 0,
            TurbulenceCondition::SpalartAllmarasModel => 1,
            TurbulenceCondition::Field(field, c) => {
                let f = match field {
                    TurbulenceField::K => 0,
                    TurbulenceField::Eps => 1,
                };
                2 + f * Constraint::COUNT + c.ordinal()
            }
        }
    }
}

/// Turbulence model active at a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurbulenceModel {
    #[default]
    None,
    KEpsilon,
    SpalartAllmaras,
}

impl TurbulenceModel {
    /// Extra transported scalars: 2 for k-eps, 1 for Spalart-Allmaras.
    #[inline]
    pub fn num_variables(self) -> usize {
        match self {
            TurbulenceModel::None => 0,
            TurbulenceModel::KEpsilon => 2,
            TurbulenceModel::SpalartAllmaras => 1,
        }
    }
}

/// Bit set of conditions of one kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConditionSet<C> {
    bits: u64,
    _kind: PhantomData<C>,
}

impl<C: ConditionKind> ConditionSet<C> {
    pub const fn empty() -> Self {
        Self {
            bits: 0,
            _kind: PhantomData,
        }
    }

    #[inline]
    pub fn has(&self, condition: C) -> bool {
        self.bits & (1u64 << condition.bit()) != 0
    }

    #[inline]
    pub fn insert(&mut self, condition: C) {
        self.bits |= 1u64 << condition.bit();
    }

    #[inline]
    pub fn remove(&mut self, condition: C) {
        self.bits &= !(1u64 << condition.bit());
    }

    /// Builder-style insert.
    pub fn with(mut self, condition: C) -> Self {
        self.insert(condition);
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl<C: ConditionKind> Default for ConditionSet<C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<C: ConditionKind> FromIterator<C> for ConditionSet<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let mut set = Self::empty();
        for c in iter {
            set.insert(c);
        }
        set
    }
}

impl<C> fmt::Debug for ConditionSet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConditionSet({:#x})", self.bits)
    }
}

/// Constraints resolved for one equation of one node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EquationConstraints {
    pub fixed: bool,
    pub zero_grad_x: bool,
    pub zero_grad_y: bool,
    pub zero_curv_x: bool,
    pub zero_curv_y: bool,
}

impl EquationConstraints {
    /// Resolve the constraints of an equation family from a node's condition sets.
    ///
    /// Returns `None` for turbulence families when the node carries neither
    /// turbulence model; such slots are not solved at that node.
    pub fn resolve(
        family: EquationFamily,
        flow: &ConditionSet<BoundaryCondition>,
        turbulence: &ConditionSet<TurbulenceCondition>,
    ) -> Option<Self> {
        let flow_field = match family {
            EquationFamily::Density => Some(FlowField::Density),
            EquationFamily::MomentumX => Some(FlowField::MomentumX),
            EquationFamily::MomentumY => Some(FlowField::MomentumY),
            EquationFamily::Energy => Some(FlowField::Energy),
            EquationFamily::Species => Some(FlowField::Species),
            EquationFamily::TurbulenceK | EquationFamily::TurbulenceEps => None,
        };

        if let Some(field) = flow_field {
            let has = |c| flow.has(BoundaryCondition::Flow(field, c));
            return Some(Self::from_lookup(has));
        }

        let modelled = turbulence.has(TurbulenceCondition::KEpsilonModel)
            || turbulence.has(TurbulenceCondition::SpalartAllmarasModel);
        if !modelled {
            return None;
        }
        let field = if family == EquationFamily::TurbulenceK {
            TurbulenceField::K
        } else {
            TurbulenceField::Eps
        };
        let has = |c| turbulence.has(TurbulenceCondition::Field(field, c));
        Some(Self::from_lookup(has))
    }

    fn from_lookup(has: impl Fn(Constraint) -> bool) -> Self {
        Self {
            fixed: has(Constraint::Fixed),
            zero_grad_x: has(Constraint::ZeroGradX),
            zero_grad_y: has(Constraint::ZeroGradY),
            zero_curv_x: has(Constraint::ZeroCurvX),
            zero_curv_y: has(Constraint::ZeroCurvY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_are_unique_and_fit() {
        let fields = [
            FlowField::Density,
            FlowField::MomentumX,
            FlowField::MomentumY,
            FlowField::Energy,
            FlowField::Species,
        ];
        let constraints = [
            Constraint::Fixed,
            Constraint::ZeroGradX,
            Constraint::ZeroGradY,
            Constraint::ZeroCurvX,
            Constraint::ZeroCurvY,
        ];
        let mut seen = std::collections::HashSet::new();
        for bc in [
            BoundaryCondition::NodeIsSet,
            BoundaryCondition::Solid,
            BoundaryCondition::WallNoSlip,
            BoundaryCondition::WallLaw,
            BoundaryCondition::Frozen,
            BoundaryCondition::Axisymmetric,
        ] {
            assert!(seen.insert(bc.bit()));
        }
        for f in fields {
            for c in constraints {
                let bit = BoundaryCondition::Flow(f, c).bit();
                assert!(bit < 64);
                assert!(seen.insert(bit), "duplicate bit {}", bit);
            }
        }
    }

    #[test]
    fn test_set_insert_remove() {
        let mut set = ConditionSet::empty()
            .with(BoundaryCondition::NodeIsSet)
            .with(BoundaryCondition::Solid);
        assert!(set.has(BoundaryCondition::Solid));
        assert!(!set.has(BoundaryCondition::Frozen));
        set.remove(BoundaryCondition::Solid);
        assert!(!set.has(BoundaryCondition::Solid));
        assert!(set.has(BoundaryCondition::NodeIsSet));
    }

    #[test]
    fn test_species_constraint_is_shared() {
        let flow: ConditionSet<BoundaryCondition> =
            [BoundaryCondition::Flow(FlowField::Species, Constraint::Fixed)]
                .into_iter()
                .collect();
        let c = EquationConstraints::resolve(EquationFamily::Species, &flow, &ConditionSet::empty())
            .unwrap();
        assert!(c.fixed);
        let rho =
            EquationConstraints::resolve(EquationFamily::Density, &flow, &ConditionSet::empty())
                .unwrap();
        assert!(!rho.fixed);
    }

    #[test]
    fn test_turbulence_slots_need_a_model() {
        let flow = ConditionSet::empty();
        let none = ConditionSet::empty();
        assert!(EquationConstraints::resolve(EquationFamily::TurbulenceK, &flow, &none).is_none());

        let keps = ConditionSet::empty()
            .with(TurbulenceCondition::KEpsilonModel)
            .with(TurbulenceCondition::Field(
                TurbulenceField::Eps,
                Constraint::ZeroGradY,
            ));
        let eps = EquationConstraints::resolve(EquationFamily::TurbulenceEps, &flow, &keps).unwrap();
        assert!(eps.zero_grad_y);
        assert!(!eps.fixed);
    }
}
