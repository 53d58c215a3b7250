//! Layout of the conserved vector `S`.
//!
//! Slots 0..4 hold density, the two momenta and total energy, followed by
//! one slot per species and two turbulence slots (`k`/`nu_t`, `eps`).

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::grid::TurbulenceModel;

/// Family an equation belongs to; each family has its own condition flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquationFamily {
    Density,
    MomentumX,
    MomentumY,
    Energy,
    Species,
    TurbulenceK,
    TurbulenceEps,
}

/// Index arithmetic for a fixed number of species.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EquationLayout {
    num_species: usize,
}

impl EquationLayout {
    pub const RHO: usize = 0;
    pub const RHO_U: usize = 1;
    pub const RHO_V: usize = 2;
    pub const RHO_E: usize = 3;
    pub const FIRST_SPECIES: usize = 4;
    /// Turbulence slots reserved regardless of the active model.
    pub const TURBULENCE_SLOTS: usize = 2;

    pub const fn new(num_species: usize) -> Self {
        Self { num_species }
    }

    #[inline]
    pub const fn num_species(&self) -> usize {
        self.num_species
    }

    /// Length of every per-equation vector of a node.
    #[inline]
    pub const fn num_equations(&self) -> usize {
        Self::FIRST_SPECIES + self.num_species + Self::TURBULENCE_SLOTS
    }

    /// Slot of `k` (k-eps) or `nu_t` (Spalart-Allmaras).
    #[inline]
    pub const fn turb_k(&self) -> usize {
        Self::FIRST_SPECIES + self.num_species
    }

    #[inline]
    pub const fn turb_eps(&self) -> usize {
        Self::FIRST_SPECIES + self.num_species + 1
    }

    #[inline]
    pub fn species(&self) -> Range<usize> {
        Self::FIRST_SPECIES..Self::FIRST_SPECIES + self.num_species
    }

    /// Number of equations solved at a node with the given turbulence model.
    #[inline]
    pub fn active_equations(&self, model: TurbulenceModel) -> usize {
        Self::FIRST_SPECIES + self.num_species + model.num_variables()
    }

    /// Family of equation `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is not a slot of this layout.
    pub fn family(&self, k: usize) -> EquationFamily {
        assert!(
            k < self.num_equations(),
            "equation {} out of range for layout with {} slots",
            k,
            self.num_equations()
        );
        match k {
            Self::RHO => EquationFamily::Density,
            Self::RHO_U => EquationFamily::MomentumX,
            Self::RHO_V => EquationFamily::MomentumY,
            Self::RHO_E => EquationFamily::Energy,
            k if k < self.turb_k() => EquationFamily::Species,
            k if k == self.turb_k() => EquationFamily::TurbulenceK,
            _ => EquationFamily::TurbulenceEps,
        }
    }

    /// Whether `k` is one of the two momentum equations.
    #[inline]
    pub fn is_momentum(k: usize) -> bool {
        k == Self::RHO_U || k == Self::RHO_V
    }

    /// Short name of equation `k`, used in logs and residual-history headers.
    pub fn equation_name(&self, k: usize) -> String {
        match self.family(k) {
            EquationFamily::Density => "Rho".to_string(),
            EquationFamily::MomentumX => "RhoU".to_string(),
            EquationFamily::MomentumY => "RhoV".to_string(),
            EquationFamily::Energy => "RhoE".to_string(),
            EquationFamily::Species => format!("Y{}", k - Self::FIRST_SPECIES + 1),
            EquationFamily::TurbulenceK => "k".to_string(),
            EquationFamily::TurbulenceEps => "eps".to_string(),
        }
    }

    /// Names of all slots in order.
    pub fn equation_names(&self) -> Vec<String> {
        (0..self.num_equations())
            .map(|k| self.equation_name(k))
            .collect()
    }
}
