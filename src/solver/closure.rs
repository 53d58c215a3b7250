//! Per-node collaborators: chemistry and thermodynamic closure.
//!
//! Stage2 treats both as opaque. The crate ships an ideal-gas closure and a
//! no-op chemistry model so that the core runs standalone.

use serde::{Deserialize, Serialize};

use crate::grid::{EquationLayout, FlowNode, TurbulenceModel};

/// Refinement of the turbulence model, forwarded untouched to the closure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurbulenceExtendedModel {
    #[default]
    Standard,
    LowReynolds,
    Compressible,
}

/// Switches and coefficients passed to [`NodeClosure::close`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosureParams {
    pub enable_turbulence: bool,
    pub enable_flow: bool,
    pub sigma_w: f64,
    pub sigma_f: f64,
    pub extended_model: TurbulenceExtendedModel,
    pub boundary_layer_thickness: f64,
    /// Extra source injection is active this iteration.
    pub source_injection: bool,
}

impl Default for ClosureParams {
    fn default() -> Self {
        Self {
            enable_turbulence: false,
            enable_flow: true,
            sigma_w: 0.0,
            sigma_f: 0.0,
            extended_model: TurbulenceExtendedModel::Standard,
            boundary_layer_thickness: 0.0,
            source_injection: false,
        }
    }
}

/// Chemical reactions applied to one node after its state is committed.
pub trait ChemistryModel: Send + Sync {
    fn apply(&self, node: &mut FlowNode, layout: &EquationLayout);

    fn name(&self) -> &'static str;
}

/// Recomputes derived quantities (`U`, `V`, `Tg`, `p`, transport
/// properties, fluxes `A`, `B`, `F`) from the conserved vector.
pub trait NodeClosure: Send + Sync {
    fn close(&self, node: &mut FlowNode, layout: &EquationLayout, params: &ClosureParams);

    fn name(&self) -> &'static str;
}

/// Frozen chemistry.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoReactions;

impl ChemistryModel for NoReactions {
    fn apply(&self, _node: &mut FlowNode, _layout: &EquationLayout) {}

    fn name(&self) -> &'static str {
        "frozen"
    }
}

/// Uniform volumetric mass injection into every fluid node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceInjection {
    /// kg / (m^3 s).
    pub mass_rate: f64,
    /// Total enthalpy carried by the injected mass, J/kg.
    pub total_enthalpy: f64,
}

/// Calorically perfect gas with constant laminar viscosity.
#[derive(Clone, Copy, Debug)]
pub struct IdealGasClosure {
    /// Laminar dynamic viscosity, Pa s.
    pub viscosity: f64,
    pub prandtl: f64,
    pub turbulent_prandtl: f64,
    /// Owns `Src[Rho]` and `Src[RhoE]` when set.
    pub injection: Option<SourceInjection>,
}

impl Default for IdealGasClosure {
    fn default() -> Self {
        Self {
            viscosity: 1.8e-5,
            prandtl: 0.72,
            turbulent_prandtl: 0.9,
            injection: None,
        }
    }
}

impl IdealGasClosure {
    const C_MU: f64 = 0.09;

    fn eddy_viscosity(&self, node: &FlowNode, layout: &EquationLayout) -> f64 {
        match node.turbulence_model() {
            TurbulenceModel::KEpsilon => {
                let k = node.s[layout.turb_k()];
                let eps = node.s[layout.turb_eps()];
                if eps > 0.0 { Self::C_MU * k * k / eps } else { 0.0 }
            }
            TurbulenceModel::SpalartAllmaras => node.s[layout.turb_k()].max(0.0),
            TurbulenceModel::None => 0.0,
        }
    }

    pub fn with_injection(mut self, injection: SourceInjection) -> Self {
        self.injection = Some(injection);
        self
    }

    fn apply_injection(&self, node: &mut FlowNode, active: bool) {
        let Some(inj) = self.injection else {
            return;
        };
        let (mass, energy) = if active && !node.is_solid() {
            (inj.mass_rate, inj.mass_rate * inj.total_enthalpy)
        } else {
            (0.0, 0.0)
        };
        node.src[EquationLayout::RHO] = mass;
        node.src[EquationLayout::RHO_E] = energy;
    }
}

impl NodeClosure for IdealGasClosure {
    fn close(&self, node: &mut FlowNode, layout: &EquationLayout, params: &ClosureParams) {
        let rho = node.s[EquationLayout::RHO];
        if !(rho > 0.0) {
            // Non-physical density surfaces as a negative temperature.
            node.tg = -1.0;
            return;
        }

        let rho_u = node.s[EquationLayout::RHO_U];
        let rho_v = node.s[EquationLayout::RHO_V];
        let energy = node.s[EquationLayout::RHO_E];
        let u = rho_u / rho;
        let v = rho_v / rho;
        let cv = node.r_gas / (node.gamma - 1.0);
        let e_int = energy / rho - 0.5 * (u * u + v * v);
        let tg = e_int / cv;
        let p = rho * node.r_gas * tg;

        node.u = u;
        node.v = v;
        node.tg = tg;
        node.p = p;

        let cp = node.gamma * cv;
        node.mu = self.viscosity;
        node.lam = self.viscosity * cp / self.prandtl;
        if params.enable_turbulence {
            node.mu_t = self.eddy_viscosity(node, layout);
        } else if params.enable_flow {
            node.mu_t = 0.0;
        }
        node.lam_t = node.mu_t * cp / self.turbulent_prandtl;

        let n = node.num_active_equations(layout);
        for k in 0..n {
            node.a[k] = u * node.s[k];
            node.b[k] = v * node.s[k];
        }
        node.a[EquationLayout::RHO_U] += p;
        node.b[EquationLayout::RHO_V] += p;
        node.a[EquationLayout::RHO_E] += u * p;
        node.b[EquationLayout::RHO_E] += v * p;

        node.f[..n].copy_from_slice(&node.b[..n]);
        node.f[EquationLayout::RHO_V] -= p;

        self.apply_injection(node, params.source_injection);
    }

    fn name(&self) -> &'static str {
        "ideal-gas"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Primitive, TurbulenceCondition};
    use approx::assert_relative_eq;

    fn node_with(layout: &EquationLayout, u: f64, v: f64) -> FlowNode {
        let mut node = FlowNode::new(layout);
        node.set_primitive(
            layout,
            Primitive {
                rho: 1.2,
                u,
                v,
                p: 1.0e5,
            },
            &[1.0],
        );
        node
    }

    #[test]
    fn test_closure_recovers_primitive_state() {
        let layout = EquationLayout::new(1);
        let mut node = node_with(&layout, 30.0, -4.0);
        let tg = node.tg;
        node.tg = 0.0;
        node.p = 0.0;
        IdealGasClosure::default().close(&mut node, &layout, &ClosureParams::default());
        assert_relative_eq!(node.tg, tg, max_relative = 1e-12);
        assert_relative_eq!(node.p, 1.0e5, max_relative = 1e-12);
        assert_relative_eq!(node.u, 30.0, max_relative = 1e-12);
        assert_relative_eq!(node.v, -4.0, max_relative = 1e-12);
    }

    #[test]
    fn test_euler_fluxes() {
        let layout = EquationLayout::new(1);
        let mut node = node_with(&layout, 10.0, 0.0);
        IdealGasClosure::default().close(&mut node, &layout, &ClosureParams::default());
        assert_relative_eq!(node.a[EquationLayout::RHO], 12.0, max_relative = 1e-12);
        assert_relative_eq!(node.a[EquationLayout::RHO_U], 120.0 + 1.0e5, max_relative = 1e-12);
        assert_relative_eq!(node.b[EquationLayout::RHO_V], 1.0e5, max_relative = 1e-12);
        assert_relative_eq!(node.a[4], 12.0, max_relative = 1e-12);
        assert_eq!(node.f[EquationLayout::RHO_V], 0.0);
    }

    #[test]
    fn test_negative_density_reports_negative_temperature() {
        let layout = EquationLayout::new(0);
        let mut node = FlowNode::new(&layout);
        node.s[EquationLayout::RHO] = -1.0;
        IdealGasClosure::default().close(&mut node, &layout, &ClosureParams::default());
        assert!(node.tg < 0.0);
    }

    #[test]
    fn test_eddy_viscosity_only_when_enabled() {
        let layout = EquationLayout::new(0);
        let mut node = node_with(&layout, 1.0, 0.0);
        node.turbulence.insert(TurbulenceCondition::KEpsilonModel);
        node.s[layout.turb_k()] = 2.0;
        node.s[layout.turb_eps()] = 4.0;

        let closure = IdealGasClosure::default();
        closure.close(&mut node, &layout, &ClosureParams::default());
        assert_eq!(node.mu_t, 0.0);

        let params = ClosureParams {
            enable_turbulence: true,
            enable_flow: false,
            ..ClosureParams::default()
        };
        closure.close(&mut node, &layout, &params);
        assert_relative_eq!(node.mu_t, 0.09, max_relative = 1e-12);
        assert!(node.lam_t > 0.0);
    }

    #[test]
    fn test_injection_follows_activation_flag() {
        let layout = EquationLayout::new(0);
        let mut node = node_with(&layout, 5.0, 0.0);
        let closure = IdealGasClosure::default().with_injection(SourceInjection {
            mass_rate: 2.0,
            total_enthalpy: 3.0e5,
        });

        closure.close(&mut node, &layout, &ClosureParams::default());
        assert_eq!(node.src[EquationLayout::RHO], 0.0);
        assert_eq!(node.src[EquationLayout::RHO_E], 0.0);

        let params = ClosureParams {
            source_injection: true,
            ..ClosureParams::default()
        };
        closure.close(&mut node, &layout, &params);
        closure.close(&mut node, &layout, &params);
        assert_eq!(node.src[EquationLayout::RHO], 2.0);
        assert_relative_eq!(node.src[EquationLayout::RHO_E], 6.0e5, max_relative = 1e-12);

        closure.close(&mut node, &layout, &ClosureParams::default());
        assert_eq!(node.src[EquationLayout::RHO], 0.0);
    }

    #[test]
    fn test_without_injection_sources_are_left_alone() {
        let layout = EquationLayout::new(0);
        let mut node = node_with(&layout, 5.0, 0.0);
        node.src[EquationLayout::RHO_E] = 7.0;
        let params = ClosureParams {
            source_injection: true,
            ..ClosureParams::default()
        };
        IdealGasClosure::default().close(&mut node, &layout, &params);
        assert_eq!(node.src[EquationLayout::RHO_E], 7.0);
    }
}
