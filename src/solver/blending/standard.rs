//! Built-in blending-factor laws.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::traits::{BlendingFunction, BlendingSample, BoxedBlending};

// =============================================================================
// Shared kernels
// =============================================================================

/// `bm² / (bm + x)`, the attenuation shared by every law.
#[inline]
fn attenuate(beta_min: f64, x: f64) -> f64 {
    beta_min * beta_min / (beta_min + x)
}

/// Mean of `beta_min` and the previous factor.
#[inline]
fn relaxed(beta_min: f64, previous: f64) -> f64 {
    (beta_min + previous) * 0.5
}

/// Keep results strictly positive when the attenuation underflows.
#[inline]
fn positive(beta: f64) -> f64 {
    beta.max(f64::MIN_POSITIVE)
}

#[inline]
fn mach_power(delta: f64, mach: f64) -> f64 {
    delta.powf(1.0 / (1.0 + mach))
}

// =============================================================================
// Laws
// =============================================================================

/// `min(bm, bm²/(bm+d))`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Linear;

impl BlendingFunction for Linear {
    fn compute_beta(&self, bm: f64, _previous: f64, s: &BlendingSample) -> f64 {
        positive(bm.min(attenuate(bm, s.delta)))
    }

    fn name(&self) -> &'static str {
        "L"
    }
}

/// Linear law relaxed towards the previous factor.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearRelaxed;

impl BlendingFunction for LinearRelaxed {
    fn compute_beta(&self, bm: f64, previous: f64, s: &BlendingSample) -> f64 {
        positive(relaxed(bm, previous).min(attenuate(bm, s.delta)))
    }

    fn name(&self) -> &'static str {
        "LR"
    }
}

/// `min(bm, bm²/(bm+d²))`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Square;

impl BlendingFunction for Square {
    fn compute_beta(&self, bm: f64, _previous: f64, s: &BlendingSample) -> f64 {
        positive(bm.min(attenuate(bm, s.delta * s.delta)))
    }

    fn name(&self) -> &'static str {
        "S"
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SquareRelaxed;

impl BlendingFunction for SquareRelaxed {
    fn compute_beta(&self, bm: f64, previous: f64, s: &BlendingSample) -> f64 {
        positive(relaxed(bm, previous).min(attenuate(bm, s.delta * s.delta)))
    }

    fn name(&self) -> &'static str {
        "SR"
    }
}

/// `min(bm, bm²/(bm+sqrt(d)))`, the default law.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sqrt;

impl BlendingFunction for Sqrt {
    fn compute_beta(&self, bm: f64, _previous: f64, s: &BlendingSample) -> f64 {
        positive(bm.min(attenuate(bm, s.delta.sqrt())))
    }

    fn name(&self) -> &'static str {
        "SQR"
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SqrtRelaxed;

impl BlendingFunction for SqrtRelaxed {
    fn compute_beta(&self, bm: f64, previous: f64, s: &BlendingSample) -> f64 {
        positive(relaxed(bm, previous).min(attenuate(bm, s.delta.sqrt())))
    }

    fn name(&self) -> &'static str {
        "SQRR"
    }
}

/// Driven by the local gradient factor instead of the relative change.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalGradient;

impl BlendingFunction for LocalGradient {
    fn compute_beta(&self, bm: f64, _previous: f64, s: &BlendingSample) -> f64 {
        positive(bm.min(attenuate(bm, s.gradient_factor)))
    }

    fn name(&self) -> &'static str {
        "LG"
    }

    fn uses_gradient(&self) -> bool {
        true
    }
}

/// `min(bm, bm²/(bm+d^(1/(1+M))))`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MachAdaptive;

impl BlendingFunction for MachAdaptive {
    fn compute_beta(&self, bm: f64, _previous: f64, s: &BlendingSample) -> f64 {
        positive(bm.min(attenuate(bm, mach_power(s.delta, s.mach))))
    }

    fn name(&self) -> &'static str {
        "MACH"
    }

    fn uses_mach(&self) -> bool {
        true
    }
}

/// Mean of the gradient, square and Mach-adaptive drivers.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hybrid;

impl BlendingFunction for Hybrid {
    fn compute_beta(&self, bm: f64, _previous: f64, s: &BlendingSample) -> f64 {
        let x = (s.gradient_factor + s.delta * s.delta + mach_power(s.delta, s.mach)) / 3.0;
        positive(bm.min(attenuate(bm, x)))
    }

    fn name(&self) -> &'static str {
        "HYBRID"
    }

    fn uses_gradient(&self) -> bool {
        true
    }

    fn uses_mach(&self) -> bool {
        true
    }
}

/// Mean of the gradient and square drivers.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mixed;

impl BlendingFunction for Mixed {
    fn compute_beta(&self, bm: f64, _previous: f64, s: &BlendingSample) -> f64 {
        let x = (s.gradient_factor + s.delta * s.delta) * 0.5;
        positive(bm.min(attenuate(bm, x)))
    }

    fn name(&self) -> &'static str {
        "MIXED"
    }

    fn uses_gradient(&self) -> bool {
        true
    }
}

/// `min((bm+prev)/2, bm/(1+d))`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LimitedRelaxed;

impl BlendingFunction for LimitedRelaxed {
    fn compute_beta(&self, bm: f64, previous: f64, s: &BlendingSample) -> f64 {
        positive(relaxed(bm, previous).min(bm / (1.0 + s.delta)))
    }

    fn name(&self) -> &'static str {
        "SR_LIMITED"
    }
}

// =============================================================================
// Selector
// =============================================================================

/// Enum wrapper for the built-in laws.
///
/// Provides zero-cost dispatch and is the form stored in configuration files,
/// where each law is named by its short code (`"SQR"`, `"SR_LIMITED"`, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardBlending {
    #[serde(rename = "L")]
    Linear,
    #[serde(rename = "LR")]
    LinearRelaxed,
    #[serde(rename = "S")]
    Square,
    #[serde(rename = "SR")]
    SquareRelaxed,
    #[default]
    #[serde(rename = "SQR")]
    Sqrt,
    #[serde(rename = "SQRR")]
    SqrtRelaxed,
    #[serde(rename = "LG")]
    LocalGradient,
    #[serde(rename = "MACH")]
    MachAdaptive,
    #[serde(rename = "HYBRID")]
    Hybrid,
    #[serde(rename = "MIXED")]
    Mixed,
    #[serde(rename = "SR_LIMITED")]
    LimitedRelaxed,
}

impl StandardBlending {
    /// All built-in laws.
    pub const ALL: [StandardBlending; 11] = [
        StandardBlending::Linear,
        StandardBlending::LinearRelaxed,
        StandardBlending::Square,
        StandardBlending::SquareRelaxed,
        StandardBlending::Sqrt,
        StandardBlending::SqrtRelaxed,
        StandardBlending::LocalGradient,
        StandardBlending::MachAdaptive,
        StandardBlending::Hybrid,
        StandardBlending::Mixed,
        StandardBlending::LimitedRelaxed,
    ];
}

impl BlendingFunction for StandardBlending {
    fn compute_beta(&self, bm: f64, previous: f64, s: &BlendingSample) -> f64 {
        match self {
            StandardBlending::Linear => Linear.compute_beta(bm, previous, s),
            StandardBlending::LinearRelaxed => LinearRelaxed.compute_beta(bm, previous, s),
            StandardBlending::Square => Square.compute_beta(bm, previous, s),
            StandardBlending::SquareRelaxed => SquareRelaxed.compute_beta(bm, previous, s),
            StandardBlending::Sqrt => Sqrt.compute_beta(bm, previous, s),
            StandardBlending::SqrtRelaxed => SqrtRelaxed.compute_beta(bm, previous, s),
            StandardBlending::LocalGradient => LocalGradient.compute_beta(bm, previous, s),
            StandardBlending::MachAdaptive => MachAdaptive.compute_beta(bm, previous, s),
            StandardBlending::Hybrid => Hybrid.compute_beta(bm, previous, s),
            StandardBlending::Mixed => Mixed.compute_beta(bm, previous, s),
            StandardBlending::LimitedRelaxed => LimitedRelaxed.compute_beta(bm, previous, s),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            StandardBlending::Linear => "L",
            StandardBlending::LinearRelaxed => "LR",
            StandardBlending::Square => "S",
            StandardBlending::SquareRelaxed => "SR",
            StandardBlending::Sqrt => "SQR",
            StandardBlending::SqrtRelaxed => "SQRR",
            StandardBlending::LocalGradient => "LG",
            StandardBlending::MachAdaptive => "MACH",
            StandardBlending::Hybrid => "HYBRID",
            StandardBlending::Mixed => "MIXED",
            StandardBlending::LimitedRelaxed => "SR_LIMITED",
        }
    }

    fn uses_gradient(&self) -> bool {
        matches!(
            self,
            StandardBlending::LocalGradient | StandardBlending::Hybrid | StandardBlending::Mixed
        )
    }

    fn uses_mach(&self) -> bool {
        matches!(self, StandardBlending::MachAdaptive | StandardBlending::Hybrid)
    }
}

impl fmt::Display for StandardBlending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StandardBlending {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StandardBlending::ALL
            .into_iter()
            .find(|law| law.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown blending function '{}'", s))
    }
}

/// Create a boxed blending function from a standard law.
pub fn create_blending(law: StandardBlending) -> BoxedBlending {
    match law {
        StandardBlending::Linear => Box::new(Linear),
        StandardBlending::LinearRelaxed => Box::new(LinearRelaxed),
        StandardBlending::Square => Box::new(Square),
        StandardBlending::SquareRelaxed => Box::new(SquareRelaxed),
        StandardBlending::Sqrt => Box::new(Sqrt),
        StandardBlending::SqrtRelaxed => Box::new(SqrtRelaxed),
        StandardBlending::LocalGradient => Box::new(LocalGradient),
        StandardBlending::MachAdaptive => Box::new(MachAdaptive),
        StandardBlending::Hybrid => Box::new(Hybrid),
        StandardBlending::Mixed => Box::new(Mixed),
        StandardBlending::LimitedRelaxed => Box::new(LimitedRelaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(delta: f64) -> BlendingSample {
        BlendingSample {
            delta,
            gradient_factor: delta,
            mach: 0.3,
        }
    }

    #[test]
    fn test_linear_zero_delta_gives_beta_min() {
        let beta = Linear.compute_beta(0.8, 1.0, &sample(0.0));
        assert_eq!(beta, 0.8);
    }

    #[test]
    fn test_linear_large_delta_tends_to_zero() {
        let b1 = Linear.compute_beta(0.8, 1.0, &sample(1.0e3));
        let b2 = Linear.compute_beta(0.8, 1.0, &sample(1.0e9));
        assert!(b1 < 1.0e-3);
        assert!(b2 < b1);
        assert!(b2 > 0.0);
    }

    #[test]
    fn test_all_laws_stay_in_range() {
        let deltas = [0.0, 1e-12, 1e-6, 0.01, 0.5, 1.0, 10.0, 1e6, 1e300, f64::INFINITY];
        let betas = [1e-3, 0.1, 0.5, 0.99, 1.0];
        let previous = [1e-6, 0.3, 1.0];
        for law in StandardBlending::ALL {
            for &d in &deltas {
                for &bm in &betas {
                    for &prev in &previous {
                        let b = law.compute_beta(bm, prev, &sample(d));
                        assert!(
                            b > 0.0 && b <= bm,
                            "{} gave beta={} for bm={}, prev={}, d={}",
                            law,
                            b,
                            bm,
                            prev,
                            d
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_relaxed_law_follows_previous() {
        // Small change: relaxation towards a small previous beta dominates.
        let b = SquareRelaxed.compute_beta(0.9, 0.1, &sample(1e-8));
        assert!((b - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_limited_relaxed() {
        let b = LimitedRelaxed.compute_beta(1.0, 1.0, &sample(1.0));
        assert!((b - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_mach_law_uses_root() {
        let s = BlendingSample {
            delta: 0.25,
            gradient_factor: 0.0,
            mach: 1.0,
        };
        // d^(1/2) = 0.5 -> 1/(1+0.5)
        let b = MachAdaptive.compute_beta(1.0, 1.0, &s);
        assert!((b - 1.0 / 1.5).abs() < 1e-15);
    }

    #[test]
    fn test_names_round_trip_through_from_str() {
        for law in StandardBlending::ALL {
            let parsed: StandardBlending = law.name().parse().unwrap();
            assert_eq!(parsed, law);
        }
        assert!("BOGUS".parse::<StandardBlending>().is_err());
    }

    #[test]
    fn test_default_is_sqrt() {
        assert_eq!(StandardBlending::default().name(), "SQR");
    }

    #[test]
    fn test_create_boxed_blending() {
        let boxed = create_blending(StandardBlending::Hybrid);
        assert_eq!(boxed.name(), "HYBRID");
        assert!(boxed.uses_gradient());
        assert!(boxed.uses_mach());
    }
}
