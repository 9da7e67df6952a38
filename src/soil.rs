//! Van Genuchten-Mualem soil hydraulics (spec §4.A).
//!
//! Pure, allocation-free functions of a [`SoilType`] and a tension head or
//! water content. Kept free of any front-list state so they stay trivially
//! testable and usable from a parallel context later.

use serde::{Deserialize, Serialize};

/// Effective-saturation clamp used before every exponentiation, per spec §4.A.
const SE_EPSILON: f64 = 1e-6;

/// Immutable, per-type soil hydraulic record.
///
/// `name` is carried through from the soil parameter file so config loading
/// (§4.J) can resolve a layer's textual soil-type name to an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilType {
    pub name: String,
    /// Saturated water content (a.k.a. theta_e, porosity).
    pub theta_s: f64,
    /// Residual water content.
    pub theta_r: f64,
    /// Van Genuchten alpha, 1/cm.
    pub alpha_per_cm: f64,
    /// Van Genuchten n.
    pub n: f64,
    /// Saturated hydraulic conductivity, cm/h.
    pub ks_cm_per_h: f64,
    /// Air-entry / bubbling pressure head, cm.
    pub psi_ae_cm: f64,
    /// Optional Brooks-Corey lambda (not used by the van Genuchten closed
    /// forms, carried through for completeness of the soil-table record).
    pub lambda: Option<f64>,
}

impl SoilType {
    /// m = 1 - 1/n, the van Genuchten shape parameter.
    pub fn m(&self) -> f64 {
        1.0 - 1.0 / self.n
    }

    fn delta_theta(&self) -> f64 {
        self.theta_s - self.theta_r
    }

    fn effective_saturation(&self, theta: f64) -> f64 {
        let se = (theta - self.theta_r) / self.delta_theta();
        se.clamp(SE_EPSILON, 1.0 - SE_EPSILON)
    }

    /// theta(psi): water content at tension head `psi_cm` (cm, psi >= 0 is
    /// unsaturated tension; psi <= 0 means saturated).
    pub fn theta_of_psi(&self, psi_cm: f64) -> f64 {
        if psi_cm <= 0.0 {
            return self.theta_s;
        }
        let m = self.m();
        let denom = (1.0 + (self.alpha_per_cm * psi_cm).powf(self.n)).powf(m);
        self.theta_r + self.delta_theta() / denom
    }

    /// psi(theta): tension head consistent with water content `theta`, by
    /// inverting theta(psi). Returns 0 at or above saturation.
    pub fn psi_of_theta(&self, theta: f64) -> f64 {
        if theta >= self.theta_s {
            return 0.0;
        }
        let m = self.m();
        let se = self.effective_saturation(theta);
        let inner = se.powf(-1.0 / m) - 1.0;
        if inner <= 0.0 {
            return 0.0;
        }
        inner.powf(1.0 / self.n) / self.alpha_per_cm
    }

    /// K(theta): Mualem hydraulic conductivity, cm/h.
    pub fn k_of_theta(&self, theta: f64) -> f64 {
        let m = self.m();
        let se = self.effective_saturation(theta);
        let inner = 1.0 - (1.0 - se.powf(1.0 / m)).powf(m);
        self.ks_cm_per_h * se.sqrt() * inner * inner
    }

    /// dK/dtheta, analytic derivative of [`SoilType::k_of_theta`].
    ///
    /// Zero on psi(theta) <= 0 (saturated), per spec §4.A's numeric guard.
    pub fn dk_dtheta(&self, theta: f64) -> f64 {
        if self.psi_of_theta(theta) <= 0.0 {
            return 0.0;
        }
        let m = self.m();
        let se = self.effective_saturation(theta);
        let a = se.powf(1.0 / m);
        let b = 1.0 - a;
        let d = 1.0 - b.powf(m);

        let term1 = 0.5 * d * d / se.sqrt();
        let term2 = 2.0 * d * b.powf(m - 1.0) * se.powf(1.0 / m - 0.5);
        let dk_dse = self.ks_cm_per_h * (term1 + term2);

        dk_dse / self.delta_theta()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn silt_loam() -> SoilType {
        SoilType {
            name: "silt loam".to_string(),
            theta_s: 0.45,
            theta_r: 0.067,
            alpha_per_cm: 0.02,
            n: 1.41,
            ks_cm_per_h: 0.45,
            psi_ae_cm: 14.66,
            lambda: None,
        }
    }

    #[test]
    fn theta_psi_round_trip() {
        let soil = silt_loam();
        for psi in [5.0, 20.0, 50.0, 150.0] {
            let theta = soil.theta_of_psi(psi);
            let psi_back = soil.psi_of_theta(theta);
            assert_abs_diff_eq!(psi, psi_back, epsilon = 1e-6);
        }
    }

    #[test]
    fn saturated_tension_gives_theta_s() {
        let soil = silt_loam();
        assert_eq!(soil.theta_of_psi(0.0), soil.theta_s);
        assert_eq!(soil.theta_of_psi(-1.0), soil.theta_s);
    }

    #[test]
    fn conductivity_is_monotone_in_theta() {
        let soil = silt_loam();
        let k_dry = soil.k_of_theta(soil.theta_r + 0.05);
        let k_wet = soil.k_of_theta(soil.theta_s - 0.001);
        assert!(k_wet > k_dry);
        assert!(k_wet <= soil.ks_cm_per_h * 1.0 + 1e-9);
    }

    #[test]
    fn conductivity_derivative_positive_when_unsaturated() {
        let soil = silt_loam();
        let theta = (soil.theta_r + soil.theta_s) / 2.0;
        assert!(soil.dk_dtheta(theta) > 0.0);
    }

    #[test]
    fn conductivity_derivative_zero_at_saturation() {
        let soil = silt_loam();
        assert_eq!(soil.dk_dtheta(soil.theta_s), 0.0);
    }
}
