//! Dry-depth estimator (spec §4.D): the initial depth of a newly created
//! surficial wetting front.

use crate::soil::SoilType;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DryDepthResult {
    pub depth_cm: f64,
    /// theta_s(top) - theta_top, the width such that volume = depth * delta_theta.
    pub delta_theta: f64,
}

/// d ~= 0.5 * [dt*K/dtheta + sqrt((dt*K/dtheta)^2 + 4*dt*K*|psi_ae|/dtheta)],
/// clamped to the top layer's thickness.
pub fn calc_dry_depth(
    dt_h: f64,
    theta_top: f64,
    top_soil: &SoilType,
    top_k_cm_per_h: f64,
    top_layer_thickness_cm: f64,
) -> DryDepthResult {
    let delta_theta = top_soil.theta_s - theta_top;
    debug_assert!(delta_theta.is_finite());

    let a = dt_h * top_k_cm_per_h / delta_theta;
    let b = 4.0 * dt_h * top_k_cm_per_h * top_soil.psi_ae_cm.abs() / delta_theta;
    let depth_cm = 0.5 * (a + (a * a + b).sqrt());

    DryDepthResult {
        depth_cm: depth_cm.min(top_layer_thickness_cm).max(0.0),
        delta_theta,
    }
}
