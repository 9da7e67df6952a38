//! Infiltration step (spec §4.E): partitions available surface water into
//! infiltration, surface ponding, and surface runoff.

use crate::error::LgarError;
use crate::front::FrontList;
use crate::layer::LayerStack;
use crate::soil::SoilType;

/// Floor on the cumulative-infiltration depth used as the Green-Ampt "F"
/// term, to avoid dividing by zero for a front created at (near) zero depth.
const MIN_CUMULATIVE_DEPTH_CM: f64 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfiltrationResult {
    pub infiltrated_cm: f64,
    pub runoff_cm: f64,
    pub ponding_cm: f64,
}

/// The shallowest front whose theta is below its layer's theta_s: the
/// free-drainage front that accepts surface water directly (spec §4.E
/// step 1, and the "free-drainage-demand index" threaded through §4.F).
pub fn free_drainage_index(fronts: &FrontList, layers: &LayerStack, soil_types: &[SoilType]) -> Option<usize> {
    for (i, front) in fronts.iter().enumerate() {
        let theta_s = soil_types[layers.get(front.layer_num).soil_type_idx].theta_s;
        if front.theta < theta_s - 1e-9 {
            return Some(i);
        }
    }
    None
}

/// Series (resistance-in-depth) composite conductivity of the stack of
/// fronts from the surface down to and including `idx`: the "cumulative
/// conductance stack of wetter fronts above" in spec §4.E step 2.
fn composite_conductivity(fronts: &FrontList, idx: usize) -> f64 {
    let mut prev_depth = 0.0;
    let mut resistance = 0.0;
    for i in 0..=idx {
        let front = fronts.get(i);
        let thickness = (front.depth_cm - prev_depth).max(0.0);
        resistance += thickness / front.k_cm_per_h.max(1e-12);
        prev_depth = front.depth_cm;
    }
    let total_depth = fronts.get(idx).depth_cm.max(MIN_CUMULATIVE_DEPTH_CM);
    if resistance <= 0.0 {
        fronts.get(idx).k_cm_per_h
    } else {
        total_depth / resistance
    }
}

/// Green-Ampt infiltration capacity for `dt_h`, using the free-drainage
/// front's layer properties, its theta, and the conductance stack above it.
fn infiltration_capacity_cm(
    fronts: &FrontList,
    free_drainage_idx: usize,
    layers: &LayerStack,
    soil_types: &[SoilType],
    dt_h: f64,
) -> Result<f64, LgarError> {
    let front = fronts.get(free_drainage_idx);
    let soil = &soil_types[layers.get(front.layer_num).soil_type_idx];

    let delta_theta = soil.theta_s - front.theta;
    let cumulative_depth_cm = front.depth_cm.max(MIN_CUMULATIVE_DEPTH_CM);
    let k_composite = composite_conductivity(fronts, free_drainage_idx);

    let capacity_rate_cm_per_h = k_composite * (1.0 + front.psi_cm.abs() * delta_theta / cumulative_depth_cm);
    let capacity_cm = capacity_rate_cm_per_h * dt_h;

    if capacity_cm < 0.0 {
        return Err(LgarError::Numeric(format!(
            "negative infiltration capacity {capacity_cm:.6} cm at front {free_drainage_idx}"
        )));
    }
    Ok(capacity_cm)
}

/// Partitions `available_w_cm` of surface water into infiltration, runoff,
/// and remaining ponding, per spec §4.E.
pub fn run_infiltration_step(
    available_w_cm: f64,
    precip_rate_cm_per_h: f64,
    dt_h: f64,
    fronts: &FrontList,
    layers: &LayerStack,
    soil_types: &[SoilType],
    ponded_depth_max_cm: f64,
) -> Result<InfiltrationResult, LgarError> {
    let free_drainage_idx = free_drainage_index(fronts, layers, soil_types).ok_or_else(|| {
        LgarError::invariant(
            "I5",
            "no unsaturated front available to accept infiltration",
            fronts.as_slice(),
        )
    })?;

    let capacity_cm = infiltration_capacity_cm(fronts, free_drainage_idx, layers, soil_types, dt_h)?;

    if precip_rate_cm_per_h * dt_h <= capacity_cm && available_w_cm <= capacity_cm {
        return Ok(InfiltrationResult {
            infiltrated_cm: available_w_cm,
            runoff_cm: 0.0,
            ponding_cm: 0.0,
        });
    }

    let infiltrated_cm = capacity_cm;
    let residual_cm = available_w_cm - capacity_cm;
    let new_pond_cm = residual_cm.min(ponded_depth_max_cm).max(0.0);
    let runoff_cm = (residual_cm - new_pond_cm).max(0.0);

    Ok(InfiltrationResult {
        infiltrated_cm,
        runoff_cm,
        ponding_cm: new_pond_cm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::WettingFront;

    fn soil() -> SoilType {
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

    fn one_layer_one_front(theta: f64, depth: f64, k: f64) -> (FrontList, LayerStack, Vec<SoilType>) {
        let layers = LayerStack::new(vec![(200.0, 0)]);
        let mut fronts = FrontList::new();
        fronts.append(WettingFront::new(depth, theta, 10.0, 1, k));
        (fronts, layers, vec![soil()])
    }

    #[test]
    fn light_rain_all_infiltrates() {
        let (fronts, layers, soils) = one_layer_one_front(0.2, 5.0, 0.4);
        let result = run_infiltration_step(0.01, 0.2, 300.0 / 3600.0, &fronts, &layers, &soils, 1.0).unwrap();
        assert_eq!(result.runoff_cm, 0.0);
        assert_eq!(result.ponding_cm, 0.0);
        assert_eq!(result.infiltrated_cm, 0.01);
    }

    #[test]
    fn heavy_rain_generates_runoff_once_pond_caps() {
        let (fronts, layers, soils) = one_layer_one_front(0.4, 2.0, 0.05);
        let result = run_infiltration_step(50.0, 100.0, 0.5, &fronts, &layers, &soils, 1.0).unwrap();
        assert!(result.infiltrated_cm < 50.0);
        assert!(result.ponding_cm <= 1.0 + 1e-9);
        assert!(result.runoff_cm >= 0.0);
        let total = result.infiltrated_cm + result.runoff_cm + result.ponding_cm;
        assert!((total - 50.0).abs() < 1e-9);
    }

    #[test]
    fn no_unsaturated_front_is_an_invariant_error() {
        let (fronts, layers, soils) = one_layer_one_front(0.45, 5.0, 0.4);
        let result = run_infiltration_step(0.01, 0.2, 300.0 / 3600.0, &fronts, &layers, &soils, 1.0);
        assert!(result.is_err());
    }
}
