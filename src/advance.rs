//! Front advancer (spec §4.F) - the central procedure of the solver: moves,
//! merges, crosses layers, and annihilates fronts over one sub-step.

use crate::error::LgarError;
use crate::front::{FrontList, WettingFront};
use crate::layer::LayerStack;
use crate::soil::SoilType;

const MIN_DELTA_Z_CM: f64 = 1.0e-6;
const MIN_DEFICIT: f64 = 1.0e-6;
const THETA_TOLERANCE: f64 = 1.0e-9;
const MASS_BALANCE_LOCAL_TOL_CM: f64 = 1.0e-7;

pub struct AdvanceResult {
    /// Water leaving the column past its bottom boundary this sub-step,
    /// written back into what was the infiltrated-volume argument (spec §9,
    /// "in-out scalar parameters" re-architected as a returned aggregate).
    pub percolation_cm: f64,
    /// AET actually withdrawn this sub-step (may be less than demanded if
    /// fronts ran out of available water above residual/wilting).
    pub aet_taken_cm: f64,
}

/// Moves, merges, crosses, and annihilates every front in `fronts` over
/// `dt_h`, given `infiltration_cm` of new water and `aet_demand_cm` of
/// evapotranspiration demand for this sub-step.
#[allow(clippy::too_many_arguments)]
pub fn advance_fronts(
    fronts: &mut FrontList,
    layers: &LayerStack,
    soil_types: &[SoilType],
    background_theta: &[f64],
    dt_h: f64,
    infiltration_cm: f64,
    aet_demand_cm: f64,
    ponded_depth_cm: f64,
    wilting_point_psi_cm: f64,
) -> Result<AdvanceResult, LgarError> {
    if fronts.is_empty() {
        return Ok(AdvanceResult {
            percolation_cm: infiltration_cm,
            aet_taken_cm: 0.0,
        });
    }

    compute_dzdt(fronts, ponded_depth_cm, background_theta);

    let mut percolation_cm = advance_depths_and_theta(fronts, layers, soil_types, background_theta, dt_h, infiltration_cm)?;

    merge_same_layer_violations(fronts, layers, soil_types);

    percolation_cm += cross_layers(fronts, layers, soil_types, background_theta, dt_h);

    annihilate_background_fronts(fronts, background_theta);

    let aet_taken_cm = withdraw_aet(fronts, layers, soil_types, wilting_point_psi_cm, aet_demand_cm);
    annihilate_below_residual(fronts, layers, soil_types);

    normalize_psi_and_k(fronts, layers, soil_types);

    for front in fronts.iter() {
        if !front.is_finite() {
            return Err(LgarError::Numeric(format!(
                "non-finite wetting front attribute after advance: {front:?}"
            )));
        }
        let soil = &soil_types[layers.get(front.layer_num).soil_type_idx];
        if front.theta < soil.theta_r - THETA_TOLERANCE || front.theta > soil.theta_s + THETA_TOLERANCE {
            return Err(LgarError::invariant(
                "theta_range",
                format!("front theta {} outside [{}, {}]", front.theta, soil.theta_r, soil.theta_s),
                fronts.as_slice(),
            ));
        }
    }
    check_depth_order(fronts)?;
    check_psi_continuity(fronts, layers)?;

    Ok(AdvanceResult {
        percolation_cm,
        aet_taken_cm,
    })
}

/// Phase 1: Darcy-Buckingham dzdt for every front, driven by the head
/// gradient against the shallower non-dry neighbour (or the surface for
/// the head front). `to_bottom` fronts are pinned: their velocity is
/// carried by the companion front created in the next layer instead.
fn compute_dzdt(fronts: &mut FrontList, ponded_depth_cm: f64, background_theta: &[f64]) {
    let n = fronts.len();
    let snapshot: Vec<WettingFront> = fronts.to_vec();

    for i in 0..n {
        if snapshot[i].to_bottom {
            fronts.get_mut(i).dzdt_cm_per_h = 0.0;
            continue;
        }

        let (prev_depth, prev_psi) = if i == 0 {
            (0.0, -ponded_depth_cm)
        } else {
            (snapshot[i - 1].depth_cm, snapshot[i - 1].psi_cm)
        };
        let delta_z = (snapshot[i].depth_cm - prev_depth).max(MIN_DELTA_Z_CM);

        let deficit = if i + 1 < n && snapshot[i + 1].layer_num == snapshot[i].layer_num {
            snapshot[i].theta - snapshot[i + 1].theta
        } else {
            snapshot[i].theta - background_theta[snapshot[i].layer_num - 1]
        }
        .max(MIN_DEFICIT);

        let dzdt = (snapshot[i].k_cm_per_h / deficit) * (1.0 + (prev_psi - snapshot[i].psi_cm) / delta_z);
        fronts.get_mut(i).dzdt_cm_per_h = dzdt.max(0.0);
    }
}

/// Phase 2: advance every front deepest to shallowest. The deepest front
/// receives the infiltrated water and reports any spill past theta_s or
/// past the column bottom as percolation.
fn advance_depths_and_theta(
    fronts: &mut FrontList,
    layers: &LayerStack,
    soil_types: &[SoilType],
    background_theta: &[f64],
    dt_h: f64,
    infiltration_cm: f64,
) -> Result<f64, LgarError> {
    let n = fronts.len();
    let mut percolation_cm = 0.0;
    let column_bottom_cm = layers.total_depth_cm();

    for i in (0..n).rev() {
        if i == n - 1 {
            let prev_depth = if i == 0 {
                layers.get(fronts.get(i).layer_num).top_depth_cm()
            } else {
                fronts.get(i - 1).depth_cm
            };
            let span = (fronts.get(i).depth_cm - prev_depth).max(MIN_DELTA_Z_CM);

            let soil = &soil_types[layers.get(fronts.get(i).layer_num).soil_type_idx];
            let new_theta = fronts.get(i).theta + infiltration_cm / span;

            if new_theta > soil.theta_s {
                let excess_theta = new_theta - soil.theta_s;
                percolation_cm += excess_theta * span;
                fronts.get_mut(i).theta = soil.theta_s;
            } else {
                fronts.get_mut(i).theta = new_theta;
            }

            let dzdt = fronts.get(i).dzdt_cm_per_h;
            fronts.get_mut(i).depth_cm += dzdt * dt_h;
        } else if !fronts.get(i).to_bottom {
            let dzdt = fronts.get(i).dzdt_cm_per_h;
            fronts.get_mut(i).depth_cm += dzdt * dt_h;

            if fronts.get(i).layer_num != fronts.get(i + 1).layer_num {
                // Boundary pair: re-impose ψ-continuity (I4) against the
                // already-updated deeper companion.
                let psi = fronts.get(i + 1).psi_cm;
                let soil = &soil_types[layers.get(fronts.get(i).layer_num).soil_type_idx];
                fronts.get_mut(i).psi_cm = psi;
                fronts.get_mut(i).theta = soil.theta_of_psi(psi);
            }
        }
    }

    let deepest = fronts.tail().unwrap();
    if deepest.depth_cm > column_bottom_cm {
        let overshoot = deepest.depth_cm - column_bottom_cm;
        let soil = &soil_types[layers.get(deepest.layer_num).soil_type_idx];
        let deficit = (deepest.theta - background_theta[deepest.layer_num - 1]).max(MIN_DEFICIT);
        percolation_cm += overshoot * deficit;
        let idx = n - 1;
        fronts.get_mut(idx).depth_cm = column_bottom_cm;
        let _ = soil;
    }

    Ok(percolation_cm)
}

/// Phase 3: while a shallower front's theta is <= its same-layer
/// successor's (violating I2), absorb it into the successor by
/// depth-weighted averaging that preserves water volume.
fn merge_same_layer_violations(fronts: &mut FrontList, layers: &LayerStack, soil_types: &[SoilType]) {
    loop {
        let mut merged = false;
        let mut i = 0;
        while i + 1 < fronts.len() {
            let cur = *fronts.get(i);
            let next = *fronts.get(i + 1);
            if cur.layer_num == next.layer_num && cur.theta <= next.theta + THETA_TOLERANCE {
                let prev_depth = if i == 0 {
                    layers.get(cur.layer_num).top_depth_cm()
                } else {
                    fronts.get(i - 1).depth_cm
                };
                let span_cur = (cur.depth_cm - prev_depth).max(MIN_DELTA_Z_CM);
                let span_next = (next.depth_cm - cur.depth_cm).max(MIN_DELTA_Z_CM);
                let total_span = (next.depth_cm - prev_depth).max(MIN_DELTA_Z_CM);

                let merged_theta = (span_cur * cur.theta + span_next * next.theta) / total_span;
                let soil = &soil_types[layers.get(next.layer_num).soil_type_idx];
                let k = layers.scale_k(next.layer_num, soil.k_of_theta(merged_theta));

                fronts.delete(i);
                let merged_front = fronts.get_mut(i);
                merged_front.theta = merged_theta;
                merged_front.psi_cm = soil.psi_of_theta(merged_theta);
                merged_front.k_cm_per_h = k;
                merged = true;
            } else {
                i += 1;
            }
        }
        if !merged {
            break;
        }
    }
}

/// Phase 4: any front whose advance carried it past its layer's bottom is
/// pinned to the boundary and spawns a companion in the next layer at the
/// same physical level, with ψ-continuity determining the companion's theta.
fn cross_layers(
    fronts: &mut FrontList,
    layers: &LayerStack,
    soil_types: &[SoilType],
    background_theta: &[f64],
    dt_h: f64,
) -> f64 {
    let mut percolation_cm = 0.0;
    let mut i = 0;
    while i < fronts.len() {
        let front = *fronts.get(i);
        if front.to_bottom || front.layer_num > layers.len() {
            i += 1;
            continue;
        }
        let boundary = layers.get(front.layer_num).cumulative_depth_cm;
        if front.depth_cm <= boundary {
            i += 1;
            continue;
        }

        let excess = front.depth_cm - boundary;

        if front.layer_num == layers.len() {
            // The last layer's bottom is the column bottom: this is the
            // percolation boundary itself, not a layer crossing. Clamp
            // without pinning to_bottom (there is no companion to pair
            // with) and report the overshoot as percolation.
            let deficit = (front.theta - background_theta[front.layer_num - 1]).max(MIN_DEFICIT);
            percolation_cm += excess * deficit;
            fronts.get_mut(i).depth_cm = boundary;
            i += 1;
            continue;
        }

        fronts.get_mut(i).depth_cm = boundary;
        fronts.get_mut(i).to_bottom = true;

        let next_layer_num = front.layer_num + 1;
        let next_soil = &soil_types[layers.get(next_layer_num).soil_type_idx];
        let psi = fronts.get(i).psi_cm;
        let companion_theta = next_soil.theta_of_psi(psi);
        let companion_k = layers.scale_k(next_layer_num, next_soil.k_of_theta(companion_theta));
        let companion = WettingFront {
            depth_cm: (boundary + excess).min(layers.get(next_layer_num).cumulative_depth_cm),
            theta: companion_theta,
            psi_cm: psi,
            layer_num: next_layer_num,
            k_cm_per_h: companion_k,
            dzdt_cm_per_h: excess / dt_h.max(MIN_DELTA_Z_CM),
            to_bottom: false,
        };
        fronts.insert_before(i + 1, companion);
        i += 2;
    }
    percolation_cm
}

/// Phase 5: the shallowest front that has equalized with its layer's
/// background theta is no longer a meaningful wetting front; delete it.
fn annihilate_background_fronts(fronts: &mut FrontList, background_theta: &[f64]) {
    loop {
        let mut to_delete = None;
        for i in 0..fronts.len() {
            let front = fronts.get(i);
            if (front.theta - background_theta[front.layer_num - 1]).abs() <= THETA_TOLERANCE {
                to_delete = Some(i);
                break;
            }
        }
        match to_delete {
            Some(i) => {
                fronts.delete(i);
            }
            None => break,
        }
    }
}

/// Phase 6: subtract AET in proportion to each front's soil-water
/// availability above wilting, returning the total actually withdrawn.
fn withdraw_aet(fronts: &mut FrontList, layers: &LayerStack, soil_types: &[SoilType], wilting_point_psi_cm: f64, aet_demand_cm: f64) -> f64 {
    if aet_demand_cm <= 0.0 || fronts.is_empty() {
        return 0.0;
    }

    let n = fronts.len();
    let mut spans = vec![0.0; n];
    let mut availabilities = vec![0.0; n];
    let mut prev_depth = 0.0;

    for i in 0..n {
        let front = *fronts.get(i);
        let span = (front.depth_cm - prev_depth).max(MIN_DELTA_Z_CM);
        spans[i] = span;
        prev_depth = front.depth_cm;

        let soil = &soil_types[layers.get(front.layer_num).soil_type_idx];
        let theta_wp = soil.theta_of_psi(wilting_point_psi_cm);
        availabilities[i] = (span * (front.theta - theta_wp)).max(0.0);
    }

    let total_availability: f64 = availabilities.iter().sum();
    if total_availability <= 0.0 {
        return 0.0;
    }

    let aet_applied_cm = aet_demand_cm.min(total_availability);
    for i in 0..n {
        if availabilities[i] <= 0.0 {
            continue;
        }
        let share_cm = aet_applied_cm * availabilities[i] / total_availability;
        let front = fronts.get_mut(i);
        front.theta -= share_cm / spans[i];
    }

    aet_applied_cm
}

/// Phase 6 (continued): a front driven below its layer's residual theta is
/// no longer physical and is annihilated.
fn annihilate_below_residual(fronts: &mut FrontList, layers: &LayerStack, soil_types: &[SoilType]) {
    let mut i = 0;
    while i < fronts.len() {
        let front = *fronts.get(i);
        let soil = &soil_types[layers.get(front.layer_num).soil_type_idx];
        if front.theta < soil.theta_r + THETA_TOLERANCE {
            fronts.delete(i);
        } else {
            i += 1;
        }
    }
}

fn normalize_psi_and_k(fronts: &mut FrontList, layers: &LayerStack, soil_types: &[SoilType]) {
    for i in 0..fronts.len() {
        let front = *fronts.get(i);
        let soil = &soil_types[layers.get(front.layer_num).soil_type_idx];
        if !front.to_bottom {
            let psi = soil.psi_of_theta(front.theta);
            fronts.get_mut(i).psi_cm = psi;
        }
        let k = layers.scale_k(front.layer_num, soil.k_of_theta(fronts.get(i).theta));
        fronts.get_mut(i).k_cm_per_h = k;
    }
}

fn check_depth_order(fronts: &FrontList) -> Result<(), LgarError> {
    for i in 0..fronts.len().saturating_sub(1) {
        if fronts.get(i).depth_cm > fronts.get(i + 1).depth_cm + MASS_BALANCE_LOCAL_TOL_CM {
            return Err(LgarError::invariant(
                "I1",
                format!("front {i} deeper than its successor"),
                fronts.as_slice(),
            ));
        }
    }
    Ok(())
}

fn check_psi_continuity(fronts: &FrontList, layers: &LayerStack) -> Result<(), LgarError> {
    for i in 0..fronts.len().saturating_sub(1) {
        let cur = fronts.get(i);
        let next = fronts.get(i + 1);
        if cur.to_bottom && cur.layer_num != next.layer_num {
            if (cur.psi_cm - next.psi_cm).abs() > 1.0e-9 {
                return Err(LgarError::invariant(
                    "I4",
                    format!("psi discontinuity across layer {} / {} boundary", cur.layer_num, next.layer_num),
                    fronts.as_slice(),
                ));
            }
            if cur.layer_num >= layers.len() {
                return Err(LgarError::invariant(
                    "I3",
                    "to_bottom front has no deeper layer to pair with",
                    fronts.as_slice(),
                ));
            }
        }
    }
    Ok(())
}
