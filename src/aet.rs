//! Actual evapotranspiration demand (spec §4.G): a Budyko-style curve that
//! throttles PET down to AET as the root zone dries toward wilting.

/// Above this fraction of plant-available water, AET proceeds at the full
/// potential rate; below it, AET is throttled linearly (exponent e = 1).
const THETA_STAR: f64 = 0.85;

/// Computes the AET demand, in cm, for `dt_h` given `pet_cm_per_h` and the
/// root zone's average saturation fraction `theta_avg`, bounded by
/// `theta_wp` and `theta_s`. The result is a demand only: `advance_fronts`
/// (§4.F phase 6) is what actually withdraws it from the column, capping it
/// further by water actually available above wilting.
pub fn calc_aet_demand_cm(dt_h: f64, pet_cm_per_h: f64, theta_avg: f64, theta_wp: f64, theta_s: f64) -> f64 {
    if pet_cm_per_h <= 0.0 {
        return 0.0;
    }
    let available_range = (theta_s - theta_wp).max(1e-9);
    let saturation_fraction = ((theta_avg - theta_wp) / available_range).clamp(0.0, 1.0);

    let rate_cm_per_h = if saturation_fraction >= THETA_STAR {
        pet_cm_per_h
    } else {
        pet_cm_per_h * (saturation_fraction / THETA_STAR)
    };

    (rate_cm_per_h * dt_h).max(0.0)
}

/// Depth-weighted average theta of the fronts intersecting the root zone
/// (here, all fronts above `root_zone_depth_cm`, or the deepest front if
/// the root zone extends past every existing front).
pub fn root_zone_theta_avg(fronts: &crate::front::FrontList, root_zone_depth_cm: f64, background_theta: f64) -> f64 {
    if fronts.is_empty() {
        return background_theta;
    }

    let mut weighted = 0.0;
    let mut span_total = 0.0;
    let mut prev_depth = 0.0;

    for front in fronts.iter() {
        let depth = front.depth_cm.min(root_zone_depth_cm);
        let span = (depth - prev_depth).max(0.0);
        weighted += span * front.theta;
        span_total += span;
        prev_depth = front.depth_cm;
        if front.depth_cm >= root_zone_depth_cm {
            break;
        }
    }

    if prev_depth < root_zone_depth_cm {
        let span = root_zone_depth_cm - prev_depth;
        weighted += span * background_theta;
        span_total += span;
    }

    if span_total <= 0.0 {
        background_theta
    } else {
        weighted / span_total
    }
}
