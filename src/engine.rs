//! Sub-stepping driver and engine lifecycle (spec §4.H, §6): orchestrates
//! one forcing interval across its sub-steps and exposes the BMI-shaped
//! `initialize`/`update`/`update_until`/`finalize` surface.

use log::{debug, trace};

use crate::advance::advance_fronts;
use crate::aet::{calc_aet_demand_cm, root_zone_theta_avg};
use crate::config::{Config, SoilParamsTable, Verbosity};
use crate::dry_depth::calc_dry_depth;
use crate::error::{ConfigError, LgarError, MassBalanceScope};
use crate::front::{FrontList, WettingFront};
use crate::giuh::GiuhBuffer;
use crate::infiltration::run_infiltration_step;
use crate::layer::LayerStack;
use crate::mass_balance::{column_storage, MassBalanceLedger};
use crate::soil::SoilType;
use crate::units::Units;

const LOCAL_MASS_BALANCE_TOL_CM: f64 = 1.0e-7;
const GLOBAL_MASS_BALANCE_TOL_CM: f64 = 1.0e-6;

/// Everything the driver needs to read post-update, matching spec §6's
/// enumerated outputs (the "in-out scalar parameters -> returned
/// aggregate" re-architecture of spec §9 applied to a whole step).
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub precipitation_cm: f64,
    pub potential_evapotranspiration_cm: f64,
    pub actual_evapotranspiration_cm: f64,
    pub surface_runoff_cm: f64,
    pub giuh_runoff_cm: f64,
    pub soil_storage_cm: f64,
    pub total_discharge_cm: f64,
    pub infiltration_cm: f64,
    pub percolation_cm: f64,
}

pub struct LgarEngine {
    config: Config,
    units: Units,
    layers: LayerStack,
    soil_types: Vec<SoilType>,
    fronts: FrontList,
    background_theta: Vec<f64>,
    giuh: GiuhBuffer,
    ponded_depth_cm: f64,
    prev_precip_cm_per_h: f64,
    time_s: f64,
    cumulative: MassBalanceLedger,
    last_report: StepReport,
}

impl LgarEngine {
    /// Builds the engine from a validated [`Config`], loading the soil
    /// parameter table and setting every layer's initial θ from
    /// `initial_psi_cm` via its soil type's retention curve.
    pub fn initialize(config: Config) -> Result<Self, LgarError> {
        let soil_text = std::fs::read_to_string(&config.soil_params_file)
            .map_err(|e| ConfigError::new("config.io", format!("reading soil_params_file: {e}")))?;
        let table = SoilParamsTable::parse(&soil_text)?;
        config.validate(&table.types)?;

        let layer_specs: Result<Vec<(f64, usize)>, ConfigError> = config
            .layer_thickness_cm
            .iter()
            .zip(config.layer_soil_type.iter())
            .map(|(thickness, name)| {
                table
                    .index_of(name)
                    .map(|idx| (*thickness, idx))
                    .ok_or_else(|| ConfigError::new("layers.soil_type", format!("soil type '{name}' not found")))
            })
            .collect();
        let layers = LayerStack::new(layer_specs?);

        let background_theta: Vec<f64> = (1..=layers.len())
            .map(|layer_num| table.types[layers.get(layer_num).soil_type_idx].theta_of_psi(config.initial_psi_cm))
            .collect();

        let giuh = GiuhBuffer::new(config.giuh_ordinates.clone());

        Ok(Self {
            units: Units::default(),
            layers,
            soil_types: table.types,
            fronts: FrontList::new(),
            background_theta,
            giuh,
            ponded_depth_cm: 0.0,
            prev_precip_cm_per_h: 0.0,
            time_s: 0.0,
            cumulative: MassBalanceLedger::default(),
            last_report: StepReport::default(),
            config,
        })
    }

    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    pub fn last_report(&self) -> &StepReport {
        &self.last_report
    }

    pub fn soil_moisture_layers(&self) -> Vec<f64> {
        (1..=self.layers.len())
            .map(|layer_num| match self.fronts.indices_in_layer(layer_num).last() {
                Some(&idx) => self.fronts.get(idx).theta,
                None => self.background_theta[layer_num - 1],
            })
            .collect()
    }

    pub fn soil_thickness_layers_m(&self) -> Vec<f64> {
        self.layers.iter().map(|l| self.units.cm_to_m(l.thickness_cm)).collect()
    }

    pub fn soil_moisture_wetting_fronts(&self) -> Vec<f64> {
        self.fronts.iter().map(|f| f.theta).collect()
    }

    pub fn soil_thickness_wetting_fronts_m(&self) -> Vec<f64> {
        self.fronts.iter().map(|f| self.units.cm_to_m(f.depth_cm)).collect()
    }

    pub fn soil_num_wetting_fronts(&self) -> usize {
        self.fronts.len()
    }

    /// Sets a layer's frozen factor (spec §3.2, `sft_coupled`), scaling its
    /// effective Ks for every subsequent step. Intended to be driven from
    /// the `soil_temperature_profile` input when `sft_coupled` is set; the
    /// frozen-soil temperature physics itself is out of scope (spec
    /// Non-goals), only this scalar hook is implemented.
    pub fn set_frozen_factor(&mut self, layer_num: usize, factor: f64) {
        self.layers.set_frozen_factor(layer_num, factor);
    }

    /// Advances one forcing interval (`config.forcing_resolution_h`),
    /// split into `forcing_interval()` sub-steps of `timestep_h`.
    pub fn update(&mut self, precipitation_rate_mm_per_h: f64, pet_rate_mm_per_h: f64) -> Result<(), LgarError> {
        let dt_h = self.config.timestep_h;
        let n_substeps = self.config.forcing_interval();

        let precip_cm_per_h = self.units.mm_per_h_to_cm_per_h(precipitation_rate_mm_per_h).max(0.0);
        let pet_cm_per_h = self.units.mm_per_h_to_cm_per_h(pet_rate_mm_per_h).max(0.0);

        let mut step_ledger = MassBalanceLedger::default();
        let mut total_discharge_cm = 0.0;

        for _ in 0..n_substeps {
            let sub = self.run_substep(precip_cm_per_h, pet_cm_per_h, dt_h)?;
            step_ledger.accumulate(&sub);
            total_discharge_cm += sub.giuh_runoff_cm;
            self.prev_precip_cm_per_h = precip_cm_per_h;
            self.time_s += self.units.hours_to_seconds(dt_h);
        }

        self.cumulative.accumulate(&step_ledger);

        self.last_report = StepReport {
            precipitation_cm: step_ledger.precipitation_cm,
            potential_evapotranspiration_cm: step_ledger.pet_cm,
            actual_evapotranspiration_cm: step_ledger.aet_cm,
            surface_runoff_cm: step_ledger.surface_runoff_cm,
            giuh_runoff_cm: step_ledger.giuh_runoff_cm,
            soil_storage_cm: step_ledger.storage_cm,
            total_discharge_cm,
            infiltration_cm: step_ledger.infiltration_cm,
            percolation_cm: step_ledger.percolation_cm,
        };

        let global_residual = self.cumulative.residual(0.0, 0.0);
        if global_residual.abs() > GLOBAL_MASS_BALANCE_TOL_CM {
            return Err(LgarError::mass_balance(
                global_residual,
                GLOBAL_MASS_BALANCE_TOL_CM,
                MassBalanceScope::Global,
                self.fronts.as_slice(),
            ));
        }

        Ok(())
    }

    /// Steps repeatedly until `self.time_s >= t_s`. Per spec §9's resolved
    /// open question, `t_s` must be reachable by a whole number of
    /// forcing intervals from the current time; otherwise this is a
    /// configuration error rather than a silent single step.
    pub fn update_until(
        &mut self,
        t_s: f64,
        precipitation_rate_mm_per_h: f64,
        pet_rate_mm_per_h: f64,
    ) -> Result<(), LgarError> {
        let interval_s = self.units.hours_to_seconds(self.config.forcing_resolution_h);
        let remaining_s = t_s - self.time_s;
        if remaining_s < 0.0 {
            return Err(LgarError::Config(ConfigError::new(
                "update_until.past",
                format!("target time {t_s} s is before current time {}", self.time_s),
            )));
        }
        let steps = remaining_s / interval_s;
        if (steps - steps.round()).abs() > 1e-6 {
            return Err(LgarError::Config(ConfigError::new(
                "update_until.unreachable",
                format!("target time {t_s} s is not reachable by a whole number of forcing intervals of {interval_s} s"),
            )));
        }
        for _ in 0..steps.round() as usize {
            self.update(precipitation_rate_mm_per_h, pet_rate_mm_per_h)?;
        }
        Ok(())
    }

    pub fn finalize(self) -> MassBalanceLedger {
        self.cumulative
    }

    fn run_substep(&mut self, precip_cm_per_h: f64, pet_cm_per_h: f64, dt_h: f64) -> Result<MassBalanceLedger, LgarError> {
        let start_storage_cm = column_storage(&self.fronts, &self.layers, &self.background_theta);
        let prev_pond_cm = self.ponded_depth_cm;
        let _snapshot = self.fronts.copy_whole_list();

        let precip_cm = precip_cm_per_h * dt_h;
        let mut ponded_cm = prev_pond_cm + precip_cm;

        let root_zone_depth_cm = self.layers.total_depth_cm().min(self.layers.get(1).thickness_cm * 2.0);
        let top_background = self.background_theta[0];
        let theta_avg = root_zone_theta_avg(&self.fronts, root_zone_depth_cm, top_background);
        let top_soil_idx = self.layers.get(1).soil_type_idx;
        let theta_wp = self.soil_types[top_soil_idx].theta_of_psi(self.config.wilting_point_psi_cm);
        let theta_s_top = self.soil_types[top_soil_idx].theta_s;
        let aet_demand_cm = calc_aet_demand_cm(dt_h, pet_cm_per_h, theta_avg, theta_wp, theta_s_top);

        let top_front_saturated = self
            .fronts
            .head()
            .map(|f| f.theta >= self.soil_types[self.layers.get(f.layer_num).soil_type_idx].theta_s - 1e-9)
            .unwrap_or(false);
        let create_front = self.prev_precip_cm_per_h == 0.0 && precip_cm_per_h > 0.0 && !top_front_saturated;

        let mut infiltrated_cm = 0.0;
        let mut runoff_cm = 0.0;
        let mut aet_taken_cm;
        let mut percolation_cm;

        if create_front {
            let advance = advance_fronts(
                &mut self.fronts,
                &self.layers,
                &self.soil_types,
                &self.background_theta,
                dt_h,
                0.0,
                aet_demand_cm,
                ponded_cm,
                self.config.wilting_point_psi_cm,
            )?;
            percolation_cm = advance.percolation_cm;
            aet_taken_cm = advance.aet_taken_cm;

            let theta_top = self.fronts.head().map(|f| f.theta).unwrap_or(self.background_theta[0]);
            let top_soil = &self.soil_types[self.layers.get(1).soil_type_idx];
            let top_k = self.layers.scale_k(1, top_soil.k_of_theta(theta_top));
            let dry = calc_dry_depth(dt_h, theta_top, top_soil, top_k, self.layers.get(1).thickness_cm);

            // The new front's water comes out of the accumulated ponding, not
            // out of thin air: cap the volume taken at what is available and
            // size the front's theta to match exactly (mass conservation).
            let full_volume_cm = dry.depth_cm * dry.delta_theta;
            let volume_added_cm = full_volume_cm.min(ponded_cm.max(0.0));
            let new_theta = if dry.depth_cm > 0.0 {
                theta_top + volume_added_cm / dry.depth_cm
            } else {
                theta_top
            };
            ponded_cm -= volume_added_cm;
            infiltrated_cm += volume_added_cm;

            let new_k = self.layers.scale_k(1, top_soil.k_of_theta(new_theta));
            let new_front = WettingFront::new(dry.depth_cm, new_theta, top_soil.psi_of_theta(new_theta), 1, new_k);
            self.fronts.insert_before(0, new_front);
        } else if ponded_cm > 0.0 {
            let infiltration = run_infiltration_step(
                ponded_cm,
                precip_cm_per_h,
                dt_h,
                &self.fronts,
                &self.layers,
                &self.soil_types,
                self.config.ponded_depth_max_cm,
            )?;
            infiltrated_cm = infiltration.infiltrated_cm;
            runoff_cm = infiltration.runoff_cm;
            ponded_cm = infiltration.ponding_cm;

            let advance = advance_fronts(
                &mut self.fronts,
                &self.layers,
                &self.soil_types,
                &self.background_theta,
                dt_h,
                infiltrated_cm,
                aet_demand_cm,
                ponded_cm,
                self.config.wilting_point_psi_cm,
            )?;
            percolation_cm = advance.percolation_cm;
            aet_taken_cm = advance.aet_taken_cm;
        } else {
            let advance = advance_fronts(
                &mut self.fronts,
                &self.layers,
                &self.soil_types,
                &self.background_theta,
                dt_h,
                0.0,
                aet_demand_cm,
                ponded_cm,
                self.config.wilting_point_psi_cm,
            )?;
            percolation_cm = advance.percolation_cm;
            aet_taken_cm = advance.aet_taken_cm;
        }

        if ponded_cm > self.config.ponded_depth_max_cm {
            runoff_cm += ponded_cm - self.config.ponded_depth_max_cm;
            ponded_cm = self.config.ponded_depth_max_cm;
        }
        self.ponded_depth_cm = ponded_cm;

        let end_storage_cm = column_storage(&self.fronts, &self.layers, &self.background_theta);

        let residual = start_storage_cm + precip_cm + prev_pond_cm
            - runoff_cm
            - aet_taken_cm
            - ponded_cm
            - percolation_cm
            - end_storage_cm;
        if residual.abs() > LOCAL_MASS_BALANCE_TOL_CM {
            return Err(LgarError::mass_balance(
                residual,
                LOCAL_MASS_BALANCE_TOL_CM,
                MassBalanceScope::Local,
                self.fronts.as_slice(),
            ));
        }

        let giuh_runoff_cm = self.giuh.convolve(runoff_cm);

        if self.config.verbosity != Verbosity::None {
            debug!(
                "substep: precip={precip_cm:.6} cm infilt={infiltrated_cm:.6} cm runoff={runoff_cm:.6} cm percolation={percolation_cm:.6} cm aet={aet_taken_cm:.6} cm residual={residual:.3e} cm"
            );
        }
        if self.config.verbosity == Verbosity::High {
            trace!("fronts after substep: {:?}", self.fronts.as_slice());
        }

        Ok(MassBalanceLedger {
            precipitation_cm: precip_cm,
            pet_cm: pet_cm_per_h * dt_h,
            aet_cm: aet_taken_cm,
            infiltration_cm: infiltrated_cm,
            percolation_cm,
            ponding_cm: ponded_cm,
            surface_runoff_cm: runoff_cm,
            giuh_runoff_cm,
            storage_cm: end_storage_cm,
        })
    }
}
