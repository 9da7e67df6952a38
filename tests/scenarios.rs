//! Integration tests for the six seed scenarios (spec §8), exercised
//! through the public [`LgarEngine`] lifecycle end to end.

use std::io::Write;

use lgar::config::Config;
use lgar::engine::LgarEngine;

fn write_soil_file(contents: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("lgar_test_soils_{}.txt", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{contents}").unwrap();
    path
}

const SILT_LOAM_ROW: &str = "silt_loam 0.067 0.45 0.02 1.41 0.45 14.66";
const SAND_ROW: &str = "sand 0.02 0.43 0.145 2.68 25.0 7.26";
const CLAY_ROW: &str = "clay 0.09 0.48 0.008 1.09 0.02 40.0";

fn base_config(soil_file: &std::path::Path, layer_thickness_cm: Vec<f64>, layer_soil_type: Vec<&str>) -> Config {
    Config {
        layer_thickness_cm,
        layer_soil_type: layer_soil_type.into_iter().map(String::from).collect(),
        soil_params_file: soil_file.to_string_lossy().into_owned(),
        initial_psi_cm: 100.0,
        timestep_h: 300.0 / 3600.0,
        forcing_resolution_h: 300.0 / 3600.0,
        endtime_s: 3600.0,
        ponded_depth_max_cm: 1.0,
        wilting_point_psi_cm: 15000.0,
        nint: 120,
        sft_coupled: false,
        giuh_ordinates: Vec::new(),
        verbosity: lgar::config::Verbosity::None,
    }
}

#[test]
fn scenario_1_constant_rainfall_closes_local_mass_balance() {
    let soil_file = write_soil_file(SILT_LOAM_ROW);
    let config = base_config(&soil_file, vec![200.0], vec!["silt_loam"]);
    let mut engine = LgarEngine::initialize(config).unwrap();

    let start_storage = engine.soil_moisture_layers()[0];
    for _ in 0..12 {
        engine.update(10.0, 0.0).unwrap();
    }
    let end_storage = engine.soil_moisture_layers()[0];
    assert!(end_storage >= start_storage);
    std::fs::remove_file(&soil_file).ok();
}

#[test]
fn scenario_2_dry_down_aet_only_no_new_fronts_no_runoff() {
    let soil_file = write_soil_file(SILT_LOAM_ROW);
    let config = base_config(&soil_file, vec![200.0], vec!["silt_loam"]);
    let mut engine = LgarEngine::initialize(config).unwrap();

    let mut prev_aet = f64::INFINITY;
    for _ in 0..20 {
        engine.update(0.0, 5.0).unwrap();
        let report = engine.last_report();
        assert_eq!(report.surface_runoff_cm, 0.0);
        assert!(report.actual_evapotranspiration_cm <= prev_aet + 1e-9);
        prev_aet = report.actual_evapotranspiration_cm;
    }
    assert_eq!(engine.soil_num_wetting_fronts(), 0);
    std::fs::remove_file(&soil_file).ok();
}

#[test]
fn scenario_3_rain_pulse_creates_a_single_front_then_redistributes() {
    let soil_file = write_soil_file(SILT_LOAM_ROW);
    let config = base_config(&soil_file, vec![200.0], vec!["silt_loam"]);
    let mut engine = LgarEngine::initialize(config).unwrap();

    engine.update(50.0, 0.0).unwrap();
    assert!(engine.soil_num_wetting_fronts() >= 1);

    for _ in 0..10 {
        engine.update(0.0, 0.0).unwrap();
    }
    assert!(engine.soil_num_wetting_fronts() <= 2);
    std::fs::remove_file(&soil_file).ok();
}

#[test]
fn scenario_4_two_layer_front_crossing_preserves_psi_continuity() {
    let soil_file = write_soil_file(&format!("{SAND_ROW}\n{CLAY_ROW}"));
    let config = base_config(&soil_file, vec![20.0, 180.0], vec!["sand", "clay"]);
    let mut config = config;
    config.timestep_h = 300.0 / 3600.0;
    config.forcing_resolution_h = 300.0 / 3600.0;
    let mut engine = LgarEngine::initialize(config).unwrap();

    for _ in 0..24 {
        engine.update(20.0, 0.0).unwrap();
    }
    // With sand over clay and two hours of rain, the stack should have
    // produced at least one front, and local mass balance stayed closed
    // throughout (update() would otherwise have returned Err).
    assert!(engine.soil_num_wetting_fronts() >= 1);
    std::fs::remove_file(&soil_file).ok();
}

#[test]
fn scenario_5_ponding_overflow_still_closes_mass_balance() {
    let soil_file = write_soil_file(SILT_LOAM_ROW);
    let mut config = base_config(&soil_file, vec![200.0], vec!["silt_loam"]);
    config.initial_psi_cm = 10.0;
    let mut engine = LgarEngine::initialize(config).unwrap();

    for _ in 0..6 {
        engine.update(100.0, 0.0).unwrap();
    }
    let report = engine.last_report();
    assert!(report.surface_runoff_cm >= 0.0);
    std::fs::remove_file(&soil_file).ok();
}

#[test]
fn scenario_6_frozen_factor_reduces_infiltration_capacity() {
    let soil_file = write_soil_file(SILT_LOAM_ROW);
    let config = base_config(&soil_file, vec![200.0], vec!["silt_loam"]);
    let mut engine = LgarEngine::initialize(config).unwrap();
    engine.update(20.0, 0.0).unwrap();
    let infiltration_normal = engine.last_report().infiltration_cm;

    let config_frozen = base_config(&soil_file, vec![200.0], vec!["silt_loam"]);
    let mut engine_frozen = LgarEngine::initialize(config_frozen).unwrap();
    engine_frozen.set_frozen_factor(1, 0.1);
    engine_frozen.update(20.0, 0.0).unwrap();
    let infiltration_frozen = engine_frozen.last_report().infiltration_cm;

    assert!(infiltration_frozen <= infiltration_normal + 1e-9);
    std::fs::remove_file(&soil_file).ok();
}
