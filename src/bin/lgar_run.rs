//! Standalone runner (spec §6): reads a config path, drives the engine to
//! `endtime_s`, and maps a fatal `Err` to a non-zero exit with a diagnostic
//! front dump, mirroring the original's standalone exit-code contract.

use std::env;
use std::process::ExitCode;

use lgar::config::parse_config_file;
use lgar::engine::LgarEngine;

fn main() -> ExitCode {
    env_logger::init();

    let path = match env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("usage: lgar-run <config-file>");
            return ExitCode::FAILURE;
        }
    };

    let config = match parse_config_file(path.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let endtime_s = config.endtime_s;
    let mut engine = match LgarEngine::initialize(config) {
        Ok(e) => e,
        Err(e) => {
            log::error!("initialization failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Standalone driving with no external forcing file wired in yet: runs
    // to completion with zero precipitation/PET, exercising the full
    // lifecycle end to end.
    while engine.time_s() < endtime_s {
        if let Err(e) = engine.update(0.0, 0.0) {
            log::error!("fatal error at t={:.1} s: {e}", engine.time_s());
            return ExitCode::FAILURE;
        }
    }

    let cumulative = engine.finalize();
    log::info!(
        "run complete: infiltration={:.4} cm percolation={:.4} cm runoff={:.4} cm aet={:.4} cm",
        cumulative.infiltration_cm,
        cumulative.percolation_cm,
        cumulative.surface_runoff_cm,
        cumulative.aet_cm
    );

    ExitCode::SUCCESS
}
