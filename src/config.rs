//! Configuration ingestion (spec §4.J): a small `key=value` text format and
//! the soil-parameter table it reads alongside it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::soil::SoilType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verbosity {
    None,
    Low,
    High,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::None
    }
}

/// Engine configuration, covering every field enumerated in spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub layer_thickness_cm: Vec<f64>,
    pub layer_soil_type: Vec<String>,
    pub soil_params_file: String,
    pub initial_psi_cm: f64,
    pub timestep_h: f64,
    pub forcing_resolution_h: f64,
    pub endtime_s: f64,
    pub ponded_depth_max_cm: f64,
    pub wilting_point_psi_cm: f64,
    #[serde(default = "default_nint")]
    pub nint: u32,
    #[serde(default)]
    pub sft_coupled: bool,
    #[serde(default)]
    pub giuh_ordinates: Vec<f64>,
    #[serde(default)]
    pub verbosity: Verbosity,
}

fn default_nint() -> u32 {
    120
}

impl Config {
    /// Validates the cross-field constraints §6 calls out: non-empty
    /// layers matching soil-type names, a positive integer
    /// `forcing_interval = forcing_resolution_h / timestep_h`, and
    /// physically sane ponding/wilting parameters.
    pub fn validate(&self, soil_types: &[SoilType]) -> Result<(), ConfigError> {
        if self.layer_thickness_cm.is_empty() {
            return Err(ConfigError::new("layers.empty", "layer_thickness_cm must not be empty"));
        }
        if self.layer_thickness_cm.len() != self.layer_soil_type.len() {
            return Err(ConfigError::new(
                "layers.mismatch",
                "layer_thickness_cm and layer_soil_type must have the same length",
            ));
        }
        for thickness in &self.layer_thickness_cm {
            if *thickness <= 0.0 {
                return Err(ConfigError::new("layers.thickness", "layer thickness must be positive"));
            }
        }
        for name in &self.layer_soil_type {
            if !soil_types.iter().any(|s| &s.name == name) {
                return Err(ConfigError::new(
                    "layers.soil_type",
                    format!("soil type '{name}' not found in soil_params_file"),
                ));
            }
        }
        if self.timestep_h <= 0.0 {
            return Err(ConfigError::new("timestep.nonpositive", "timestep_h must be positive"));
        }
        if self.forcing_resolution_h <= 0.0 {
            return Err(ConfigError::new(
                "forcing_resolution.nonpositive",
                "forcing_resolution_h must be positive",
            ));
        }
        let interval = self.forcing_resolution_h / self.timestep_h;
        if (interval - interval.round()).abs() > 1e-9 || interval.round() < 1.0 {
            return Err(ConfigError::new(
                "forcing_interval.non_integer",
                format!("forcing_resolution_h / timestep_h = {interval} must be a positive integer"),
            ));
        }
        if self.ponded_depth_max_cm < 0.0 {
            return Err(ConfigError::new("ponding.negative", "ponded_depth_max_cm must be >= 0"));
        }
        Ok(())
    }

    pub fn forcing_interval(&self) -> usize {
        (self.forcing_resolution_h / self.timestep_h).round() as usize
    }
}

/// Named soil-type records parsed from a `soil_params_file`.
#[derive(Debug, Clone, Default)]
pub struct SoilParamsTable {
    pub types: Vec<SoilType>,
}

impl SoilParamsTable {
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.types.iter().position(|s| s.name == name)
    }

    /// Parses rows of the form:
    /// `name theta_r theta_s alpha_per_cm n ks_cm_per_h psi_ae_cm [lambda]`
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut types = Vec::new();
        for (line_num, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 7 {
                return Err(ConfigError::new(
                    "soil_params.row",
                    format!("line {}: expected at least 7 fields, got {}", line_num + 1, fields.len()),
                ));
            }
            let parse_f64 = |s: &str, field: &str| -> Result<f64, ConfigError> {
                s.parse::<f64>()
                    .map_err(|_| ConfigError::new("soil_params.parse", format!("line {}: invalid {field} '{s}'", line_num + 1)))
            };
            types.push(SoilType {
                name: fields[0].to_string(),
                theta_r: parse_f64(fields[1], "theta_r")?,
                theta_s: parse_f64(fields[2], "theta_s")?,
                alpha_per_cm: parse_f64(fields[3], "alpha_per_cm")?,
                n: parse_f64(fields[4], "n")?,
                ks_cm_per_h: parse_f64(fields[5], "ks_cm_per_h")?,
                psi_ae_cm: parse_f64(fields[6], "psi_ae_cm")?,
                lambda: fields.get(7).and_then(|s| s.parse::<f64>().ok()),
            });
        }
        Ok(Self { types })
    }
}

/// Parses the engine's `key=value` config text, one assignment per line,
/// `#` comments allowed, array-valued keys comma-separated.
pub fn parse_config_str(text: &str) -> Result<Config, ConfigError> {
    let mut map: HashMap<String, String> = HashMap::new();
    for (line_num, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            ConfigError::new("config.syntax", format!("line {}: expected key=value", line_num + 1))
        })?;
        map.insert(key.trim().to_string(), value.trim().to_string());
    }

    let require = |map: &HashMap<String, String>, key: &str| -> Result<String, ConfigError> {
        map.get(key)
            .cloned()
            .ok_or_else(|| ConfigError::new("config.missing_key", format!("missing required key '{key}'")))
    };
    let parse_f64_list = |s: &str| -> Result<Vec<f64>, ConfigError> {
        if s.is_empty() {
            return Ok(Vec::new());
        }
        s.split(',')
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|_| ConfigError::new("config.parse", format!("invalid float '{v}' in list '{s}'")))
            })
            .collect()
    };
    let parse_f64 = |s: &str, key: &str| -> Result<f64, ConfigError> {
        s.parse::<f64>()
            .map_err(|_| ConfigError::new("config.parse", format!("invalid float for '{key}': '{s}'")))
    };

    let layer_thickness_cm = parse_f64_list(&require(&map, "layer_thickness_cm")?)?;
    let layer_soil_type: Vec<String> = require(&map, "layer_soil_type")?
        .split(',')
        .map(|s| s.trim().to_string())
        .collect();
    let soil_params_file = require(&map, "soil_params_file")?;
    let initial_psi_cm = parse_f64(&require(&map, "initial_psi_cm")?, "initial_psi_cm")?;
    let timestep_h = parse_f64(&require(&map, "timestep_h")?, "timestep_h")?;
    let forcing_resolution_h = parse_f64(&require(&map, "forcing_resolution_h")?, "forcing_resolution_h")?;
    let endtime_s = parse_f64(&require(&map, "endtime_s")?, "endtime_s")?;
    let ponded_depth_max_cm = parse_f64(&require(&map, "ponded_depth_max_cm")?, "ponded_depth_max_cm")?;
    let wilting_point_psi_cm = parse_f64(&require(&map, "wilting_point_psi_cm")?, "wilting_point_psi_cm")?;

    let nint = match map.get("nint") {
        Some(v) => v
            .parse::<u32>()
            .map_err(|_| ConfigError::new("config.parse", format!("invalid integer for 'nint': '{v}'")))?,
        None => default_nint(),
    };
    let sft_coupled = map.get("sft_coupled").map(|v| v == "true" || v == "1").unwrap_or(false);
    let giuh_ordinates = match map.get("giuh_ordinates") {
        Some(v) => parse_f64_list(v)?,
        None => Vec::new(),
    };
    let verbosity = match map.get("verbosity").map(String::as_str) {
        Some("low") => Verbosity::Low,
        Some("high") => Verbosity::High,
        Some("none") | None => Verbosity::None,
        Some(other) => return Err(ConfigError::new("config.verbosity", format!("unknown verbosity '{other}'"))),
    };

    Ok(Config {
        layer_thickness_cm,
        layer_soil_type,
        soil_params_file,
        initial_psi_cm,
        timestep_h,
        forcing_resolution_h,
        endtime_s,
        ponded_depth_max_cm,
        wilting_point_psi_cm,
        nint,
        sft_coupled,
        giuh_ordinates,
        verbosity,
    })
}

pub fn parse_config_file(path: &std::path::Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::new("config.io", format!("reading '{}': {e}", path.display())))?;
    parse_config_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config_text() -> &'static str {
        "layer_thickness_cm=200\n\
         layer_soil_type=silt_loam\n\
         soil_params_file=soils.txt\n\
         initial_psi_cm=100\n\
         timestep_h=0.0833333\n\
         forcing_resolution_h=1.0\n\
         endtime_s=3600\n\
         ponded_depth_max_cm=1.0\n\
         wilting_point_psi_cm=15000\n\
         giuh_ordinates=0.5,0.3,0.2\n"
    }

    #[test]
    fn parses_required_and_default_fields() {
        let config = parse_config_str(sample_config_text()).unwrap();
        assert_eq!(config.layer_thickness_cm, vec![200.0]);
        assert_eq!(config.nint, 120);
        assert_eq!(config.giuh_ordinates, vec![0.5, 0.3, 0.2]);
        assert_eq!(config.forcing_interval(), 12);
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let text = "layer_thickness_cm=200\n";
        assert!(parse_config_str(text).is_err());
    }

    #[test]
    fn non_integer_forcing_interval_fails_validation() {
        let mut config = parse_config_str(sample_config_text()).unwrap();
        config.timestep_h = 0.7;
        let soils = vec![SoilType {
            name: "silt_loam".to_string(),
            theta_s: 0.45,
            theta_r: 0.067,
            alpha_per_cm: 0.02,
            n: 1.41,
            ks_cm_per_h: 0.45,
            psi_ae_cm: 14.66,
            lambda: None,
        }];
        assert!(config.validate(&soils).is_err());
    }

    #[test]
    fn soil_params_table_parses_rows() {
        let text = "# name theta_r theta_s alpha n ks psi_ae\nsilt_loam 0.067 0.45 0.02 1.41 0.45 14.66\n";
        let table = SoilParamsTable::parse(text).unwrap();
        assert_eq!(table.types.len(), 1);
        assert_eq!(table.index_of("silt_loam"), Some(0));
        assert_eq!(table.index_of("silt"), None);
    }
}
