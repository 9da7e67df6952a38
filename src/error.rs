use serde::Serialize;
use std::fmt;

use crate::front::WettingFront;

/// Structured configuration-validation error, surfaced at `initialize` time.
#[derive(Debug, Serialize)]
pub struct ConfigError {
    pub code: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl ConfigError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Whether a mass-balance residual was checked against the sub-step tolerance
/// (10^-7 cm) or the cumulative/forcing-step tolerance (10^-6 cm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MassBalanceScope {
    Local,
    Global,
}

impl fmt::Display for MassBalanceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MassBalanceScope::Local => write!(f, "local"),
            MassBalanceScope::Global => write!(f, "global"),
        }
    }
}

/// Fatal and configuration errors of the LGAR engine.
///
/// Fatal variants carry a snapshot of the front list at the moment of failure
/// so a host framework can report the diagnostic dump instead of the process
/// aborting (see DESIGN.md, "Mass-balance assertions").
#[derive(Debug, thiserror::Error)]
pub enum LgarError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{scope} mass balance residual {residual_cm:.10e} cm exceeds tolerance {tolerance_cm:.1e} cm")]
    MassBalance {
        residual_cm: f64,
        tolerance_cm: f64,
        scope: MassBalanceScope,
        fronts: Vec<WettingFront>,
    },

    #[error("invariant {invariant} violated: {detail}")]
    InvariantViolation {
        invariant: &'static str,
        detail: String,
        fronts: Vec<WettingFront>,
    },

    #[error("numerical error: {0}")]
    Numeric(String),
}

impl LgarError {
    pub fn invariant(invariant: &'static str, detail: impl Into<String>, fronts: &[WettingFront]) -> Self {
        LgarError::InvariantViolation {
            invariant,
            detail: detail.into(),
            fronts: fronts.to_vec(),
        }
    }

    pub fn mass_balance(residual_cm: f64, tolerance_cm: f64, scope: MassBalanceScope, fronts: &[WettingFront]) -> Self {
        LgarError::MassBalance {
            residual_cm,
            tolerance_cm,
            scope,
            fronts: fronts.to_vec(),
        }
    }
}
