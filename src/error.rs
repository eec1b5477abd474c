use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TciError {
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Root finding did not converge: {0}")]
    NonConvergence(String),

    #[error("Root is not bracketed: {0}")]
    RootNotBracketed(String),
}

pub type TciResult<T> = Result<T, TciError>;

/// Non-fatal events recorded while scheduling. These never abort a run;
/// the pump collects them in a sink the caller can inspect afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A dosing solve failed to converge and a deterministic fallback was used.
    NonConvergence { context: String },
    /// A computed dose exceeded the configured pump rate and was clamped.
    RateCapHit { start: f64, requested_rate: f64 },
    /// A user-defined infusion overlaps a targeting window; overshoot is
    /// possible because the schedule is not re-solved around it.
    UserInfusionOverlap { infusion_start: f64, target_start: f64 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NonConvergence { context } => {
                write!(f, "solver did not converge: {context}")
            }
            Warning::RateCapHit {
                start,
                requested_rate,
            } => write!(
                f,
                "rate cap hit at {start} s (requested {requested_rate:.1} ml/hr)"
            ),
            Warning::UserInfusionOverlap {
                infusion_start,
                target_start,
            } => write!(
                f,
                "user infusion at {infusion_start} s overlaps target window starting {target_start} s"
            ),
        }
    }
}
