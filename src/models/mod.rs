pub mod one_compartment;
pub mod three_compartment;
pub mod two_compartment;

use serde::{Deserialize, Serialize};

use crate::error::{TciError, TciResult};

/// Compartmental geometry of a drug model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compartments {
    One,
    Two,
    Three,
}

impl TryFrom<u8> for Compartments {
    type Error = TciError;

    fn try_from(value: u8) -> TciResult<Self> {
        match value {
            1 => Ok(Compartments::One),
            2 => Ok(Compartments::Two),
            3 => Ok(Compartments::Three),
            other => Err(TciError::InvalidModel(format!(
                "number of compartments must be 1, 2 or 3, got {other}"
            ))),
        }
    }
}

/// Pharmacokinetic/pharmacodynamic description of a drug in a patient.
///
/// Micro-rate constants are per minute, as published; they are converted to
/// per-second units when the disposition is derived. For two-compartment
/// models `k13`/`k31` are ignored and `k20` adds peripheral elimination;
/// for one-compartment models only `v1` and `k10` are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugModel {
    pub compartments: Compartments,
    /// Central compartment volume in litres.
    pub v1: f64,
    pub k10: f64,
    pub k12: f64,
    pub k21: f64,
    pub k13: f64,
    pub k31: f64,
    /// Optional elimination from the second compartment (two-compartment only).
    pub k20: Option<f64>,
    /// Effect-compartment equilibration rate constant, per minute.
    pub ke0: f64,
    /// Patient weight in kg; only the dose/weight views read this.
    pub weight: f64,
    pub concentration_unit: String,
    pub target_unit: String,
}

impl DrugModel {
    pub fn validate(&self) -> TciResult<()> {
        if self.v1 <= 0.0 {
            return Err(TciError::InvalidModel(
                "v1 must be greater than 0".to_string(),
            ));
        }
        let rate_constants = [
            ("k10", self.k10),
            ("k12", self.k12),
            ("k21", self.k21),
            ("k13", self.k13),
            ("k31", self.k31),
            ("k20", self.k20.unwrap_or(0.0)),
            ("ke0", self.ke0),
        ];
        for (name, value) in rate_constants {
            if value < 0.0 {
                return Err(TciError::InvalidModel(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        if self.weight <= 0.0 {
            return Err(TciError::InvalidModel(
                "weight must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Analytic bolus response: C_p(t) = A e^(-alpha t) + B e^(-beta t) + C e^(-gamma t)
/// per unit dose, with rate constants per second.
///
/// Unused phases carry a coefficient of zero and a sentinel rate of one so
/// the three-term kernel can be evaluated uniformly for every geometry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Disposition {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Disposition {
    /// Derives the phase coefficients from a drug model, converting the
    /// per-minute micro-rate constants to per-second units.
    pub fn from_model(model: &DrugModel) -> TciResult<Self> {
        model.validate()?;

        let k10 = model.k10 / 60.0;
        let k12 = model.k12 / 60.0;
        let k21 = model.k21 / 60.0;
        let k13 = model.k13 / 60.0;
        let k31 = model.k31 / 60.0;
        let k20 = model.k20.unwrap_or(0.0) / 60.0;

        match model.compartments {
            Compartments::One => Ok(one_compartment::disposition(model.v1, k10)),
            Compartments::Two => two_compartment::disposition(model.v1, k10, k12, k21, k20),
            Compartments::Three => {
                three_compartment::disposition(model.v1, k10, k12, k21, k13, k31)
            }
        }
    }

    /// Unit bolus kernel f(t).
    pub fn kernel(&self, t: f64) -> f64 {
        self.a * (-self.alpha * t).exp()
            + self.b * (-self.beta * t).exp()
            + self.c * (-self.gamma * t).exp()
    }
}

/// One timed infusion: `dose_per_sec` delivered over `[start, end]` seconds.
/// A bolus is not a distinct type, just an infusion no longer than the
/// configured bolus time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Infusion {
    pub start: f64,
    pub dose_per_sec: f64,
    pub duration: f64,
    pub end: f64,
}

impl Infusion {
    pub fn new(start: f64, dose_per_sec: f64, duration: f64) -> Self {
        Self {
            start,
            dose_per_sec,
            duration,
            end: start + duration,
        }
    }

    pub fn is_bolus(&self, bolus_time: f64) -> bool {
        self.duration <= bolus_time
    }
}

/// Which concentration a target refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetEffect {
    Plasma,
    EffectSite,
}

/// One requested concentration target.
///
/// `end` is maintained by the scheduler: each target ends one second before
/// the next begins, the last at the simulation end. `cp_limit` stays `None`
/// until either the caller provides one or the original-method solve writes
/// the multiplier it converged on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub start: f64,
    pub target: f64,
    pub duration: f64,
    pub end: f64,
    pub effect: TargetEffect,
    pub cp_limit: Option<f64>,
    pub cp_limit_duration: f64,
    pub ce_bolus_only: bool,
    pub maintenance_infusions: bool,
}

/// Marsh propofol parameters for a 70 kg adult, shared across unit tests.
#[cfg(test)]
pub(crate) fn marsh_70kg() -> DrugModel {
    DrugModel {
        compartments: Compartments::Three,
        v1: 0.228 * 70.0,
        k10: 0.119,
        k12: 0.112,
        k21: 0.055,
        k13: 0.0419,
        k31: 0.0033,
        k20: None,
        ke0: 0.26,
        weight: 70.0,
        concentration_unit: "mg/ml".to_string(),
        target_unit: "ug/ml".to_string(),
    }
}
