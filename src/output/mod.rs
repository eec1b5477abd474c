use serde::{Deserialize, Serialize};

use crate::config::PumpConfig;
use crate::models::{Infusion, Target};

/// One second of simulated concentrations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationPoint {
    pub time: f64,
    pub plasma: f64,
    pub effect_site: f64,
}

/// One step of the pump-rate view, ml/hr.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub time: f64,
    pub rate_ml_per_hr: f64,
}

/// One step of the dose/weight view. Boluses report dose per kg, running
/// infusions dose per kg per interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseWeightPoint {
    pub time: f64,
    pub dose: f64,
    pub bolus: bool,
}

/// One step of the target view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPoint {
    pub time: f64,
    pub target: f64,
}

/// Time base of the dose/weight view for running infusions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoseInterval {
    Minute,
    Hour,
}

impl DoseInterval {
    fn seconds(self) -> f64 {
        match self {
            DoseInterval::Minute => 60.0,
            DoseInterval::Hour => 3600.0,
        }
    }
}

/// Pump rates over the scheduled infusions, with a terminal row repeating
/// the final rate at the end of the simulation.
pub fn rates_array(infusions: &[Infusion], config: &PumpConfig) -> Vec<RatePoint> {
    if infusions.is_empty() {
        return Vec::new();
    }
    let mut rows: Vec<RatePoint> = infusions
        .iter()
        .map(|infusion| RatePoint {
            time: infusion.start,
            rate_ml_per_hr: config.rate_ml_per_hr(infusion.dose_per_sec),
        })
        .collect();
    let last = rows[rows.len() - 1];
    rows.push(RatePoint {
        time: config.end_time,
        rate_ml_per_hr: last.rate_ml_per_hr,
    });
    rows
}

/// Doses normalised by patient weight: total dose/kg for boluses,
/// dose/kg/interval for running infusions.
pub fn dose_weight_array(
    infusions: &[Infusion],
    weight: f64,
    config: &PumpConfig,
    interval: DoseInterval,
) -> Vec<DoseWeightPoint> {
    if infusions.is_empty() {
        return Vec::new();
    }
    let per = interval.seconds();
    let mut rows: Vec<DoseWeightPoint> = infusions
        .iter()
        .map(|infusion| {
            let bolus = infusion.duration <= config.bolus_time
                && infusion.duration < config.maintenance_infusion_duration;
            let dose = if bolus {
                infusion.dose_per_sec * infusion.duration / weight
            } else {
                infusion.dose_per_sec / weight * per
            };
            DoseWeightPoint {
                time: infusion.start,
                dose,
                bolus,
            }
        })
        .collect();
    let mut last = rows[rows.len() - 1];
    last.time = config.end_time;
    rows.push(last);
    rows
}

/// Target levels as a step function over the session.
pub fn targets_array(targets: &[Target], end_time: f64) -> Vec<TargetPoint> {
    if targets.is_empty() {
        return Vec::new();
    }
    let mut rows: Vec<TargetPoint> = targets
        .iter()
        .map(|target| TargetPoint {
            time: target.start,
            target: target.target,
        })
        .collect();
    let last = rows[rows.len() - 1];
    rows.push(TargetPoint {
        time: end_time,
        target: last.target,
    });
    rows
}
