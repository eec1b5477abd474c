pub mod decrement;
pub mod keo;

use crate::error::TciResult;
use crate::models::{Disposition, DrugModel, Infusion};

/// Forward evaluator for plasma and effect-site concentrations over an
/// infusion schedule.
///
/// Plasma concentration is the superposition of per-infusion contributions
/// of the analytic bolus response; the effect site follows by recursive
/// semi-compartmental integration over a 1 s plasma trajectory.
#[derive(Debug, Clone)]
pub struct PkPdModel {
    disposition: Disposition,
    /// Effect-compartment equilibration rate, per second.
    ke0: f64,
}

impl PkPdModel {
    pub fn new(model: &DrugModel) -> TciResult<Self> {
        Ok(Self {
            disposition: Disposition::from_model(model)?,
            ke0: model.ke0 / 60.0,
        })
    }

    pub fn disposition(&self) -> &Disposition {
        &self.disposition
    }

    pub fn ke0(&self) -> f64 {
        self.ke0
    }

    /// Plasma concentration at `time`, summed over all infusions.
    ///
    /// An infusion contributes its rising accumulation while running and its
    /// frozen end-of-infusion level decayed through each phase afterwards.
    pub fn plasma_at(&self, time: f64, infusions: &[Infusion]) -> f64 {
        let d = &self.disposition;
        let mut cp = 0.0;

        for infusion in infusions {
            if time < infusion.start || infusion.dose_per_sec == 0.0 {
                continue;
            }
            let elapsed = time - infusion.start;
            let contribution = if time <= infusion.end {
                (d.a / d.alpha) * (1.0 - (-d.alpha * elapsed).exp())
                    + (d.b / d.beta) * (1.0 - (-d.beta * elapsed).exp())
                    + (d.c / d.gamma) * (1.0 - (-d.gamma * elapsed).exp())
            } else {
                let washout = time - infusion.end;
                (d.a / d.alpha)
                    * (1.0 - (-d.alpha * infusion.duration).exp())
                    * (-d.alpha * washout).exp()
                    + (d.b / d.beta)
                        * (1.0 - (-d.beta * infusion.duration).exp())
                        * (-d.beta * washout).exp()
                    + (d.c / d.gamma)
                        * (1.0 - (-d.gamma * infusion.duration).exp())
                        * (-d.gamma * washout).exp()
            };
            cp += infusion.dose_per_sec * contribution;
        }
        cp
    }

    /// Integral of the unit bolus kernel over `[x_min, x_max]`, evaluated
    /// analytically phase by phase.
    pub fn kernel_integral(&self, x_min: f64, x_max: f64) -> f64 {
        let d = &self.disposition;
        (d.a / d.alpha) * ((-d.alpha * x_min).exp() - (-d.alpha * x_max).exp())
            + (d.b / d.beta) * ((-d.beta * x_min).exp() - (-d.beta * x_max).exp())
            + (d.c / d.gamma) * ((-d.gamma * x_min).exp() - (-d.gamma * x_max).exp())
    }

    /// Plasma concentration sampled at 1 s cadence over `[0, end)`.
    pub fn plasma_profile(&self, infusions: &[Infusion], end: f64) -> Vec<f64> {
        let samples = end.ceil() as usize;
        (0..samples)
            .map(|t| self.plasma_at(t as f64, infusions))
            .collect()
    }

    /// Effect-site concentrations over a 1 s plasma trajectory, starting
    /// from C_e(0) = 0.
    ///
    /// Rising steps interpolate the plasma curve linearly, falling or level
    /// steps log-linearly; a zero previous plasma sample pins the effect
    /// site to zero for that step.
    pub fn effect_profile(&self, plasma: &[f64]) -> Vec<f64> {
        let ke0 = self.ke0;
        let decay = (-ke0).exp();
        let mut effect = vec![0.0; plasma.len()];

        for j in 1..plasma.len() {
            let previous = plasma[j - 1];
            if previous <= 0.0 {
                effect[j] = 0.0;
                continue;
            }
            let step = plasma[j] - previous;
            let delta = if step > 0.0 {
                step + (ke0 * previous - step) * (1.0 - decay) / ke0
            } else if plasma[j] <= 0.0 {
                0.0
            } else {
                let slope = plasma[j].ln() - previous.ln();
                if (ke0 + slope).abs() < 1e-12 {
                    // Plasma falling at exactly ke0; take the limit.
                    previous * ke0 * decay
                } else {
                    previous * ke0 / (ke0 + slope) * (slope.exp() - decay)
                }
            };
            effect[j] = effect[j - 1] * decay + delta;
        }
        effect
    }
}
