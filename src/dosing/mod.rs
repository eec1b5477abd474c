use log::{debug, warn};

use crate::config::PumpConfig;
use crate::error::Warning;
use crate::models::Infusion;
use crate::pkpd::PkPdModel;
use crate::solver;

/// Forward scans (effect-site peaks, coast ends) give up this far past
/// their anchor point.
const SCAN_LIMIT: f64 = 7200.0;

/// Seeds and convergence tolerances for the effect-site solves.
const LIMIT_SEEDS: (f64, f64) = (1.0, 10.0);
const LIMIT_TOLERANCE: f64 = 1.0e-4;
const PLATEAU_TOLERANCE: f64 = 1.0;
const MAX_ITERATIONS: usize = 50;

/// Inverse dosing operations over a pharmacokinetic model.
///
/// All methods are deterministic; failed solves are recorded as warnings
/// and answered with a safe fallback instead of aborting.
pub struct DoseSolver<'a> {
    pkpd: &'a PkPdModel,
    config: &'a PumpConfig,
    warnings: Vec<Warning>,
}

impl<'a> DoseSolver<'a> {
    pub fn new(pkpd: &'a PkPdModel, config: &'a PumpConfig) -> Self {
        Self {
            pkpd,
            config,
            warnings: Vec::new(),
        }
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    fn record(&mut self, warning: Option<Warning>) {
        if let Some(warning) = warning {
            warn!("{warning}");
            self.warnings.push(warning);
        }
    }

    /// Infusion that raises the plasma concentration to `target` at
    /// `start + duration`, lengthening the infusion second by second while
    /// its pump rate sits over the cap.
    pub fn plasma_infusion(
        &mut self,
        infusions: &[Infusion],
        start: f64,
        target: f64,
        duration: f64,
    ) -> Infusion {
        let (infusion, warning) = self.solve_plasma(infusions, start, target, duration);
        self.record(warning);
        infusion
    }

    fn solve_plasma(
        &self,
        infusions: &[Infusion],
        start: f64,
        target: f64,
        duration: f64,
    ) -> (Infusion, Option<Warning>) {
        let requested = duration.max(1.0);
        let projected = self.pkpd.plasma_at(start + requested, infusions);
        let delta = target - projected;
        if delta <= 0.0 {
            // Already at or above the target; emit a zero-dose placeholder.
            return (Infusion::new(start, 0.0, requested), None);
        }

        let ceiling = 10.0 * requested;
        let mut duration = requested;
        loop {
            let dose = delta / self.pkpd.kernel_integral(0.0, duration);
            let rate = self.config.rate_ml_per_hr(dose);
            if duration <= self.config.bolus_time
                || !self.config.rate_capped()
                || rate <= self.config.max_infusion_rate
            {
                return (Infusion::new(start, dose, duration), None);
            }
            if duration >= ceiling {
                // Extension is not converging; clamp to the cap instead.
                return (
                    Infusion::new(start, self.config.dose_at_max_rate(), duration),
                    Some(Warning::NonConvergence {
                        context: format!(
                            "plasma dose at {start} s still over the rate cap after \
                             extending to {duration} s"
                        ),
                    }),
                );
            }
            duration += 1.0;
        }
    }

    /// Dose per second that holds `target` over `[start, start + duration]`,
    /// clamped to the pump rate cap.
    pub fn maintenance_dose(
        &mut self,
        infusions: &[Infusion],
        target: f64,
        start: f64,
        duration: f64,
    ) -> f64 {
        let (dose, warning) = self.solve_maintenance(infusions, target, start, duration);
        self.record(warning);
        dose
    }

    fn solve_maintenance(
        &self,
        infusions: &[Infusion],
        target: f64,
        start: f64,
        duration: f64,
    ) -> (f64, Option<Warning>) {
        if duration <= 0.0 {
            return (0.0, None);
        }
        let delta = target - self.pkpd.plasma_at(start + duration, infusions);
        if delta <= 0.0 {
            return (0.0, None);
        }
        let dose = delta / self.pkpd.kernel_integral(0.0, duration);
        let rate = self.config.rate_ml_per_hr(dose);
        if self.config.rate_capped()
            && duration > self.config.bolus_time
            && rate > self.config.max_infusion_rate
        {
            return (
                self.config.dose_at_max_rate(),
                Some(Warning::RateCapHit {
                    start,
                    requested_rate: rate,
                }),
            );
        }
        (dose, None)
    }

    /// Infusion that offsets the natural decay by `delta` over `duration`,
    /// clamped to the pump rate cap. Used when stepping a target down more
    /// slowly than the free decline.
    pub fn offset_infusion(&mut self, start: f64, delta: f64, duration: f64) -> Infusion {
        if delta <= 0.0 || duration <= 0.0 {
            return Infusion::new(start, 0.0, duration.max(0.0));
        }
        let dose = delta / self.pkpd.kernel_integral(0.0, duration);
        let rate = self.config.rate_ml_per_hr(dose);
        if self.config.rate_capped()
            && duration > self.config.bolus_time
            && rate > self.config.max_infusion_rate
        {
            self.record(Some(Warning::RateCapHit {
                start,
                requested_rate: rate,
            }));
            return Infusion::new(start, self.config.dose_at_max_rate(), duration);
        }
        Infusion::new(start, dose, duration)
    }

    /// Appends maintenance infusions over `[from, until)`, each segment a
    /// multiple of the previous one's length, the last truncated to end at
    /// `until` exactly.
    pub fn extend_maintenance(
        &mut self,
        infusions: &mut Vec<Infusion>,
        target: f64,
        from: f64,
        until: f64,
    ) {
        let mut start = from;
        let mut length = self.config.maintenance_infusion_duration;
        while start < until {
            let duration = length.min(until - start);
            let dose = self.maintenance_dose(infusions, target, start, duration);
            infusions.push(Infusion::new(start, dose, duration));
            start += duration;
            length *= self.config.maintenance_infusion_multiplier;
        }
    }

    /// Solves the minimal plasma overshoot multiplier whose bolus drives the
    /// effect-site curve to graze `target` (the original targeting method).
    ///
    /// Falls back to `fallback` with a warning when the search fails.
    pub fn solve_cp_limit(
        &mut self,
        infusions: &[Infusion],
        start: f64,
        target: f64,
        duration_b: f64,
        fallback: f64,
    ) -> f64 {
        let objective = |limit: f64| {
            let (bolus, _) = self.solve_plasma(infusions, start, target * limit, duration_b);
            let mut trial = infusions.to_vec();
            trial.push(bolus);
            match self.ce_peak_after(&trial, bolus.end) {
                Some((_, ce_max)) => target - ce_max,
                None => target,
            }
        };
        let solved = solver::secant(
            objective,
            LIMIT_SEEDS.0,
            LIMIT_SEEDS.1,
            LIMIT_TOLERANCE,
            MAX_ITERATIONS,
        );
        match solved {
            Ok(limit) if limit.is_finite() && limit > 0.0 => {
                debug!("overshoot multiplier at {start} s solved to {limit:.4}");
                limit
            }
            _ => {
                self.record(Some(Warning::NonConvergence {
                    context: format!(
                        "overshoot multiplier at {start} s; keeping {fallback}"
                    ),
                }));
                fallback
            }
        }
    }

    /// Appends the infusions for one effect-site target and returns the time
    /// the target is reached.
    ///
    /// With `bolus_only` the overshoot bolus is followed by a zero-dose
    /// coast until the effect site first touches `target`. Otherwise the
    /// revised method holds the plasma plateau at `target * limit` for a
    /// solved duration, then coasts until the plasma falls back to `target`.
    pub fn effect_infusions(
        &mut self,
        infusions: &mut Vec<Infusion>,
        start: f64,
        target: f64,
        limit: f64,
        duration_b: f64,
        bolus_only: bool,
    ) -> f64 {
        let (bolus, warning) = self.solve_plasma(infusions, start, target * limit, duration_b);
        self.record(warning);
        infusions.push(bolus);

        if bolus_only {
            let reached = match self.ce_first_reach(infusions, target, bolus.end) {
                Some(time) => time,
                // The solved peak grazes the target; floating error can keep
                // the curve a hair under it, so fall back to the peak time.
                None => match self.ce_peak_after(infusions, bolus.end) {
                    Some((peak_time, _)) => peak_time,
                    None => {
                        self.record(Some(Warning::NonConvergence {
                            context: format!(
                                "no effect-site peak after the bolus at {start} s"
                            ),
                        }));
                        bolus.end
                    }
                },
            };
            if reached > bolus.end {
                infusions.push(Infusion::new(bolus.end, 0.0, reached - bolus.end));
            }
            return reached;
        }

        let plateau_start = bolus.end;
        let objective = |tinf: f64| {
            let held = tinf.max(0.0);
            let mut trial = infusions.clone();
            if held > 0.0 {
                let (dose, _) =
                    self.solve_maintenance(&trial, target * limit, plateau_start, held);
                trial.push(Infusion::new(plateau_start, dose, held));
            }
            match self.ce_peak_after(&trial, plateau_start + held) {
                Some((_, ce_max)) => target - ce_max,
                None => target,
            }
        };
        let solved = solver::secant(
            objective,
            1.0,
            2.0 * duration_b,
            PLATEAU_TOLERANCE,
            MAX_ITERATIONS,
        );
        let plateau = match solved {
            Ok(tinf) => tinf.max(0.0),
            Err(_) => {
                self.record(Some(Warning::NonConvergence {
                    context: format!("plateau duration at {start} s; skipping the plateau"),
                }));
                0.0
            }
        };

        if plateau > 0.0 {
            let dose = self.maintenance_dose(infusions, target * limit, plateau_start, plateau);
            infusions.push(Infusion::new(plateau_start, dose, plateau));
        }
        let plateau_end = plateau_start + plateau;

        let coast_end = match self.cp_first_below(infusions, target, plateau_end) {
            Some(time) => time,
            None => {
                self.record(Some(Warning::NonConvergence {
                    context: format!(
                        "plasma never falls back to the target after the plateau at {start} s"
                    ),
                }));
                plateau_end
            }
        };
        if coast_end > plateau_end {
            infusions.push(Infusion::new(plateau_end, 0.0, coast_end - plateau_end));
        }
        coast_end
    }

    /// First local maximum of the effect-site curve strictly after `after`.
    fn ce_peak_after(&self, infusions: &[Infusion], after: f64) -> Option<(f64, f64)> {
        let plasma = self.pkpd.plasma_profile(infusions, after + SCAN_LIMIT);
        let effect = self.pkpd.effect_profile(&plasma);
        let first = (after.floor() as usize + 1).max(1);
        for j in first..effect.len() {
            if effect[j] - effect[j - 1] <= 0.0 && effect[j - 1] > 0.0 {
                return Some(((j - 1) as f64, effect[j - 1]));
            }
        }
        None
    }

    /// First sample strictly after `anchor` at which the effect site
    /// reaches `level`. Earlier targets already populate the schedule, so
    /// the scan must not look at the trace before the current bolus.
    fn ce_first_reach(&self, infusions: &[Infusion], level: f64, anchor: f64) -> Option<f64> {
        let plasma = self.pkpd.plasma_profile(infusions, anchor + SCAN_LIMIT);
        let effect = self.pkpd.effect_profile(&plasma);
        let first = (anchor.floor() as usize + 1).max(1);
        for j in first..effect.len() {
            if effect[j] >= level {
                return Some(j as f64);
            }
        }
        None
    }

    /// First 1 s step from `from` at which the plasma falls under `level`.
    fn cp_first_below(&self, infusions: &[Infusion], level: f64, from: f64) -> Option<f64> {
        let mut time = from;
        while time < from + SCAN_LIMIT {
            if self.pkpd.plasma_at(time, infusions) < level {
                return Some(time);
            }
            time += 1.0;
        }
        None
    }
}
