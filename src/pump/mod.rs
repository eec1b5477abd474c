use log::{debug, info, warn};

use crate::config::PumpConfig;
use crate::dosing::DoseSolver;
use crate::error::{TciError, TciResult, Warning};
use crate::models::{DrugModel, Infusion, Target, TargetEffect};
use crate::output::{
    self, ConcentrationPoint, DoseInterval, DoseWeightPoint, RatePoint, TargetPoint,
};
use crate::pkpd::PkPdModel;

/// Retry budget when a solved effect target lands before its requested
/// time-to-target and the bolus has to be stretched.
const DURATION_RETRIES: usize = 3;

/// Target-controlled infusion scheduler.
///
/// Targets and user-defined infusions are collected up front;
/// `generate_infusions` then derives the full schedule deterministically and
/// `run` additionally samples the plasma and effect-site trajectories over
/// the whole session. Failed solves surface through the warning sink, never
/// as panics.
pub struct Pump {
    model: DrugModel,
    pkpd: PkPdModel,
    config: PumpConfig,
    targets: Vec<Target>,
    infusions: Vec<Infusion>,
    user_infusions: Vec<Infusion>,
    warnings: Vec<Warning>,
}

impl Pump {
    pub fn new(model: DrugModel, config: PumpConfig) -> TciResult<Self> {
        config.validate()?;
        let pkpd = PkPdModel::new(&model)?;
        Ok(Self {
            model,
            pkpd,
            config,
            targets: Vec::new(),
            infusions: Vec::new(),
            user_infusions: Vec::new(),
            warnings: Vec::new(),
        })
    }

    pub fn model(&self) -> &DrugModel {
        &self.model
    }

    pub fn config(&self) -> &PumpConfig {
        &self.config
    }

    pub fn pkpd(&self) -> &PkPdModel {
        &self.pkpd
    }

    /// The scheduled infusions, user-defined rows first.
    pub fn infusion_list(&self) -> &[Infusion] {
        &self.infusions
    }

    pub fn user_infusion_list(&self) -> &[Infusion] {
        &self.user_infusions
    }

    /// The targets in schedule order. After `generate_infusions` the
    /// `cp_limit` of solved effect targets holds the converged multiplier.
    pub fn target_concentrations(&self) -> &[Target] {
        &self.targets
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Adds a user-defined infusion, kept verbatim in the schedule.
    pub fn add_infusion(&mut self, start: f64, dose_per_sec: f64, duration: f64) -> TciResult<()> {
        if !(start >= 0.0 && dose_per_sec >= 0.0 && duration >= 0.0) {
            return Err(TciError::InvalidInput(format!(
                "infusion start, dose and duration must not be negative \
                 (got {start}, {dose_per_sec}, {duration})"
            )));
        }
        self.user_infusions
            .push(Infusion::new(start, dose_per_sec, duration));
        Ok(())
    }

    /// Adds a concentration target.
    ///
    /// `cp_limit` and `cp_limit_duration` fall back to the pump defaults
    /// when `None`; an unset `cp_limit` on a revised-method effect target is
    /// solved with the original method first.
    pub fn add_target(
        &mut self,
        start: f64,
        target: f64,
        duration: f64,
        effect: TargetEffect,
        cp_limit: Option<f64>,
        cp_limit_duration: Option<f64>,
        ce_bolus_only: bool,
        maintenance_infusions: bool,
    ) -> TciResult<()> {
        if start < 0.0 || duration < 0.0 {
            return Err(TciError::InvalidInput(format!(
                "target start and duration must not be negative (got {start}, {duration})"
            )));
        }
        if target <= 0.0 {
            return Err(TciError::InvalidInput(format!(
                "target concentration must be greater than 0, got {target}"
            )));
        }
        if start >= self.config.end_time {
            return Err(TciError::InvalidInput(format!(
                "target at {start} s starts after the simulation ends at {} s",
                self.config.end_time
            )));
        }
        if cp_limit.is_some_and(|limit| limit <= 0.0) {
            return Err(TciError::InvalidInput(
                "cp_limit must be greater than 0".to_string(),
            ));
        }
        if cp_limit_duration.is_some_and(|d| d <= 0.0) {
            return Err(TciError::InvalidInput(
                "cp_limit_duration must be greater than 0".to_string(),
            ));
        }

        self.targets.push(Target {
            start,
            target,
            duration,
            end: 0.0,
            effect,
            cp_limit,
            cp_limit_duration: cp_limit_duration.unwrap_or(self.config.cp_limit_duration),
            ce_bolus_only,
            maintenance_infusions,
        });
        // Keep schedule order; a stable sort preserves insertion order on
        // equal start times.
        self.targets.sort_by(|a, b| a.start.total_cmp(&b.start));
        let count = self.targets.len();
        for i in 0..count - 1 {
            self.targets[i].end = self.targets[i + 1].start - 1.0;
        }
        self.targets[count - 1].end = self.config.end_time;
        Ok(())
    }

    /// Derives the infusion schedule for the collected targets.
    ///
    /// The schedule is rebuilt from scratch on every call, seeded with the
    /// user-defined infusions.
    pub fn generate_infusions(&mut self) -> TciResult<&[Infusion]> {
        info!(
            "generating infusions for {} targets over {} s",
            self.targets.len(),
            self.config.end_time
        );
        self.infusions.clear();
        self.warnings.clear();
        self.infusions.extend(self.user_infusions.iter().copied());

        for target in &self.targets {
            for infusion in &self.user_infusions {
                if infusion.start < target.end && infusion.end > target.start {
                    let warning = Warning::UserInfusionOverlap {
                        infusion_start: infusion.start,
                        target_start: target.start,
                    };
                    warn!("{warning}");
                    self.warnings.push(warning);
                }
            }
        }

        // The solver borrows snapshots so the schedule and targets stay
        // freely writable while it is alive.
        let pkpd = self.pkpd.clone();
        let config = self.config.clone();
        let mut solver = DoseSolver::new(&pkpd, &config);

        for i in 0..self.targets.len() {
            let target = self.targets[i].clone();
            let increase = i == 0 || target.target > self.targets[i - 1].target;
            debug!(
                "target {} at {} s: {} {:?} ({})",
                i,
                target.start,
                target.target,
                target.effect,
                if increase { "increase" } else { "decrease" }
            );

            let reached = if !increase {
                self.step_down(&mut solver, &target)?
            } else if target.effect == TargetEffect::EffectSite {
                self.step_up_effect(&mut solver, i)
            } else {
                let infusion = solver.plasma_infusion(
                    &self.infusions,
                    target.start,
                    target.target,
                    target.duration,
                );
                let end = infusion.end;
                self.infusions.push(infusion);
                end
            };

            if target.maintenance_infusions {
                solver.extend_maintenance(&mut self.infusions, target.target, reached, target.end);
            } else if target.end > reached {
                self.infusions
                    .push(Infusion::new(reached, 0.0, target.end - reached));
            }
        }

        self.warnings.extend(solver.take_warnings());
        Ok(&self.infusions)
    }

    /// Effect-site increase with the duration-honoring retry loop: when the
    /// solved schedule reaches the target before `start + duration`, re-solve
    /// in bolus-only mode with the bolus stretched over the requested
    /// duration.
    fn step_up_effect(&mut self, solver: &mut DoseSolver<'_>, index: usize) -> f64 {
        let target = self.targets[index].clone();
        let mut bolus_only = target.ce_bolus_only;
        let mut duration_b = target.cp_limit_duration;
        let mut limit_setting = target.cp_limit;
        let mut attempts = 0;

        loop {
            let limit = match limit_setting {
                Some(limit) if !bolus_only => limit,
                _ => {
                    let fallback = limit_setting.unwrap_or(self.config.cp_limit);
                    let solved = solver.solve_cp_limit(
                        &self.infusions,
                        target.start,
                        target.target,
                        duration_b,
                        fallback,
                    );
                    self.targets[index].cp_limit = Some(solved);
                    self.targets[index].cp_limit_duration = duration_b;
                    solved
                }
            };

            let mut trial = self.infusions.clone();
            let reached = solver.effect_infusions(
                &mut trial,
                target.start,
                target.target,
                limit,
                duration_b,
                bolus_only,
            );

            if reached < target.start + target.duration && attempts < DURATION_RETRIES {
                // Reached too early; honor the requested time-to-target by
                // spreading the bolus over it.
                duration_b = target.duration;
                bolus_only = true;
                limit_setting = None;
                attempts += 1;
                continue;
            }

            self.infusions = trial;
            return reached;
        }
    }

    /// Concentration decrease: wait out the natural decay, or offset it with
    /// a low-dose infusion when the requested step-down is slower.
    fn step_down(&mut self, solver: &mut DoseSolver<'_>, target: &Target) -> TciResult<f64> {
        let decay_time = match target.effect {
            TargetEffect::EffectSite => {
                self.pkpd
                    .effect_decrement_time(&self.infusions, target.start, target.target)?
            }
            TargetEffect::Plasma => {
                self.pkpd
                    .plasma_decrement_time(&self.infusions, target.start, target.target)?
            }
        };

        if target.duration < decay_time {
            self.infusions
                .push(Infusion::new(target.start, 0.0, decay_time));
            Ok(target.start + decay_time)
        } else {
            let at = target.start + target.duration;
            let (plasma, effect_site) = self.concentrations_over(&self.infusions, at);
            let current = match target.effect {
                TargetEffect::EffectSite => effect_site,
                TargetEffect::Plasma => plasma,
            };
            let infusion =
                solver.offset_infusion(target.start, target.target - current, target.duration);
            self.infusions.push(infusion);
            Ok(at)
        }
    }

    fn concentrations_over(&self, infusions: &[Infusion], time: f64) -> (f64, f64) {
        let plasma = self.pkpd.plasma_profile(infusions, time + 1.0);
        let effect = self.pkpd.effect_profile(&plasma);
        (
            self.pkpd.plasma_at(time, infusions),
            effect.last().copied().unwrap_or(0.0),
        )
    }

    /// Plasma and effect-site concentration at `time` over the current
    /// schedule.
    pub fn concentration_at(&self, time: f64) -> (f64, f64) {
        self.concentrations_over(&self.infusions, time)
    }

    /// Generates the schedule and samples both concentration curves at 1 s
    /// cadence over the whole session.
    pub fn run(&mut self) -> TciResult<Vec<ConcentrationPoint>> {
        self.generate_infusions()?;
        let plasma = self.pkpd.plasma_profile(&self.infusions, self.config.end_time);
        let effect = self.pkpd.effect_profile(&plasma);
        Ok(plasma
            .into_iter()
            .zip(effect)
            .enumerate()
            .map(|(time, (plasma, effect_site))| ConcentrationPoint {
                time: time as f64,
                plasma,
                effect_site,
            })
            .collect())
    }

    /// Seconds for the chosen concentration to fall to `target` from
    /// `start`, were all infusions stopped there.
    pub fn decrement_time(&self, start: f64, effect: TargetEffect, target: f64) -> TciResult<f64> {
        match effect {
            TargetEffect::Plasma => self.plasma_decrement_time(start, target),
            TargetEffect::EffectSite => self.effect_decrement_time(start, target),
        }
    }

    pub fn plasma_decrement_time(&self, start: f64, target: f64) -> TciResult<f64> {
        self.pkpd
            .plasma_decrement_time(&self.infusions, start, target)
    }

    pub fn effect_decrement_time(&self, start: f64, target: f64) -> TciResult<f64> {
        self.pkpd
            .effect_decrement_time(&self.infusions, start, target)
    }

    /// Pump-rate view over the solved schedule, user infusions excluded.
    pub fn rates_array(&self) -> Vec<RatePoint> {
        output::rates_array(self.generated_infusions(), &self.config)
    }

    /// Dose/weight view over the full schedule, user infusions included.
    pub fn dose_weight_array(&self, interval: DoseInterval) -> Vec<DoseWeightPoint> {
        output::dose_weight_array(&self.infusions, self.model.weight, &self.config, interval)
    }

    /// Target levels as a step function.
    pub fn targets_array(&self) -> Vec<TargetPoint> {
        output::targets_array(&self.targets, self.config.end_time)
    }

    fn generated_infusions(&self) -> &[Infusion] {
        let skip = self.user_infusions.len().min(self.infusions.len());
        &self.infusions[skip..]
    }
}
