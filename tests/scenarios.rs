use approx::assert_relative_eq;
use tci_core::{
    Compartments, DrugModel, Infusion, PkPdModel, Pump, PumpConfig, TargetEffect,
};

fn marsh_70kg() -> DrugModel {
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

fn pump(end_time: f64) -> Pump {
    Pump::new(marsh_70kg(), PumpConfig::new(10.0, end_time)).unwrap()
}

#[test]
fn three_compartment_plasma_target() {
    let mut pump = pump(3600.0);
    pump.add_target(0.0, 4.0, 10.0, TargetEffect::Plasma, None, None, false, false)
        .unwrap();
    pump.generate_infusions().unwrap();

    let loading = pump.infusion_list()[0];
    assert_relative_eq!(loading.start, 0.0);
    assert_relative_eq!(loading.duration, 10.0);
    assert!(loading.dose_per_sec > 0.0);

    let plasma = pump.pkpd().plasma_at(10.0, &[loading]);
    assert_relative_eq!(plasma, 4.0, epsilon = 0.01);
}

#[test]
fn original_effect_site_targeting() {
    let mut pump = pump(3600.0);
    pump.add_target(
        0.0,
        4.0,
        10.0,
        TargetEffect::EffectSite,
        None,
        None,
        true,
        false,
    )
    .unwrap();
    let trajectory = pump.run().unwrap();

    // A single dosed infusion, short enough to count as a bolus.
    let dosed: Vec<&Infusion> = pump
        .infusion_list()
        .iter()
        .filter(|infusion| infusion.dose_per_sec > 0.0)
        .collect();
    assert_eq!(dosed.len(), 1);
    assert!(dosed[0].is_bolus(pump.config().bolus_time));

    // The effect site reaches the target later, within tolerance.
    let reach = trajectory
        .iter()
        .find(|point| point.effect_site >= 4.0 - 0.02)
        .expect("effect site never approached the target");
    assert!(reach.time > dosed[0].end);
    assert!(reach.time < 600.0);
    let ce_max = trajectory
        .iter()
        .map(|point| point.effect_site)
        .fold(0.0, f64::max);
    assert_relative_eq!(ce_max, 4.0, epsilon = 0.02);

    // The solved overshoot multiplier is written back into the target.
    let solved = pump.target_concentrations()[0].cp_limit.unwrap();
    assert!(solved > 1.0);
}

#[test]
fn revised_effect_site_targeting() {
    let mut pump = pump(3600.0);
    pump.add_target(
        0.0,
        4.0,
        10.0,
        TargetEffect::EffectSite,
        Some(1.5),
        Some(20.0),
        false,
        false,
    )
    .unwrap();
    let trajectory = pump.run().unwrap();

    // Bolus, plateau, zero-dose coast.
    let infusions = pump.infusion_list();
    assert!(infusions.len() >= 3);
    let (bolus, plateau, coast) = (infusions[0], infusions[1], infusions[2]);
    assert_relative_eq!(bolus.duration, 20.0);
    assert!(bolus.dose_per_sec > 0.0);
    assert!(plateau.dose_per_sec > 0.0 && plateau.dose_per_sec < bolus.dose_per_sec);
    assert_relative_eq!(plateau.start, bolus.end);
    assert_eq!(coast.dose_per_sec, 0.0);
    assert_relative_eq!(coast.start, plateau.end);

    let ce_max = trajectory
        .iter()
        .map(|point| point.effect_site)
        .fold(0.0, f64::max);
    let cp_max = trajectory
        .iter()
        .map(|point| point.plasma)
        .fold(0.0, f64::max);
    assert_relative_eq!(ce_max, 4.0, epsilon = 0.02);
    assert!(cp_max <= 6.01);
}

#[test]
fn maintenance_schedule_doubles_and_truncates() {
    let mut pump = pump(3600.0);
    pump.add_target(0.0, 4.0, 10.0, TargetEffect::Plasma, None, None, false, true)
        .unwrap();
    pump.generate_infusions().unwrap();

    let maintenance: Vec<f64> = pump.infusion_list()[1..]
        .iter()
        .map(|infusion| infusion.duration)
        .collect();
    assert_eq!(maintenance, vec![300.0, 600.0, 1200.0, 1490.0]);
    assert_relative_eq!(pump.infusion_list().last().unwrap().end, 3600.0);
}

#[test]
fn plasma_decrement_round_trip() {
    let mut pump = pump(3600.0);
    pump.add_target(0.0, 4.0, 10.0, TargetEffect::Plasma, None, None, false, true)
        .unwrap();
    pump.generate_infusions().unwrap();

    let delta = pump.plasma_decrement_time(300.0, 1.0).unwrap();
    assert_eq!(delta, 437.0);

    // Verify against the truncated schedule the query reasons over.
    let stopped: Vec<Infusion> = pump
        .infusion_list()
        .iter()
        .filter(|infusion| infusion.start < 300.0)
        .map(|infusion| {
            if infusion.end > 300.0 {
                Infusion::new(infusion.start, infusion.dose_per_sec, 300.0 - infusion.start)
            } else {
                *infusion
            }
        })
        .collect();
    let pkpd = pump.pkpd();
    assert!(pkpd.plasma_at(300.0 + delta, &stopped) <= 1.0);
    assert!(pkpd.plasma_at(300.0 + delta - 1.0, &stopped) > 1.0);
}

#[test]
fn tpeak_method_recovers_ke0() {
    let pkpd = PkPdModel::new(&marsh_70kg()).unwrap();
    let ke0 = pkpd.ke0_from_tpeak(1.0, 236.0, 0.25831).unwrap();
    assert_relative_eq!(ke0, 0.26 / 60.0, epsilon = 1e-4);
}

#[test]
fn superposition_of_disjoint_schedules() {
    let pkpd = PkPdModel::new(&marsh_70kg()).unwrap();
    let first = [Infusion::new(0.0, 3.0, 15.0)];
    let second = [Infusion::new(400.0, 0.4, 120.0)];
    let union = [first[0], second[0]];
    for t in (0..1200).step_by(7) {
        let t = t as f64;
        assert_relative_eq!(
            pkpd.plasma_at(t, &union),
            pkpd.plasma_at(t, &first) + pkpd.plasma_at(t, &second),
            epsilon = 1e-12
        );
    }
}

#[test]
fn decay_after_last_infusion_is_monotone_and_unimodal() {
    let mut pump = pump(3600.0);
    pump.add_target(
        0.0,
        4.0,
        10.0,
        TargetEffect::EffectSite,
        None,
        None,
        true,
        false,
    )
    .unwrap();
    let trajectory = pump.run().unwrap();

    let last_dosed_end = pump
        .infusion_list()
        .iter()
        .filter(|infusion| infusion.dose_per_sec > 0.0)
        .map(|infusion| infusion.end)
        .fold(0.0, f64::max) as usize;

    // Plasma strictly decreasing once dosing has stopped.
    for window in trajectory[last_dosed_end + 1..].windows(2) {
        assert!(window[1].plasma < window[0].plasma);
    }
    // Effect site rises to one peak, then never rises again.
    let peak = trajectory
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.effect_site.total_cmp(&b.1.effect_site))
        .map(|(i, _)| i)
        .unwrap();
    for window in trajectory[peak..].windows(2) {
        assert!(window[1].effect_site <= window[0].effect_site);
    }
}

#[test]
fn sequential_effect_site_targets_solve_on_the_existing_trace() {
    let mut pump = pump(3600.0);
    pump.add_target(
        0.0,
        3.0,
        10.0,
        TargetEffect::EffectSite,
        None,
        None,
        true,
        true,
    )
    .unwrap();
    pump.add_target(
        900.0,
        6.0,
        10.0,
        TargetEffect::EffectSite,
        None,
        None,
        true,
        true,
    )
    .unwrap();
    let trajectory = pump.run().unwrap();

    // Both solves converge and write their multipliers back.
    let targets = pump.target_concentrations();
    assert!(targets[0].cp_limit.unwrap() > 1.0);
    assert!(targets[1].cp_limit.unwrap() > 1.0);

    // The second target gets its own bolus at 900 s on top of the
    // maintained trace.
    let bolus2 = pump
        .infusion_list()
        .iter()
        .find(|infusion| infusion.start == 900.0 && infusion.dose_per_sec > 0.0)
        .expect("no bolus for the second target");
    assert!(bolus2.is_bolus(pump.config().bolus_time));

    // Before the step-up the trace sits at the first target's level; it
    // only touches the new level after the second bolus has run.
    let ce_before: f64 = trajectory[..900]
        .iter()
        .map(|point| point.effect_site)
        .fold(0.0, f64::max);
    assert_relative_eq!(ce_before, 3.0, epsilon = 0.02);
    let crossing = trajectory
        .iter()
        .find(|point| point.effect_site >= 6.0 - 0.02)
        .expect("effect site never approached the second target");
    assert!(crossing.time > bolus2.end);

    // The reached time anchoring the coast and the following maintenance
    // is the post-bolus peak of the combined trace, not an artefact of the
    // earlier targets.
    let coast2 = pump
        .infusion_list()
        .iter()
        .find(|infusion| infusion.start == bolus2.end && infusion.dose_per_sec == 0.0)
        .expect("no coast after the second bolus");
    let peak_time = trajectory
        .iter()
        .max_by(|a, b| a.effect_site.total_cmp(&b.effect_site))
        .map(|point| point.time)
        .unwrap();
    assert!((coast2.end - peak_time).abs() <= 2.0);
    assert!(pump
        .infusion_list()
        .iter()
        .any(|infusion| infusion.start == coast2.end && infusion.dose_per_sec > 0.0));

    // The combined trace peaks at the second target and holds it.
    let ce_max = trajectory
        .iter()
        .map(|point| point.effect_site)
        .fold(0.0, f64::max);
    assert_relative_eq!(ce_max, 6.0, epsilon = 0.02);
    assert_relative_eq!(trajectory[3599].effect_site, 6.0, epsilon = 0.05);
}

#[test]
fn multi_target_session_stays_consistent() {
    let mut pump = pump(3600.0);
    pump.add_target(
        0.0,
        3.0,
        10.0,
        TargetEffect::EffectSite,
        Some(2.0),
        Some(10.0),
        false,
        true,
    )
    .unwrap();
    pump.add_target(1800.0, 4.0, 60.0, TargetEffect::Plasma, None, None, false, true)
        .unwrap();
    let trajectory = pump.run().unwrap();

    assert_eq!(trajectory.len(), 3600);
    assert!(trajectory
        .iter()
        .all(|point| point.plasma >= 0.0 && point.effect_site >= 0.0));

    // The second target is a plasma step-up solved on top of the first.
    let plasma_late = trajectory[3599].plasma;
    assert_relative_eq!(plasma_late, 4.0, epsilon = 0.1);

    // Rows are well-formed and in schedule order.
    for infusion in pump.infusion_list() {
        assert_relative_eq!(infusion.end, infusion.start + infusion.duration);
        assert!(infusion.dose_per_sec >= 0.0);
    }
    for pair in pump.infusion_list().windows(2) {
        assert!(pair[1].start >= pair[0].start);
    }
}
