use log::debug;

use super::PkPdModel;
use crate::error::{TciError, TciResult};
use crate::models::Infusion;

/// Decrement scans give up once the cursor has advanced this far; a target
/// below the model's asymptotic floor would otherwise never terminate.
const DECREMENT_LIMIT: f64 = 1.0e6;

/// Stops every infusion at `time`: later rows are dropped, a row crossing
/// `time` is cut short at it.
fn stopped_at(infusions: &[Infusion], time: f64) -> Vec<Infusion> {
    infusions
        .iter()
        .filter(|infusion| infusion.start < time)
        .map(|infusion| {
            if infusion.end > time {
                Infusion::new(infusion.start, infusion.dose_per_sec, time - infusion.start)
            } else {
                *infusion
            }
        })
        .collect()
}

impl PkPdModel {
    /// Seconds until plasma concentration falls to `target` once all
    /// infusions are stopped at `from`.
    pub fn plasma_decrement_time(
        &self,
        infusions: &[Infusion],
        from: f64,
        target: f64,
    ) -> TciResult<f64> {
        // A target of zero is unreachable under exponential decay.
        let target = if target <= 0.0 { 0.1 } else { target };
        let stopped = stopped_at(infusions, from);

        let mut time = from;
        while self.plasma_at(time, &stopped) > target {
            time += 1.0;
            if time - from > DECREMENT_LIMIT {
                return Err(TciError::InvalidInput(format!(
                    "plasma does not decay to {target} within {DECREMENT_LIMIT} s"
                )));
            }
        }
        debug!(
            "plasma decrement from {from} s to {target}: {} s",
            time - from
        );
        Ok(time - from)
    }

    /// Seconds until the effect-site concentration falls to `target` once
    /// all infusions are stopped at `from`.
    pub fn effect_decrement_time(
        &self,
        infusions: &[Infusion],
        from: f64,
        target: f64,
    ) -> TciResult<f64> {
        let target = if target <= 0.0 { 0.1 } else { target };
        let stopped = stopped_at(infusions, from);

        // The effect site has to be integrated from the start of the
        // simulation; scan its trajectory in growing windows.
        let mut horizon = from + 3600.0;
        loop {
            let plasma = self.plasma_profile(&stopped, horizon);
            let effect = self.effect_profile(&plasma);
            for (t, ce) in effect.iter().enumerate() {
                let t = t as f64;
                if t > from && *ce <= target {
                    debug!("effect decrement from {from} s to {target}: {} s", t - from);
                    return Ok(t - from);
                }
            }
            horizon += 3600.0;
            if horizon - from > DECREMENT_LIMIT {
                return Err(TciError::InvalidInput(format!(
                    "effect site does not decay to {target} within {DECREMENT_LIMIT} s"
                )));
            }
        }
    }
}
