use super::PkPdModel;
use crate::error::TciResult;
use crate::solver;

/// Search bracket for the equilibration constant, per second.
const KE0_BRACKET: (f64, f64) = (1.0e-5, 1.0e2);

impl PkPdModel {
    /// Derives k_e0 from a published time-to-peak-effect observation.
    ///
    /// For a bolus of `dose` at t = 0 the effect-site curve peaks at
    /// `tpeak` seconds with concentration `ce_tpeak`; the returned k_e0 is
    /// the rate constant (per second) whose analytic effect-site response
    /// is stationary there, found with Brent's method. Fails with
    /// `RootNotBracketed` when the residual does not change sign over the
    /// bracket.
    pub fn ke0_from_tpeak(&self, dose: f64, tpeak: f64, ce_tpeak: f64) -> TciResult<f64> {
        let d = *self.disposition();
        let phases = [(d.a, d.alpha), (d.b, d.beta), (d.c, d.gamma)];

        let residual = |ke0: f64| {
            let mut sum = 0.0;
            for (coefficient, rate) in phases {
                if coefficient == 0.0 {
                    continue;
                }
                sum += if (ke0 - rate).abs() < 1.0e-12 {
                    // Removable singularity where ke0 meets a phase rate.
                    rate * coefficient * (-rate * tpeak).exp() * (rate * tpeak - 1.0)
                } else {
                    ke0 * coefficient / (ke0 - rate)
                        * (rate * (-rate * tpeak).exp() - ke0 * (-ke0 * tpeak).exp())
                };
            }
            (dose - ce_tpeak) * sum
        };

        solver::brent(residual, KE0_BRACKET.0, KE0_BRACKET.1, 1.0e-10, 200)
    }
}
