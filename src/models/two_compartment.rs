use super::Disposition;
use crate::error::{TciError, TciResult};

/// Bi-exponential disposition from the quadratic in the hybrid rate
/// constants. `k20` models elimination from the peripheral compartment and
/// is zero for the classic central-elimination case.
pub(crate) fn disposition(
    v1: f64,
    k10: f64,
    k12: f64,
    k21: f64,
    k20: f64,
) -> TciResult<Disposition> {
    let a1 = k21 * k10 + k12 * k20 + k10 * k20;
    let a2 = k12 + k21 + k10 + k20;

    let discriminant = a2 * a2 - 4.0 * a1;
    if discriminant < 0.0 {
        return Err(TciError::InvalidModel(
            "two-compartment rate constants give complex roots".to_string(),
        ));
    }

    let beta = 0.5 * (a2 - discriminant.sqrt());
    if beta <= 0.0 {
        return Err(TciError::InvalidModel(format!(
            "two-compartment disposition rate beta = {beta} is not positive"
        )));
    }
    let alpha = a1 / beta;

    let a = (alpha - k21 - k20) / (v1 * (alpha - beta));
    let b = (beta - k21 - k20) / (v1 * (beta - alpha));

    Ok(Disposition {
        a,
        b,
        c: 0.0,
        alpha,
        beta,
        gamma: 1.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_coefficients_sum_to_inverse_volume() {
        let d = disposition(9.3, 0.3 / 60.0, 0.2 / 60.0, 0.05 / 60.0, 0.0).unwrap();
        assert_relative_eq!(d.a + d.b, 1.0 / 9.3, epsilon = 1e-12);
        assert!(d.alpha > d.beta);
        assert!(d.beta > 0.0);
    }

    #[test]
    fn test_peripheral_elimination_shifts_rates() {
        let without = disposition(9.3, 0.3 / 60.0, 0.2 / 60.0, 0.05 / 60.0, 0.0).unwrap();
        let with = disposition(9.3, 0.3 / 60.0, 0.2 / 60.0, 0.05 / 60.0, 0.1 / 60.0).unwrap();
        assert!(with.beta > without.beta);
        assert_relative_eq!(with.a + with.b, 1.0 / 9.3, epsilon = 1e-12);
    }

    #[test]
    fn test_no_elimination_is_rejected() {
        // k10 = k20 = 0 collapses the slow root to zero.
        assert!(disposition(9.3, 0.0, 0.2, 0.05, 0.0).is_err());
    }
}
