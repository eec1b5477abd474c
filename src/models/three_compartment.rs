use std::f64::consts::PI;

use super::Disposition;
use crate::error::{TciError, TciResult};

/// Tri-exponential disposition. The three hybrid rate constants are the
/// roots of the characteristic cubic in the micro-rate constants, taken in
/// trigonometric form; physiological parameter sets always yield three real
/// positive roots, anything else is rejected as an invalid model.
pub(crate) fn disposition(
    v1: f64,
    k10: f64,
    k12: f64,
    k21: f64,
    k13: f64,
    k31: f64,
) -> TciResult<Disposition> {
    let a0 = k10 * k21 * k31;
    let a1 = k10 * k31 + k21 * k31 + k21 * k13 + k10 * k21 + k31 * k12;
    let a2 = k10 + k12 + k13 + k21 + k31;

    // Depressed cubic; p >= 0 means the roots are not three distinct reals.
    let p = a1 - a2 * a2 / 3.0;
    let q = 2.0 * a2.powi(3) / 27.0 - a1 * a2 / 3.0 + a0;
    if p >= 0.0 {
        return Err(TciError::InvalidModel(
            "three-compartment rate constants give complex disposition roots".to_string(),
        ));
    }

    let r1 = (-p.powi(3) / 27.0).sqrt();
    let r2 = 2.0 * r1.cbrt();
    let theta = (-q / (2.0 * r1)).acos() / 3.0;

    let roots = [
        -(theta.cos() * r2 - a2 / 3.0),
        -((theta + 2.0 * PI / 3.0).cos() * r2 - a2 / 3.0),
        -((theta + 4.0 * PI / 3.0).cos() * r2 - a2 / 3.0),
    ];
    if roots.iter().any(|&r| r <= 0.0) {
        return Err(TciError::InvalidModel(
            "three-compartment disposition rates must be positive".to_string(),
        ));
    }

    let coefficient = |root: f64, other1: f64, other2: f64| {
        (1.0 / v1) * (k21 - root) / (root - other1) * (k31 - root) / (root - other2)
    };
    let mut phases = [
        (coefficient(roots[0], roots[1], roots[2]), roots[0]),
        (coefficient(roots[1], roots[0], roots[2]), roots[1]),
        (coefficient(roots[2], roots[0], roots[1]), roots[2]),
    ];
    // The trigonometric form does not order the roots; sort the phase pairs
    // so that alpha >= beta >= gamma.
    phases.sort_by(|x, y| y.1.total_cmp(&x.1));

    Ok(Disposition {
        a: phases[0].0,
        b: phases[1].0,
        c: phases[2].0,
        alpha: phases[0].1,
        beta: phases[1].1,
        gamma: phases[2].1,
    })
}
