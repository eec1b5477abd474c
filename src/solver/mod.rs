//! Embedded univariate root finding.
//!
//! The dosing solves need exactly two compact routines: a Newton-secant
//! iteration seeded from two points and Brent's method on a sign-changing
//! bracket. Both are self-contained here rather than pulled from a general
//! numeric stack.

use crate::error::{TciError, TciResult};

/// Secant iteration from the seeds `x0`, `x1`.
///
/// Converges when successive iterates are within `xtol`. A flat secant or an
/// exhausted iteration budget is reported as `NonConvergence`.
pub fn secant<F>(mut f: F, mut x0: f64, mut x1: f64, xtol: f64, max_iter: usize) -> TciResult<f64>
where
    F: FnMut(f64) -> f64,
{
    let mut f0 = f(x0);
    if f0 == 0.0 {
        return Ok(x0);
    }
    let mut f1 = f(x1);

    for _ in 0..max_iter {
        if f1 == f0 {
            return Err(TciError::NonConvergence(format!(
                "secant step is flat at x = {x1}"
            )));
        }
        let x2 = x1 - f1 * (x1 - x0) / (f1 - f0);
        if (x2 - x1).abs() <= xtol {
            return Ok(x2);
        }
        x0 = x1;
        f0 = f1;
        x1 = x2;
        f1 = f(x1);
    }
    Err(TciError::NonConvergence(format!(
        "secant exceeded {max_iter} iterations"
    )))
}

/// Brent's method on `[a, b]`.
///
/// Requires a sign change over the bracket and combines bisection with
/// secant and inverse quadratic steps.
pub fn brent<F>(mut f: F, mut a: f64, mut b: f64, xtol: f64, max_iter: usize) -> TciResult<f64>
where
    F: FnMut(f64) -> f64,
{
    let mut fa = f(a);
    let mut fb = f(b);
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if (fa > 0.0) == (fb > 0.0) {
        return Err(TciError::RootNotBracketed(format!(
            "no sign change over [{a}, {b}]"
        )));
    }

    let mut c = b;
    let mut fc = fb;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..max_iter {
        if (fb > 0.0) == (fc > 0.0) {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * xtol;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            return Ok(b);
        }

        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            // Interpolation step: secant when two points are available,
            // inverse quadratic when three are.
            let s = fb / fa;
            let (mut p, mut q): (f64, f64);
            if a == c {
                p = 2.0 * xm * s;
                q = 1.0 - s;
            } else {
                let r0 = fa / fc;
                let r1 = fb / fc;
                p = s * (2.0 * xm * r0 * (r0 - r1) - (b - a) * (r1 - 1.0));
                q = (r0 - 1.0) * (r1 - 1.0) * (s - 1.0);
            }
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        if d.abs() > tol1 {
            b += d;
        } else {
            b += if xm >= 0.0 { tol1 } else { -tol1 };
        }
        fb = f(b);
    }
    Err(TciError::NonConvergence(format!(
        "brent exceeded {max_iter} iterations"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_secant_finds_quadratic_root() {
        let root = secant(|x| x * x - 4.0, 1.0, 3.0, 1e-10, 50).unwrap();
        assert_relative_eq!(root, 2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_secant_reports_flat_function() {
        assert!(matches!(
            secant(|_| 1.0, 0.0, 1.0, 1e-10, 50),
            Err(TciError::NonConvergence(_))
        ));
    }

    #[test]
    fn test_brent_finds_transcendental_root() {
        let root = brent(|x| x.exp() - 3.0, 0.0, 2.0, 1e-12, 100).unwrap();
        assert_relative_eq!(root, 3.0_f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn test_brent_rejects_unbracketed_root() {
        assert!(matches!(
            brent(|x| x * x + 1.0, -1.0, 1.0, 1e-12, 100),
            Err(TciError::RootNotBracketed(_))
        ));
    }

    #[test]
    fn test_brent_accepts_endpoint_root() {
        let root = brent(|x| x - 1.0, 1.0, 2.0, 1e-12, 100).unwrap();
        assert_relative_eq!(root, 1.0);
    }
}
