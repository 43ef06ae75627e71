//! Natural cubic spline through a set of knots.
//!
//! Second derivatives at the knots are found with the Thomas algorithm on
//! the usual tridiagonal system, with `M_0 = M_{n-1} = 0` (natural boundary).
//! Evaluation outside the knot range extends the first/last cubic piece.

use crate::{Result, SignalError};

/// Interpolating cubic spline with natural boundary conditions.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl CubicSpline {
    /// Fit a natural cubic spline through `(xs[i], ys[i])`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidParameter`] when fewer than two knots
    /// are given, the slices differ in length, or `xs` is not strictly
    /// increasing.
    pub fn natural(xs: &[f64], ys: &[f64]) -> Result<Self> {
        let n = xs.len();
        if n != ys.len() {
            return Err(SignalError::invalid(
                "ys",
                format!("expected {n} values, got {}", ys.len()),
            ));
        }
        if n < 2 {
            return Err(SignalError::invalid("xs", "a spline needs at least two knots"));
        }
        if xs.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(SignalError::invalid("xs", "knots must be strictly increasing"));
        }

        let mut m = vec![0.0; n];
        if n > 2 {
            // Interior equations i = 1..n-1:
            // h[i-1] M[i-1] + 2 (h[i-1] + h[i]) M[i] + h[i] M[i+1] = rhs[i]
            let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
            let k = n - 2;
            let mut diag = vec![0.0; k];
            let mut upper = vec![0.0; k];
            let mut rhs = vec![0.0; k];
            for j in 0..k {
                let i = j + 1;
                diag[j] = 2.0 * (h[i - 1] + h[i]);
                upper[j] = h[i];
                rhs[j] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
            }
            // Forward sweep. The sub-diagonal entry of row j is h[j].
            for j in 1..k {
                let w = h[j] / diag[j - 1];
                diag[j] -= w * upper[j - 1];
                rhs[j] -= w * rhs[j - 1];
            }
            // Back substitution.
            m[k] = rhs[k - 1] / diag[k - 1];
            for j in (0..k - 1).rev() {
                m[j + 1] = (rhs[j] - upper[j] * m[j + 2]) / diag[j];
            }
        }

        Ok(CubicSpline { xs: xs.to_vec(), ys: ys.to_vec(), m })
    }

    /// Evaluate the spline at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        // Index of the interval [xs[i], xs[i+1]] that holds x, clamped to the
        // end pieces for extrapolation.
        let i = self.xs.partition_point(|&k| k <= x).clamp(1, n - 1) - 1;
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let h = x1 - x0;
        let a = (x1 - x) / h;
        let b = (x - x0) / h;
        a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a.powi(3) - a) * self.m[i] + (b.powi(3) - b) * self.m[i + 1]) * h * h / 6.0
    }
}
