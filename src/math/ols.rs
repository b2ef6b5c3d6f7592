//! Ordinary least squares line fitting.
//!
//! The yearly-trend estimator repeatedly fits small regressions of
//! mean-trait-value on birth year:
//!
//! ```text
//! minimize Σ (y_i - a - b·x_i)^2
//! ```
//!
//! Implementation choices:
//! - We solve through SVD so the fit stays robust when the design matrix is
//!   tall or nearly collinear. (Nalgebra's `QR::solve` is intended for square
//!   systems and will panic for non-square matrices.)
//! - Year values are large (e.g. 2019) relative to their spread, which makes
//!   the raw `[1, x]` design poorly conditioned; we center `x` before solving
//!   and shift the intercept back afterwards.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y = a + b·x` by OLS and return `(a, b)`.
///
/// Returns `None` when fewer than two points are supplied or when the solve
/// fails (e.g. all `x` identical). A single point never causes a division
/// error; it is simply not enough to define a line.
pub fn fit_line(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len();
    let x_mean = points.iter().map(|(x, _)| *x).sum::<f64>() / n as f64;

    let mut design = DMatrix::zeros(n, 2);
    let mut rhs = DVector::zeros(n);
    for (row, (x, y)) in points.iter().enumerate() {
        design[(row, 0)] = 1.0;
        design[(row, 1)] = x - x_mean;
        rhs[row] = *y;
    }

    let beta = solve_least_squares(&design, &rhs)?;
    let slope = beta[1];
    let intercept = beta[0] - slope * x_mean;
    if !(intercept.is_finite() && slope.is_finite()) {
        return None;
    }
    Some((intercept, slope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn fit_line_recovers_exact_line_with_large_years() {
        let points: Vec<(f64, f64)> = (2015..=2020).map(|y| (y as f64, 40.0 + 2.5 * (y as f64 - 2015.0))).collect();
        let (a, b) = fit_line(&points).unwrap();
        assert!((b - 2.5).abs() < 1e-8);
        assert!((a + 2.5 * 2015.0 - 40.0).abs() < 1e-5);
    }

    #[test]
    fn fit_line_rejects_degenerate_input() {
        assert!(fit_line(&[(2019.0, 55.0)]).is_none());
        assert!(fit_line(&[]).is_none());
    }
}
