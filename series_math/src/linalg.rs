//! Dense linear algebra for small normal-equation systems

use crate::{MathError, Result};

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
///
/// `a` is a square matrix given as rows. Systems here are at most a few
/// dozen unknowns, so no attempt is made at blocking or sparsity.
pub fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(format!(
            "Expected a {}x{} matrix for a right-hand side of length {}",
            n, n, n
        )));
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);

        if a[pivot_row][col].abs() < 1e-12 {
            return Err(MathError::CalculationError(
                "Matrix is singular or nearly singular".to_string(),
            ));
        }

        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot_values = a[col].clone();
        for row in col + 1..n {
            let factor = a[row][col] / pivot_values[col];
            if factor == 0.0 {
                continue;
            }
            for (k, pivot_value) in pivot_values.iter().enumerate().skip(col) {
                a[row][k] -= factor * pivot_value;
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Linear solve produced non-finite values".to_string(),
        ));
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_solve_small_system() {
        let a = vec![
            vec![2.0, 1.0, -1.0],
            vec![-3.0, -1.0, 2.0],
            vec![-2.0, 1.0, 2.0],
        ];
        let b = vec![8.0, -11.0, -3.0];
        let x = solve_linear_system(a, b).unwrap();

        assert_approx_eq!(x[0], 2.0);
        assert_approx_eq!(x[1], 3.0);
        assert_approx_eq!(x[2], -1.0);
    }

    #[test]
    fn test_pivoting_handles_zero_diagonal() {
        let a = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let x = solve_linear_system(a, vec![5.0, 7.0]).unwrap();
        assert_approx_eq!(x[0], 7.0);
        assert_approx_eq!(x[1], 5.0);
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve_linear_system(a, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let a = vec![vec![1.0, 2.0]];
        assert!(solve_linear_system(a, vec![1.0, 2.0]).is_err());
    }
}
