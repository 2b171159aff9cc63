//! Bounded Nelder-Mead simplex minimisation
//!
//! Derivative-free, which suits the sum-of-squares objectives of the
//! smoothing and ARIMA models: they are cheap to evaluate but have no
//! convenient closed-form gradient.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Settings for a bounded Nelder-Mead run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NelderMead {
    /// Lower bound per coordinate
    pub lower: Vec<f64>,
    /// Upper bound per coordinate
    pub upper: Vec<f64>,
    /// Maximum number of simplex iterations
    pub max_iter: usize,
    /// Convergence threshold on the simplex diameter
    pub tolerance: f64,
}

/// Best point found by the optimizer
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Location of the minimum
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Iterations used
    pub iterations: usize,
}

impl NelderMead {
    /// Create an optimizer over the box `[lower, upper]`
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.is_empty() || lower.len() != upper.len() {
            return Err(MathError::InvalidInput(format!(
                "Bounds must be non-empty and of equal length ({} vs {})",
                lower.len(),
                upper.len()
            )));
        }
        if lower.iter().zip(&upper).any(|(lo, hi)| lo > hi) {
            return Err(MathError::InvalidInput(
                "Every lower bound must not exceed its upper bound".to_string(),
            ));
        }

        Ok(Self {
            lower,
            upper,
            max_iter: 200,
            tolerance: 1e-6,
        })
    }

    /// Override the iteration cap
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Override the convergence tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn clamp(&self, point: &mut [f64]) {
        for (i, v) in point.iter_mut().enumerate() {
            *v = v.clamp(self.lower[i], self.upper[i]);
        }
    }

    /// Minimise `f` starting from `initial`.
    ///
    /// Non-finite objective values are treated as `f64::MAX`, so a region
    /// where the model blows up is simply avoided.
    pub fn minimize<F>(&self, f: F, initial: &[f64]) -> Result<Minimum>
    where
        F: Fn(&[f64]) -> f64,
    {
        let dim = self.lower.len();
        if initial.len() != dim {
            return Err(MathError::InvalidInput(format!(
                "Initial point has {} coordinates, bounds have {}",
                initial.len(),
                dim
            )));
        }

        let objective = |p: &[f64]| {
            let v = f(p);
            if v.is_finite() {
                v
            } else {
                f64::MAX
            }
        };

        let n = dim + 1;
        let mut start = initial.to_vec();
        self.clamp(&mut start);

        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n);
        simplex.push(start.clone());
        for i in 0..dim {
            let mut vertex = start.clone();
            let step = (self.upper[i] - self.lower[i]) * 0.1;
            vertex[i] = (vertex[i] + step).min(self.upper[i]);
            if (vertex[i] - start[i]).abs() < 1e-12 {
                vertex[i] = (vertex[i] - step).max(self.lower[i]);
            }
            simplex.push(vertex);
        }

        let mut values: Vec<f64> = simplex.iter().map(|v| objective(v.as_slice())).collect();
        let mut iterations = 0;

        while iterations < self.max_iter {
            iterations += 1;

            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

            let best_idx = order[0];
            let worst_idx = order[n - 1];
            let second_worst_idx = order[n.saturating_sub(2)];

            let diameter = simplex[best_idx]
                .iter()
                .zip(&simplex[worst_idx])
                .map(|(a, b)| (a - b).abs())
                .fold(0.0_f64, f64::max);
            if diameter < self.tolerance {
                break;
            }

            // Centroid of every vertex except the worst
            let mut centroid = vec![0.0; dim];
            for &idx in &order[..n - 1] {
                for (c, v) in centroid.iter_mut().zip(&simplex[idx]) {
                    *c += v;
                }
            }
            for c in centroid.iter_mut() {
                *c /= (n - 1) as f64;
            }

            let mut reflected: Vec<f64> = centroid
                .iter()
                .zip(&simplex[worst_idx])
                .map(|(c, w)| 2.0 * c - w)
                .collect();
            self.clamp(&mut reflected);
            let f_reflected = objective(&reflected[..]);

            if f_reflected < values[best_idx] {
                let mut expanded: Vec<f64> = centroid
                    .iter()
                    .zip(&reflected)
                    .map(|(c, r)| 2.0 * r - c)
                    .collect();
                self.clamp(&mut expanded);
                let f_expanded = objective(&expanded[..]);

                if f_expanded < f_reflected {
                    simplex[worst_idx] = expanded;
                    values[worst_idx] = f_expanded;
                } else {
                    simplex[worst_idx] = reflected;
                    values[worst_idx] = f_reflected;
                }
            } else if f_reflected < values[second_worst_idx] {
                simplex[worst_idx] = reflected;
                values[worst_idx] = f_reflected;
            } else {
                let (contract_from, f_contract_from) = if f_reflected < values[worst_idx] {
                    (reflected, f_reflected)
                } else {
                    (simplex[worst_idx].clone(), values[worst_idx])
                };

                let mut contracted: Vec<f64> = centroid
                    .iter()
                    .zip(&contract_from)
                    .map(|(c, w)| 0.5 * (c + w))
                    .collect();
                self.clamp(&mut contracted);
                let f_contracted = objective(&contracted[..]);

                if f_contracted < f_contract_from {
                    simplex[worst_idx] = contracted;
                    values[worst_idx] = f_contracted;
                } else {
                    // Shrink towards the best vertex
                    let best_point = simplex[best_idx].clone();
                    for &idx in &order[1..] {
                        for (v, b) in simplex[idx].iter_mut().zip(&best_point) {
                            *v = 0.5 * (*v + b);
                        }
                        let mut shrunk = simplex[idx].clone();
                        self.clamp(&mut shrunk);
                        values[idx] = objective(&shrunk[..]);
                        simplex[idx] = shrunk;
                    }
                }
            }
        }

        let best_idx = values
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);

        Ok(Minimum {
            point: simplex[best_idx].clone(),
            value: values[best_idx],
            iterations,
        })
    }
}
