//! Lagged differencing and its inverse

use crate::{MathError, Result};

/// Apply one lagged difference: `y[t] - y[t - lag]`
///
/// The result is `lag` values shorter than the input.
pub fn difference(data: &[f64], lag: usize) -> Result<Vec<f64>> {
    if lag == 0 {
        return Err(MathError::InvalidInput(
            "Differencing lag must be positive".to_string(),
        ));
    }
    if data.len() <= lag {
        return Err(MathError::InsufficientData(format!(
            "Differencing at lag {} needs more than {} points, got {}",
            lag,
            lag,
            data.len()
        )));
    }

    Ok(data
        .windows(lag + 1)
        .map(|w| w[lag] - w[0])
        .collect())
}

/// Undo one lagged difference for values that continue `history`.
///
/// `history` is the undifferenced series the differences were taken from;
/// each forecast difference is added to the value `lag` steps earlier,
/// reusing freshly integrated values once the history runs out.
pub fn integrate(differences: &[f64], history: &[f64], lag: usize) -> Result<Vec<f64>> {
    if lag == 0 {
        return Err(MathError::InvalidInput(
            "Integration lag must be positive".to_string(),
        ));
    }
    if history.len() < lag {
        return Err(MathError::InsufficientData(format!(
            "Integration at lag {} needs at least {} history points, got {}",
            lag,
            lag,
            history.len()
        )));
    }

    let mut extended = history[history.len() - lag..].to_vec();
    for &delta in differences {
        let base = extended[extended.len() - lag];
        extended.push(base + delta);
    }

    Ok(extended.split_off(lag))
}
