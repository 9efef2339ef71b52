//! General-purpose Nelder-Mead simplex minimizer.
//!
//! Both estimators maximize a log-likelihood by minimizing its negation over
//! log-transformed parameters, so a derivative-free minimizer over a plain
//! `Fn(&[f64]) -> f64` is the only optimization surface the engine needs.
//! Non-finite objective values during the search are treated as `+inf`,
//! which walks the simplex back out of invalid regions instead of aborting.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// Standard reflection / expansion / contraction / shrink coefficients.
const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Search budget and termination tolerances.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimplexOptions {
    /// Hard iteration budget; exhausting it yields `converged = false`.
    pub max_iterations: usize,
    /// Relative spread of objective values across the simplex below which
    /// the search stops.
    pub f_tol: f64,
    /// Offset applied per axis to build the initial simplex.
    pub initial_step: f64,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            f_tol: 1e-10,
            initial_step: 0.25,
        }
    }
}

/// Where the search ended up. `converged = false` is not an error here;
/// the calling estimator decides whether to surface it as one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplexOutcome {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize `objective` starting from `start`.
///
/// Rejects an empty start vector and a start point where the objective is
/// already non-finite (nothing to walk back from).
pub fn minimize<F>(objective: F, start: &[f64], options: &SimplexOptions) -> Result<SimplexOutcome>
where
    F: Fn(&[f64]) -> f64,
{
    if start.is_empty() {
        return Err(Error::InvalidInput("empty optimization start point".into()));
    }
    let eval = |point: &[f64]| -> f64 {
        let v = objective(point);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };
    if !objective(start).is_finite() {
        return Err(Error::InvalidInput(
            "objective is non-finite at the start point".into(),
        ));
    }

    let dim = start.len();

    // Initial simplex: start point plus one axis-offset vertex per dimension.
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    simplex.push((start.to_vec(), eval(start)));
    for axis in 0..dim {
        let mut vertex = start.to_vec();
        vertex[axis] += options.initial_step;
        let value = eval(&vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < options.max_iterations {
        iterations += 1;
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[dim].1;
        if spread(best, worst) <= options.f_tol {
            converged = true;
            break;
        }

        // Centroid of all vertices except the worst.
        let mut centroid = vec![0.0; dim];
        for (vertex, _) in &simplex[..dim] {
            for (c, v) in centroid.iter_mut().zip(vertex) {
                *c += v / dim as f64;
            }
        }

        let reflected = blend(&centroid, &simplex[dim].0, -REFLECT);
        let f_reflected = eval(&reflected);

        if f_reflected < best {
            let expanded = blend(&centroid, &simplex[dim].0, -EXPAND);
            let f_expanded = eval(&expanded);
            simplex[dim] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
        } else if f_reflected < simplex[dim - 1].1 {
            simplex[dim] = (reflected, f_reflected);
        } else {
            // Contract toward whichever of worst/reflected is better.
            let contracted = if f_reflected < simplex[dim].1 {
                blend(&centroid, &reflected, CONTRACT)
            } else {
                blend(&centroid, &simplex[dim].0, CONTRACT)
            };
            let f_contracted = eval(&contracted);
            if f_contracted < simplex[dim].1.min(f_reflected) {
                simplex[dim] = (contracted, f_contracted);
            } else {
                // Shrink everything toward the best vertex.
                let anchor = simplex[0].0.clone();
                for (vertex, value) in simplex.iter_mut().skip(1) {
                    for (v, a) in vertex.iter_mut().zip(&anchor) {
                        *v = a + SHRINK * (*v - a);
                    }
                    *value = eval(vertex);
                }
            }
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, value) = simplex.swap_remove(0);
    Ok(SimplexOutcome {
        x,
        value,
        iterations,
        converged,
    })
}

/// Relative spread of the objective across the simplex.
fn spread(best: f64, worst: f64) -> f64 {
    if !worst.is_finite() {
        return f64::INFINITY;
    }
    (worst - best).abs() / (best.abs() + 1.0)
}

/// `centroid + weight * (point - centroid)`.
fn blend(centroid: &[f64], point: &[f64], weight: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(point)
        .map(|(c, p)| c + weight * (p - c))
        .collect()
}
