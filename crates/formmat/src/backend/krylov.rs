//! Conjugate gradient solver over any `LinearOperator`.
//!
//! Works identically on assembled and shell matrices, since it only
//! needs the operator action.

use super::options::OptionsDatabase;
use super::traits::*;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Tolerances of the Krylov solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KrylovConfig {
    /// Relative residual tolerance
    pub rtol: f64,
    /// Absolute residual tolerance
    pub atol: f64,
    /// Maximum iterations
    pub max_it: usize,
}

impl Default for KrylovConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-10,
            atol: 1e-50,
            max_it: 1000,
        }
    }
}

impl KrylovConfig {
    /// Override defaults with `<prefix>ksp_rtol`, `<prefix>ksp_atol` and
    /// `<prefix>ksp_max_it`.
    pub fn from_options(options: &OptionsDatabase, prefix: Option<&str>) -> BackendResult<Self> {
        let mut config = Self::default();
        if let Some(rtol) = options.get_parsed(prefix, "ksp_rtol")? {
            config.rtol = rtol;
        }
        if let Some(atol) = options.get_parsed(prefix, "ksp_atol")? {
            config.atol = atol;
        }
        if let Some(max_it) = options.get_parsed(prefix, "ksp_max_it")? {
            config.max_it = max_it;
        }
        Ok(config)
    }
}

/// Solve `A x = b` for a symmetric positive definite operator.
pub fn cg(
    op: &dyn LinearOperator,
    b: &DVector<f64>,
    config: &KrylovConfig,
) -> BackendResult<(DVector<f64>, SolveInfo)> {
    let (nrows, ncols) = op.global_shape();
    if nrows != ncols {
        return Err(BackendError::SizeMismatch {
            expected: nrows,
            actual: ncols,
        });
    }
    if b.len() != nrows {
        return Err(BackendError::SizeMismatch {
            expected: nrows,
            actual: b.len(),
        });
    }

    let mut x = DVector::zeros(nrows);
    let mut r = b.clone();
    let mut p = r.clone();
    let mut rr = r.dot(&r);
    let tolerance = (config.rtol * b.norm()).max(config.atol);

    if rr.sqrt() <= tolerance {
        return Ok((x, info(0, rr.sqrt())));
    }

    for iteration in 1..=config.max_it {
        let ap = op.mult(&p)?;
        let pap = p.dot(&ap);
        if pap <= 0.0 {
            return Err(BackendError::Diverged(format!(
                "indefinite operator detected at iteration {} (p'Ap = {:e})",
                iteration, pap
            )));
        }

        let alpha = rr / pap;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);

        let rr_new = r.dot(&r);
        log::trace!("cg iteration {}: residual {:e}", iteration, rr_new.sqrt());
        if rr_new.sqrt() <= tolerance {
            log::debug!("cg converged in {} iterations", iteration);
            return Ok((x, info(iteration, rr_new.sqrt())));
        }

        let beta = rr_new / rr;
        p = &r + &p * beta;
        rr = rr_new;
    }

    Err(BackendError::Diverged(format!(
        "no convergence after {} iterations (residual {:e})",
        config.max_it,
        rr.sqrt()
    )))
}

fn info(iterations: usize, residual: f64) -> SolveInfo {
    SolveInfo {
        iterations,
        residual_norm: Some(residual),
        solver_name: "cg".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sparse::SparseMat;
    use crate::backend::sparsity::{MatSpec, SparsityBuilder};
    use crate::comm::Comm;
    use nalgebra::DMatrix;

    fn assembled(values: &[f64], n: usize) -> SparseMat {
        let mut builder = SparsityBuilder::new(n, n);
        let all: Vec<usize> = (0..n).collect();
        builder.insert_block(&all, &all).unwrap();
        let mut mat = SparseMat::create(Comm::world(), MatSpec::new(builder.build().unwrap())).unwrap();
        let rows: Vec<Option<usize>> = all.iter().copied().map(Some).collect();
        mat.set_values(&rows, &rows, &DMatrix::from_row_slice(n, n, values), InsertMode::Insert)
            .unwrap();
        mat.assemble().unwrap();
        mat
    }

    #[test]
    fn solves_spd_system() {
        // K = [4 -1 0; -1 4 -1; 0 -1 4], F = [1; 2; 1]
        let k = [4.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 4.0];
        let mat = assembled(&k, 3);
        let b = DVector::from_vec(vec![1.0, 2.0, 1.0]);

        let (x, info) = cg(&mat, &b, &KrylovConfig::default()).unwrap();
        let residual = DMatrix::from_row_slice(3, 3, &k) * &x - &b;
        assert!(residual.norm() < 1e-9);
        assert!(info.iterations <= 3);
        assert_eq!(info.solver_name, "cg");
    }

    #[test]
    fn zero_rhs_returns_immediately() {
        let mat = assembled(&[2.0, 0.0, 0.0, 2.0], 2);
        let (x, info) = cg(&mat, &DVector::zeros(2), &KrylovConfig::default()).unwrap();
        assert_eq!(x, DVector::zeros(2));
        assert_eq!(info.iterations, 0);
    }

    #[test]
    fn indefinite_operator_is_reported() {
        let mat = assembled(&[-1.0, 0.0, 0.0, -1.0], 2);
        let b = DVector::from_vec(vec![1.0, 0.0]);
        assert!(matches!(
            cg(&mat, &b, &KrylovConfig::default()),
            Err(BackendError::Diverged(_))
        ));
    }

    #[test]
    fn config_reads_prefixed_options() {
        let mut options = OptionsDatabase::new();
        options.set("mass_ksp_rtol", "1e-6");
        options.set("mass_ksp_max_it", "25");
        let config = KrylovConfig::from_options(&options, Some("mass_")).unwrap();
        assert_eq!(config.rtol, 1e-6);
        assert_eq!(config.max_it, 25);
        assert_eq!(config.atol, KrylovConfig::default().atol);
    }
}
