//! Job execution: build the operator described by a configuration and
//! report on it.

use crate::config::{AssemblyConfig, BcConfig, FormConfig, RhsSpec};
use formmat::{
    assemble, cg, AssembleOptions, BilinearForm, DirichletBC, Error, FunctionSpace,
    IntervalMesh, KrylovConfig, MatType, MatrixLike, Result, SubDomain,
};
use nalgebra::DVector;
use serde::Serialize;
use std::sync::Arc;

/// Result of one job, serialised as the CLI output.
#[derive(Debug, Serialize)]
pub struct Report {
    pub generated_at: String,
    pub matrix: String,
    pub mat_type: MatType,
    pub shape: (usize, usize),
    pub block_shape: (usize, usize),
    pub has_bcs: bool,
    pub bcs: Vec<String>,
    /// Dense values; only for assembled operators.
    pub values: Option<Vec<Vec<f64>>>,
    pub nnz: Option<usize>,
    pub solve: Option<SolveReport>,
}

#[derive(Debug, Serialize)]
pub struct SolveReport {
    pub iterations: usize,
    pub residual_norm: Option<f64>,
    pub solution: Vec<f64>,
}

/// The pieces an operator is built from.
struct Problem {
    space: Arc<FunctionSpace>,
    form: Arc<BilinearForm>,
    bcs: Vec<DirichletBC>,
}

/// Check that the configuration describes a valid problem without
/// assembling anything. Returns the operator shape.
pub fn validate(config: &AssemblyConfig) -> Result<(usize, usize)> {
    let problem = build_problem(config)?;
    Ok(problem.form.shape())
}

pub fn run(config: &AssemblyConfig) -> Result<Report> {
    let problem = build_problem(config)?;
    let prefix = config.options_prefix.clone().unwrap_or_default();

    let options = AssembleOptions::new()
        .bcs(problem.bcs.clone())
        .mat_type(config.mat_type)
        .options_prefix(prefix.clone())
        .form_compiler_parameters(config.form_compiler_parameters.clone())
        .appctx(config.appctx.clone());
    let mut op = assemble(&problem.form, options)?;
    log::info!("built {:?}", op);

    let (values, nnz) = match op.as_assembled_mut() {
        Some(matrix) => {
            let dense = matrix.values()?;
            let rows: Vec<Vec<f64>> = dense.row_iter().map(|r| r.iter().copied().collect()).collect();
            (Some(rows), Some(matrix.m_unforced().nnz()))
        }
        None => (None, None),
    };

    let solve = match &config.solve {
        Some(solve) => {
            let b = lifted_rhs(&problem, config, &solve.rhs)?;
            let krylov = KrylovConfig::from_options(&config.options, Some(prefix.as_str()))?;
            let (u, info) = cg(op.handle()?, &b, &krylov)?;
            log::info!(
                "solved in {} iterations (residual {:?})",
                info.iterations,
                info.residual_norm
            );
            Some(SolveReport {
                iterations: info.iterations,
                residual_norm: info.residual_norm,
                solution: u.iter().copied().collect(),
            })
        }
        None => None,
    };

    op.force_evaluation()?;
    Ok(Report {
        generated_at: chrono::Utc::now().to_rfc3339(),
        matrix: op.to_string(),
        mat_type: op.mat_type(),
        shape: problem.form.shape(),
        block_shape: op.block_shape(),
        has_bcs: op.has_bcs(),
        bcs: op.bcs().iter().map(|bc| bc.to_string()).collect(),
        values,
        nnz,
        solve,
    })
}

fn build_problem(config: &AssemblyConfig) -> Result<Problem> {
    let mesh = Arc::new(IntervalMesh::new(config.mesh.cells, config.mesh.length)?);
    let space = FunctionSpace::new(mesh, &config.space.family, config.space.degree)?;
    let form = Arc::new(build_form(&space, &config.form)?);
    let bcs = config
        .bcs
        .iter()
        .map(|bc| build_bc(&space, bc))
        .collect::<Result<Vec<_>>>()?;
    Ok(Problem { space, form, bcs })
}

fn build_form(space: &Arc<FunctionSpace>, config: &FormConfig) -> Result<BilinearForm> {
    let mut form = BilinearForm::new(space.clone(), space.clone())?;
    if config.mass != 0.0 {
        form = form.plus(BilinearForm::mass(space.clone()).scaled(config.mass))?;
    }
    if config.stiffness != 0.0 {
        form = form.plus(BilinearForm::laplace(space.clone()).scaled(config.stiffness))?;
    }
    if form.terms().is_empty() {
        return Err(Error::InvalidParameter(
            "form needs a nonzero mass or stiffness coefficient".into(),
        ));
    }
    Ok(form)
}

fn build_bc(space: &Arc<FunctionSpace>, config: &BcConfig) -> Result<DirichletBC> {
    let sub_domain = match config.marker {
        Some(marker) => SubDomain::Marker(marker),
        None => SubDomain::Boundary,
    };
    DirichletBC::new(space.clone(), config.value, sub_domain)
}

/// `b = f - A g` on free dofs and `b = g` on constrained ones, where `g`
/// carries the boundary values.
fn lifted_rhs(problem: &Problem, config: &AssemblyConfig, rhs: &RhsSpec) -> Result<DVector<f64>> {
    let n = problem.space.dim();
    let f = match rhs {
        RhsSpec::Constant(c) => DVector::from_element(n, *c),
        RhsSpec::Values(values) if values.len() == n => DVector::from_column_slice(values),
        RhsSpec::Values(values) => {
            return Err(Error::SizeMismatch(format!(
                "right-hand side has {} entries, the space has {} dofs",
                values.len(),
                n
            )));
        }
    };

    let mut g = DVector::zeros(n);
    for bc in &problem.bcs {
        bc.apply(&mut g);
    }
    let mut b = f - problem.form.action(&g, &config.form_compiler_parameters)?;
    for bc in &problem.bcs {
        bc.apply(&mut b);
    }
    Ok(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use formmat::config::from_json_str;

    fn config(text: &str) -> AssemblyConfig {
        from_json_str(text).unwrap()
    }

    #[test]
    fn report_for_constrained_mass_matrix() {
        let report = run(&config(r#"{"mesh": {"cells": 2}, "bcs": [{"marker": 1}]}"#)).unwrap();

        assert_eq!(report.shape, (3, 3));
        assert_eq!(report.block_shape, (1, 1));
        assert!(report.has_bcs);
        assert_eq!(report.bcs, vec!["DirichletBC(FunctionSpace(CG1), 0, 1)"]);
        assert_eq!(
            report.matrix,
            "assembled Matrix(a=u*v*dx, bcs=[DirichletBC(FunctionSpace(CG1), 0, 1)])"
        );
        let values = report.values.unwrap();
        assert_eq!(values[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(report.nnz, Some(7));
        assert!(chrono::DateTime::parse_from_rfc3339(&report.generated_at).is_ok());
    }

    #[test]
    fn matrix_free_report_has_no_values() {
        let report = run(&config(
            r#"{"mesh": {"cells": 3}, "mat_type": "matfree", "options_prefix": "a_"}"#,
        ))
        .unwrap();
        assert_eq!(report.mat_type, MatType::MatFree);
        assert!(report.values.is_none());
        assert!(!report.has_bcs);
        assert!(report.matrix.starts_with("assembled ImplicitMatrix"));
    }

    #[test]
    fn solve_recovers_linear_profile() {
        for mat_type in ["aij", "matfree"] {
            let text = format!(
                r#"{{
                    "mesh": {{"cells": 4}},
                    "form": {{"mass": 0.0, "stiffness": 1.0}},
                    "bcs": [{{"marker": 1, "value": 0.0}}, {{"marker": 2, "value": 2.0}}],
                    "mat_type": "{}",
                    "options_prefix": "p_",
                    "options": {{"p_ksp_rtol": "1e-12"}},
                    "solve": {{"rhs": 0.0}}
                }}"#,
                mat_type
            );
            let report = run(&config(&text)).unwrap();
            let solution = report.solve.unwrap().solution;
            for (i, u) in solution.iter().enumerate() {
                assert!((u - 0.5 * i as f64).abs() < 1e-8, "{}: {:?}", mat_type, solution);
            }
        }
    }

    #[test]
    fn empty_form_is_rejected() {
        let result = validate(&config(r#"{"mesh": {"cells": 2}, "form": {"mass": 0.0}}"#));
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn rhs_length_is_checked() {
        let result = run(&config(
            r#"{"mesh": {"cells": 2}, "solve": {"rhs": [1.0, 2.0]}}"#,
        ));
        assert!(matches!(result, Err(Error::SizeMismatch(_))));
    }

    #[test]
    fn validate_reports_shape() {
        let shape = validate(&config(r#"{"mesh": {"cells": 3}, "space": {"degree": 2}}"#)).unwrap();
        assert_eq!(shape, (7, 7));
    }
}
