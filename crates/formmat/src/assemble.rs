//! Assembly of bilinear forms into operators.
//!
//! `assemble` picks the operator variant from the requested `MatType`:
//! `matfree` yields an `ImplicitMatrix`, every other type an assembled
//! `Matrix`. Assembled values are cached in the backend and only flushed
//! when the matrix is first used, see `MatrixLike::force_evaluation`.
//!
//! Boundary conditions are imposed on assembled matrices by dropping the
//! element contributions of constrained rows and columns and putting a unit
//! diagonal on the constrained dofs.

use crate::backend::{InsertMode, MatSpec, MatType, SparseMat, SparsityBuilder};
use crate::bcs::DirichletBC;
use crate::config::{AppContext, FormCompilerParameters};
use crate::error::{Error, Result};
use crate::form::BilinearForm;
use crate::matrix::{AnyMatrix, Matrix, MatrixLike};
use crate::matrix_free::{ImplicitMatrix, ImplicitParameters};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Options of `assemble`
#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    pub bcs: Vec<DirichletBC>,
    pub mat_type: MatType,
    pub options_prefix: Option<String>,
    pub form_compiler_parameters: FormCompilerParameters,
    pub appctx: AppContext,
}

impl AssembleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bcs<I>(mut self, bcs: I) -> Self
    where
        I: IntoIterator<Item = DirichletBC>,
    {
        self.bcs = bcs.into_iter().collect();
        self
    }

    pub fn mat_type(mut self, mat_type: MatType) -> Self {
        self.mat_type = mat_type;
        self
    }

    pub fn options_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options_prefix = Some(prefix.into());
        self
    }

    pub fn form_compiler_parameters(mut self, params: FormCompilerParameters) -> Self {
        self.form_compiler_parameters = params;
        self
    }

    pub fn appctx(mut self, appctx: AppContext) -> Self {
        self.appctx = appctx;
        self
    }
}

/// Assemble `form` into a new operator.
pub fn assemble(form: &Arc<BilinearForm>, options: AssembleOptions) -> Result<AnyMatrix> {
    let prefix = options.options_prefix.unwrap_or_default();

    if options.mat_type.is_matrix_free() {
        let params = ImplicitParameters::new()
            .options_prefix(prefix)
            .form_compiler_parameters(options.form_compiler_parameters)
            .appctx(options.appctx);
        let matrix = ImplicitMatrix::new(form.clone(), options.bcs, params)?;
        log::debug!("created {}", matrix);
        return Ok(AnyMatrix::Implicit(matrix));
    }

    let spec = sparsity(form, options.mat_type)?;
    let mut matrix = Matrix::builder(form.clone(), options.mat_type)
        .bcs(options.bcs)
        .options_prefix(prefix)
        .sparsity(spec)
        .build()?;
    let (base, mat) = matrix.parts_mut();
    fill(mat, base.form(), base.bcs(), &options.form_compiler_parameters)?;
    Ok(AnyMatrix::Assembled(matrix))
}

/// Reassemble `form` into an existing matrix with a new set of conditions.
///
/// The matrix keeps its pattern; `form` must have the matrix's shape and
/// may not touch entries outside the pattern. On error the matrix is left
/// as it was.
pub fn assemble_into<I>(
    form: &Arc<BilinearForm>,
    tensor: &mut Matrix,
    bcs: I,
    params: &FormCompilerParameters,
) -> Result<()>
where
    I: IntoIterator<Item = DirichletBC>,
{
    let shape = form.shape();
    let mat = tensor.m_unforced();
    if (mat.nrows(), mat.ncols()) != shape {
        return Err(Error::SizeMismatch(format!(
            "cannot assemble a {}x{} form into a {}x{} matrix",
            shape.0,
            shape.1,
            mat.nrows(),
            mat.ncols()
        )));
    }

    let bcs: Vec<DirichletBC> = bcs.into_iter().collect();
    let (base, mat) = tensor.parts_mut();
    fill(mat, form, &bcs, params)?;
    base.set_form(form.clone());
    base.set_bcs(bcs);
    Ok(())
}

/// Install new conditions on a matrix-free operator.
///
/// Returns whether anything changed; see `ImplicitMatrix::update_bcs`.
pub fn assemble_implicit_into<I>(tensor: &mut ImplicitMatrix, bcs: I) -> Result<bool>
where
    I: IntoIterator<Item = DirichletBC>,
{
    let changed = tensor.update_bcs(bcs)?;
    tensor.force_evaluation()?;
    Ok(changed)
}

/// Nonzero pattern and block layout of the matrix of `form`.
///
/// Square operators on a single space also reserve their diagonal so that
/// boundary rows can hold a unit entry.
pub fn sparsity(form: &BilinearForm, mat_type: MatType) -> Result<MatSpec> {
    let (test, trial) = form.arguments();
    let mut builder = SparsityBuilder::new(test.dim(), trial.dim());

    let num_cells = test.mesh().num_cells();
    for term in form.terms() {
        for cell in 0..num_cells {
            builder.insert_block(
                &test.cell_dofs(term.test_block, cell),
                &trial.cell_dofs(term.trial_block, cell),
            )?;
        }
    }
    if Arc::ptr_eq(test, trial) {
        builder.insert_diagonal(0..test.dim())?;
    }

    let block_size = match mat_type {
        MatType::Baij => test.value_size(),
        _ => 1,
    };

    Ok(MatSpec::new(builder.build()?)
        .with_mat_type(mat_type)
        .with_block_size(block_size)
        .with_blocks(test.block_offsets().to_vec(), trial.block_offsets().to_vec()))
}

/// Cache the element contributions of `form` under `bcs`, leaving them
/// unflushed. Every write is located before the old values are dropped, so
/// a rejected form leaves `mat` untouched.
fn fill(
    mat: &mut SparseMat,
    form: &BilinearForm,
    bcs: &[DirichletBC],
    params: &FormCompilerParameters,
) -> Result<()> {
    let (test, trial) = form.arguments();

    let fixed_rows: BTreeSet<usize> = bcs
        .iter()
        .filter(|bc| bc.is_on(test))
        .flat_map(|bc| bc.nodes().iter().copied())
        .collect();
    let fixed_cols: BTreeSet<usize> = bcs
        .iter()
        .filter(|bc| bc.is_on(trial))
        .flat_map(|bc| bc.nodes().iter().copied())
        .collect();

    let tensors = form.element_tensors(params)?;
    let masked: Vec<(Vec<Option<usize>>, Vec<Option<usize>>)> = tensors
        .iter()
        .map(|t| {
            let rows = t
                .rows
                .iter()
                .map(|&r| (!fixed_rows.contains(&r)).then_some(r))
                .collect();
            let cols = t
                .cols
                .iter()
                .map(|&c| (!fixed_cols.contains(&c)).then_some(c))
                .collect();
            (rows, cols)
        })
        .collect();
    let diagonal: Vec<usize> = if Arc::ptr_eq(test, trial) {
        fixed_rows.intersection(&fixed_cols).copied().collect()
    } else {
        Vec::new()
    };

    for (rows, cols) in &masked {
        mat.locate_values(rows, cols)?;
    }
    for &n in &diagonal {
        mat.locate_values(&[Some(n)], &[Some(n)])?;
    }

    mat.zero_entries();
    for (t, (rows, cols)) in tensors.iter().zip(&masked) {
        mat.set_values(rows, cols, &t.values, InsertMode::Add)?;
    }
    for &n in &diagonal {
        mat.set_value(n, n, 1.0, InsertMode::Insert)?;
    }

    log::debug!(
        "cached {} element tensors of {} with {} constrained dofs ({} pending writes)",
        tensors.len(),
        form,
        fixed_rows.len(),
        mat.pending()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::bcs::SubDomain;
    use crate::function_space::FunctionSpace;
    use crate::mesh::{IntervalMesh, LEFT_MARKER, RIGHT_MARKER};
    use nalgebra::DVector;

    fn p1(cells: usize) -> Arc<FunctionSpace> {
        let mesh = Arc::new(IntervalMesh::unit(cells).unwrap());
        FunctionSpace::new(mesh, "CG", 1).unwrap()
    }

    fn bc(v: &Arc<FunctionSpace>, marker: u32) -> DirichletBC {
        DirichletBC::new(v.clone(), 0.0, SubDomain::Marker(marker)).unwrap()
    }

    #[test]
    fn sparsity_of_p1_mass_is_tridiagonal() {
        let form = BilinearForm::mass(p1(3));
        let spec = sparsity(&form, MatType::Aij).unwrap();
        assert_eq!((spec.nrows(), spec.ncols()), (4, 4));
        assert_eq!(spec.pattern.nnz(), 10);
    }

    #[test]
    fn values_stay_pending_until_forced() {
        let form = Arc::new(BilinearForm::mass(p1(2)));
        let mut matrix = assemble(&form, AssembleOptions::new())
            .unwrap()
            .into_assembled()
            .unwrap();

        assert!(!matrix.is_assembled());
        assert!(matrix.to_string().starts_with("unassembled Matrix"));
        assert_eq!(matrix.m_unforced().assembly_count(), 0);

        matrix.force_evaluation().unwrap();
        assert!(matrix.is_assembled());
        assert!(matrix.to_string().starts_with("assembled Matrix"));
        assert_eq!(matrix.m_unforced().assembly_count(), 1);

        // Forcing again does not flush twice.
        matrix.force_evaluation().unwrap();
        assert_eq!(matrix.m_unforced().assembly_count(), 1);
    }

    #[test]
    fn p1_mass_values() {
        // h = 1/2: element mass matrix h/6 [2 1; 1 2]
        let form = Arc::new(BilinearForm::mass(p1(2)));
        let mut matrix = assemble(&form, AssembleOptions::new())
            .unwrap()
            .into_assembled()
            .unwrap();
        let m = matrix.values().unwrap();

        assert!((m[(0, 0)] - 1.0 / 6.0).abs() < 1e-12);
        assert!((m[(1, 1)] - 1.0 / 3.0).abs() < 1e-12);
        assert!((m[(0, 1)] - 1.0 / 12.0).abs() < 1e-12);
        assert_eq!(m[(0, 2)], 0.0);
    }

    #[test]
    fn bcs_give_identity_rows_and_columns() {
        let v = p1(2);
        let form = Arc::new(BilinearForm::mass(v.clone()));
        let options = AssembleOptions::new().bcs(vec![bc(&v, LEFT_MARKER)]);
        let mut matrix = assemble(&form, options).unwrap().into_assembled().unwrap();
        let m = matrix.values().unwrap();

        assert_eq!(m[(0, 0)], 1.0);
        assert_eq!(m[(0, 1)], 0.0);
        assert_eq!(m[(1, 0)], 0.0);
        assert!((m[(1, 1)] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn matfree_type_builds_implicit_matrix() {
        let v = p1(2);
        let form = Arc::new(BilinearForm::mass(v.clone()));
        let options = AssembleOptions::new()
            .mat_type(MatType::MatFree)
            .options_prefix("mf_")
            .bcs(vec![bc(&v, RIGHT_MARKER)]);
        let matrix = assemble(&form, options).unwrap();

        let implicit = matrix.as_implicit().unwrap();
        assert!(implicit.has_bcs());
        assert_eq!(implicit.mat_type(), MatType::MatFree);
        assert!(matrix.as_assembled().is_none());
    }

    #[test]
    fn reassembly_replaces_bcs() {
        let v = p1(2);
        let form = Arc::new(BilinearForm::mass(v.clone()));
        let mut matrix = assemble(&form, AssembleOptions::new())
            .unwrap()
            .into_assembled()
            .unwrap();
        let free = matrix.values().unwrap();

        assemble_into(
            &form,
            &mut matrix,
            vec![bc(&v, RIGHT_MARKER)],
            &FormCompilerParameters::default(),
        )
        .unwrap();
        assert!(matrix.has_bcs());
        assert!(!matrix.is_assembled());
        let constrained = matrix.values().unwrap();
        assert_ne!(free, constrained);
        assert_eq!(constrained[(2, 2)], 1.0);
        assert_eq!(constrained[(1, 2)], 0.0);

        assemble_into(&form, &mut matrix, Vec::new(), &FormCompilerParameters::default())
            .unwrap();
        assert!(!matrix.has_bcs());
        assert_eq!(matrix.values().unwrap(), free);
    }

    #[test]
    fn reassembly_rejects_other_shapes() {
        let form = Arc::new(BilinearForm::mass(p1(2)));
        let mut matrix = assemble(&form, AssembleOptions::new())
            .unwrap()
            .into_assembled()
            .unwrap();
        let other = Arc::new(BilinearForm::mass(p1(4)));
        let result = assemble_into(
            &other,
            &mut matrix,
            Vec::new(),
            &FormCompilerParameters::default(),
        );
        assert!(matches!(result, Err(Error::SizeMismatch(_))));
        assert!(Arc::ptr_eq(matrix.form(), &form));
    }

    #[test]
    fn reassembly_outside_pattern_keeps_matrix() {
        // Both 3x3, but the P2 cell couples dofs 0 and 2.
        let v = p1(2);
        let form = Arc::new(BilinearForm::mass(v.clone()));
        let mut matrix = assemble(&form, AssembleOptions::new().bcs(vec![bc(&v, LEFT_MARKER)]))
            .unwrap()
            .into_assembled()
            .unwrap();
        let before = matrix.values().unwrap();

        let mesh = Arc::new(IntervalMesh::unit(1).unwrap());
        let p2 = FunctionSpace::new(mesh, "CG", 2).unwrap();
        let other = Arc::new(BilinearForm::mass(p2));
        let result = assemble_into(
            &other,
            &mut matrix,
            Vec::new(),
            &FormCompilerParameters::default(),
        );

        assert!(matches!(
            result,
            Err(Error::Backend(BackendError::NewNonzero { .. }))
        ));
        assert!(Arc::ptr_eq(matrix.form(), &form));
        assert!(matrix.has_bcs());
        assert_eq!(matrix.m_unforced().pending(), 0);
        assert_eq!(matrix.values().unwrap(), before);
    }

    #[test]
    fn implicit_reassembly_reports_changes() {
        let v = p1(3);
        let form = Arc::new(BilinearForm::laplace(v.clone()));
        let options = AssembleOptions::new()
            .mat_type(MatType::MatFree)
            .bcs(vec![bc(&v, LEFT_MARKER), bc(&v, RIGHT_MARKER)]);
        let mut matrix = assemble(&form, options).unwrap().into_implicit().unwrap();

        let reordered = vec![bc(&v, RIGHT_MARKER), bc(&v, LEFT_MARKER)];
        assert!(!assemble_implicit_into(&mut matrix, reordered).unwrap());
        assert!(assemble_implicit_into(&mut matrix, vec![bc(&v, LEFT_MARKER)]).unwrap());
        assert_eq!(matrix.bcs().len(), 1);
    }

    #[test]
    fn assembled_and_matrix_free_actions_agree() {
        let v = p1(5);
        let form = Arc::new(
            BilinearForm::laplace(v.clone())
                .plus(BilinearForm::mass(v.clone()).scaled(2.0))
                .unwrap(),
        );
        let bcs = vec![bc(&v, LEFT_MARKER)];
        let x = DVector::from_fn(6, |i, _| (i as f64 + 1.0).sin());

        let mut assembled = assemble(&form, AssembleOptions::new().bcs(bcs.clone())).unwrap();
        let mut implicit = assemble(
            &form,
            AssembleOptions::new().bcs(bcs).mat_type(MatType::MatFree),
        )
        .unwrap();

        let y = assembled.handle().unwrap().mult(&x).unwrap();
        let z = implicit.handle().unwrap().mult(&x).unwrap();
        assert!((y - z).norm() < 1e-12);
    }
}
