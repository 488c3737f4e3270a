//! Matrix-free operators.
//!
//! An `ImplicitMatrix` never stores values. Its backend handle is a shell
//! matrix whose action is computed by an `ImplicitMatrixContext`, cell by
//! cell, each time the operator is applied.
//!
//! Boundary conditions act on the action as follows:
//!
//! ```text
//! x' = x with column-bc entries zeroed
//! y  = A x'
//! y[row-bc] = x[row-bc]        (identity on constrained rows)
//! ```
//!
//! which matches the assembled operator with its constrained rows and
//! columns replaced by the identity.

use crate::backend::{BackendError, BackendResult, LinearOperator, MatType, ShellContext, ShellMat};
use crate::bcs::{same_set, DirichletBC};
use crate::config::{AppContext, FormCompilerParameters};
use crate::error::{Error, Result};
use crate::form::BilinearForm;
use crate::matrix::{MatrixBase, MatrixLike};
use nalgebra::DVector;
use std::fmt;
use std::sync::Arc;

/// Construction parameters of an `ImplicitMatrix`.
///
/// `options_prefix` and `form_compiler_parameters` are required.
#[derive(Debug, Clone, Default)]
pub struct ImplicitParameters {
    options_prefix: Option<String>,
    form_compiler_parameters: Option<FormCompilerParameters>,
    appctx: AppContext,
}

impl ImplicitParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options_prefix = Some(prefix.into());
        self
    }

    pub fn form_compiler_parameters(mut self, params: FormCompilerParameters) -> Self {
        self.form_compiler_parameters = Some(params);
        self
    }

    /// Opaque user data handed to the callback context.
    pub fn appctx(mut self, appctx: AppContext) -> Self {
        self.appctx = appctx;
        self
    }
}

/// Callback state of a matrix-free operator
#[derive(Debug)]
pub struct ImplicitMatrixContext {
    form: Arc<BilinearForm>,
    row_bcs: Vec<DirichletBC>,
    col_bcs: Vec<DirichletBC>,
    fc_params: FormCompilerParameters,
    appctx: AppContext,
    row_sizes: (usize, usize),
    col_sizes: (usize, usize),
    block_size: usize,
    revision: u64,
}

impl ImplicitMatrixContext {
    pub fn new(
        form: Arc<BilinearForm>,
        row_bcs: Vec<DirichletBC>,
        col_bcs: Vec<DirichletBC>,
        fc_params: FormCompilerParameters,
        appctx: AppContext,
    ) -> Self {
        let (test, trial) = form.arguments();
        let comm = test.comm();
        let row_sizes = (comm.local_size(test.dim()), test.dim());
        let col_sizes = (comm.local_size(trial.dim()), trial.dim());
        let block_size = test.value_size();

        Self {
            form,
            row_bcs,
            col_bcs,
            fc_params,
            appctx,
            row_sizes,
            col_sizes,
            block_size,
            revision: 0,
        }
    }

    pub fn form(&self) -> &Arc<BilinearForm> {
        &self.form
    }

    pub fn row_bcs(&self) -> &[DirichletBC] {
        &self.row_bcs
    }

    pub fn col_bcs(&self) -> &[DirichletBC] {
        &self.col_bcs
    }

    pub fn form_compiler_parameters(&self) -> &FormCompilerParameters {
        &self.fc_params
    }

    pub fn appctx(&self) -> &AppContext {
        &self.appctx
    }

    /// Number of boundary-condition updates since construction.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace row and column conditions of the live operator.
    pub fn update_bcs(&mut self, row_bcs: Vec<DirichletBC>, col_bcs: Vec<DirichletBC>) {
        self.row_bcs = row_bcs;
        self.col_bcs = col_bcs;
        self.revision += 1;
        log::debug!(
            "matrix-free context updated to revision {} ({} row bcs, {} col bcs)",
            self.revision,
            self.row_bcs.len(),
            self.col_bcs.len()
        );
    }

    fn apply(&self, x: &DVector<f64>, transpose: bool) -> Result<DVector<f64>> {
        let (test, trial) = self.form.arguments();
        // Transposed, the test space is the input and the trial space the output.
        let (input, output) = if transpose { (test, trial) } else { (trial, test) };
        let (zeroed, copied) = if transpose {
            (&self.row_bcs, &self.col_bcs)
        } else {
            (&self.col_bcs, &self.row_bcs)
        };
        if x.len() != input.dim() {
            return Err(Error::SizeMismatch(format!(
                "operator expects a vector of length {}, got {}",
                input.dim(),
                x.len()
            )));
        }

        let mut masked = x.clone();
        for bc in zeroed.iter().filter(|bc| bc.is_on(input)) {
            bc.zero(&mut masked);
        }

        let mut y = if transpose {
            self.form.transpose_action(&masked, &self.fc_params)?
        } else {
            self.form.action(&masked, &self.fc_params)?
        };

        let square = Arc::ptr_eq(test, trial);
        for bc in copied.iter().filter(|bc| bc.is_on(output)) {
            if square {
                bc.copy_from(&mut y, x);
            } else {
                bc.zero(&mut y);
            }
        }
        Ok(y)
    }
}

impl ShellContext for ImplicitMatrixContext {
    fn row_sizes(&self) -> (usize, usize) {
        self.row_sizes
    }

    fn col_sizes(&self) -> (usize, usize) {
        self.col_sizes
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn mult(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>> {
        self.apply(x, false)
            .map_err(|e| BackendError::Callback(e.to_string()))
    }

    fn mult_transpose(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>> {
        self.apply(x, true)
            .map_err(|e| BackendError::Callback(e.to_string()))
    }
}

/// A matrix-free operator.
pub struct ImplicitMatrix {
    base: MatrixBase,
    mat: ShellMat<ImplicitMatrixContext>,
}

impl ImplicitMatrix {
    pub fn new<I>(form: Arc<BilinearForm>, bcs: I, params: ImplicitParameters) -> Result<Self>
    where
        I: IntoIterator<Item = DirichletBC>,
    {
        let prefix = params
            .options_prefix
            .ok_or(Error::MissingParameter("options_prefix"))?;
        let fc_params = params
            .form_compiler_parameters
            .ok_or(Error::MissingParameter("form_compiler_parameters"))?;

        let base = MatrixBase::new(form, bcs, MatType::MatFree);
        let context = ImplicitMatrixContext::new(
            base.form().clone(),
            base.bcs().to_vec(),
            base.bcs().to_vec(),
            fc_params,
            params.appctx,
        );

        let mut mat = ShellMat::create(base.comm());
        mat.set_sizes(context.row_sizes(), context.col_sizes(), context.block_size())?;
        mat.set_context(context);
        mat.set_options_prefix(prefix);
        mat.set_up()?;
        mat.assemble()?;

        Ok(Self { base, mat })
    }

    /// Install a new collection of boundary conditions.
    ///
    /// Returns `false` without touching anything when `bcs` holds the same
    /// conditions as the current ones in any order.
    pub fn update_bcs<I>(&mut self, bcs: I) -> Result<bool>
    where
        I: IntoIterator<Item = DirichletBC>,
    {
        let bcs: Vec<DirichletBC> = bcs.into_iter().collect();
        if same_set(&bcs, self.base.bcs()) {
            return Ok(false);
        }

        self.mat
            .context_mut()?
            .update_bcs(bcs.clone(), bcs.clone());
        self.base.set_bcs(bcs);
        Ok(true)
    }

    /// The live callback context.
    pub fn context(&self) -> Result<&ImplicitMatrixContext> {
        Ok(self.mat.context()?)
    }

    pub fn shell(&self) -> &ShellMat<ImplicitMatrixContext> {
        &self.mat
    }
}

impl MatrixLike for ImplicitMatrix {
    fn base(&self) -> &MatrixBase {
        &self.base
    }

    fn force_evaluation(&mut self) -> Result<()> {
        self.mat.assemble()?;
        Ok(())
    }

    fn is_assembled(&self) -> bool {
        self.mat.is_assembled()
    }

    fn handle(&mut self) -> Result<&dyn LinearOperator> {
        self.force_evaluation()?;
        Ok(&self.mat)
    }
}

impl fmt::Display for ImplicitMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.base.fmt_str(f, "ImplicitMatrix", self.is_assembled())
    }
}

impl fmt::Debug for ImplicitMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.base.fmt_repr(f, "ImplicitMatrix")
    }
}
