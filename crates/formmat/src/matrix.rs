//! Linear operators of bilinear forms.
//!
//! A matrix object represents "the operator of form `a` with boundary
//! conditions `bcs`". It comes in two variants sharing one `MatrixBase`:
//!
//! - `Matrix`: explicitly assembled into a `SparseMat`;
//! - `ImplicitMatrix`: matrix-free, applied through a callback context.
//!
//! Both are driven through the `MatrixLike` trait. `force_evaluation`
//! brings the backend handle up to date with the form and boundary
//! conditions; `handle` does the same and then hands the handle out.
//!
//! ## Boundary-condition order
//!
//! Conditions are stored in the order they were given. That order is the
//! order of floating-point updates during assembly and therefore has to be
//! identical on every process of the communicator.

use crate::backend::{LinearOperator, MatSpec, MatType, SparseMat};
use crate::bcs::DirichletBC;
use crate::comm::Comm;
use crate::error::{Error, Result};
use crate::form::BilinearForm;
use crate::matrix_free::ImplicitMatrix;
use nalgebra::DMatrix;
use std::fmt;
use std::sync::Arc;

/// State shared by assembled and matrix-free operators
#[derive(Debug, Clone)]
pub struct MatrixBase {
    form: Arc<BilinearForm>,
    bcs: Vec<DirichletBC>,
    has_bcs: bool,
    comm: Comm,
    block_shape: (usize, usize),
    mat_type: MatType,
}

impl MatrixBase {
    /// `bcs` may be empty when no conditions apply.
    pub fn new<I>(form: Arc<BilinearForm>, bcs: I, mat_type: MatType) -> Self
    where
        I: IntoIterator<Item = DirichletBC>,
    {
        let (comm, block_shape) = {
            let (test, trial) = form.arguments();
            (test.comm(), (test.len(), trial.len()))
        };

        let mut base = Self {
            form,
            bcs: Vec::new(),
            has_bcs: false,
            comm,
            block_shape,
            mat_type,
        };
        base.set_bcs(bcs);
        base
    }

    pub fn form(&self) -> &Arc<BilinearForm> {
        &self.form
    }

    /// Boundary conditions in application order.
    pub fn bcs(&self) -> &[DirichletBC] {
        &self.bcs
    }

    pub fn has_bcs(&self) -> bool {
        self.has_bcs
    }

    /// Replace the boundary conditions, keeping their order.
    pub fn set_bcs<I>(&mut self, bcs: I)
    where
        I: IntoIterator<Item = DirichletBC>,
    {
        self.bcs = bcs.into_iter().collect();
        self.has_bcs = !self.bcs.is_empty();
    }

    pub(crate) fn set_form(&mut self, form: Arc<BilinearForm>) {
        self.form = form;
    }

    pub fn comm(&self) -> Comm {
        self.comm
    }

    /// `(test blocks, trial blocks)`
    pub fn block_shape(&self) -> (usize, usize) {
        self.block_shape
    }

    pub fn mat_type(&self) -> MatType {
        self.mat_type
    }

    fn bcs_list(&self) -> String {
        let items: Vec<String> = self.bcs.iter().map(|bc| bc.to_string()).collect();
        format!("[{}]", items.join(", "))
    }

    pub(crate) fn fmt_repr(&self, f: &mut fmt::Formatter<'_>, type_name: &str) -> fmt::Result {
        write!(f, "{}(a={:?}, bcs={})", type_name, self.form, self.bcs_list())
    }

    pub(crate) fn fmt_str(
        &self,
        f: &mut fmt::Formatter<'_>,
        type_name: &str,
        assembled: bool,
    ) -> fmt::Result {
        let pfx = if assembled { "" } else { "un" };
        write!(
            f,
            "{}assembled {}(a={}, bcs={})",
            pfx,
            type_name,
            self.form,
            self.bcs_list()
        )
    }
}

/// Common interface of assembled and matrix-free operators.
pub trait MatrixLike {
    fn base(&self) -> &MatrixBase;

    /// Force any pending writes, so that the backend handle reflects the
    /// current form and boundary conditions.
    ///
    /// Collective over the matrix communicator.
    fn force_evaluation(&mut self) -> Result<()>;

    /// Whether the backend handle has no pending writes.
    fn is_assembled(&self) -> bool;

    /// Flushes pending state, then returns the backend handle.
    fn handle(&mut self) -> Result<&dyn LinearOperator>;

    fn form(&self) -> &Arc<BilinearForm> {
        self.base().form()
    }

    fn bcs(&self) -> &[DirichletBC] {
        self.base().bcs()
    }

    fn has_bcs(&self) -> bool {
        self.base().has_bcs()
    }

    fn comm(&self) -> Comm {
        self.base().comm()
    }

    fn block_shape(&self) -> (usize, usize) {
        self.base().block_shape()
    }

    fn mat_type(&self) -> MatType {
        self.base().mat_type()
    }
}

/// An explicitly assembled operator.
///
/// Acts to the right on coefficient vectors of the trial space and to the
/// left on vectors of the test space.
pub struct Matrix {
    base: MatrixBase,
    mat: SparseMat,
}

impl Matrix {
    pub fn builder(form: Arc<BilinearForm>, mat_type: MatType) -> MatrixBuilder {
        MatrixBuilder {
            form,
            mat_type,
            bcs: Vec::new(),
            options_prefix: None,
            spec: None,
            name: None,
        }
    }

    /// The backend matrix, after forcing evaluation.
    ///
    /// Use `m_unforced` to look at the handle without flushing.
    pub fn m(&mut self) -> Result<&SparseMat> {
        self.force_evaluation()?;
        Ok(&self.mat)
    }

    /// The backend matrix as it is, pending writes included.
    pub fn m_unforced(&self) -> &SparseMat {
        &self.mat
    }

    /// Dense copy of the assembled values; forces evaluation.
    pub fn values(&mut self) -> Result<DMatrix<f64>> {
        Ok(self.m()?.to_dense())
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut MatrixBase, &mut SparseMat) {
        (&mut self.base, &mut self.mat)
    }
}

impl MatrixLike for Matrix {
    fn base(&self) -> &MatrixBase {
        &self.base
    }

    fn force_evaluation(&mut self) -> Result<()> {
        if !self.mat.is_assembled() {
            self.mat.assemble()?;
        }
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

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.base.fmt_str(f, "Matrix", self.is_assembled())
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.base.fmt_repr(f, "Matrix")
    }
}

/// Construction parameters of a `Matrix`.
///
/// `options_prefix` and `sparsity` are required.
pub struct MatrixBuilder {
    form: Arc<BilinearForm>,
    mat_type: MatType,
    bcs: Vec<DirichletBC>,
    options_prefix: Option<String>,
    spec: Option<MatSpec>,
    name: Option<String>,
}

impl MatrixBuilder {
    pub fn bcs<I>(mut self, bcs: I) -> Self
    where
        I: IntoIterator<Item = DirichletBC>,
    {
        self.bcs = bcs.into_iter().collect();
        self
    }

    /// Prefix used when looking up options for the backend matrix.
    pub fn options_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options_prefix = Some(prefix.into());
        self
    }

    /// Nonzero pattern and block layout of the backend matrix.
    pub fn sparsity(mut self, spec: MatSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Matrix> {
        if self.mat_type.is_matrix_free() {
            return Err(Error::InvalidParameter(
                "matrix-free operators are built as ImplicitMatrix".into(),
            ));
        }
        let prefix = self
            .options_prefix
            .ok_or(Error::MissingParameter("options_prefix"))?;
        let spec = self.spec.ok_or(Error::MissingParameter("sparsity"))?;

        let (rows, cols) = self.form.shape();
        if (spec.nrows(), spec.ncols()) != (rows, cols) {
            return Err(Error::SizeMismatch(format!(
                "sparsity is {}x{} but the form is {}x{}",
                spec.nrows(),
                spec.ncols(),
                rows,
                cols
            )));
        }

        let base = MatrixBase::new(self.form, self.bcs, self.mat_type);
        let mut mat = SparseMat::create(base.comm(), spec.with_mat_type(self.mat_type))?;
        mat.set_options_prefix(prefix);
        if let Some(name) = self.name {
            mat.set_name(name);
        }

        Ok(Matrix { base, mat })
    }
}

/// Either operator variant, as produced by `assemble`.
pub enum AnyMatrix {
    Assembled(Matrix),
    Implicit(ImplicitMatrix),
}

impl AnyMatrix {
    pub fn as_assembled(&self) -> Option<&Matrix> {
        match self {
            AnyMatrix::Assembled(m) => Some(m),
            AnyMatrix::Implicit(_) => None,
        }
    }

    pub fn as_assembled_mut(&mut self) -> Option<&mut Matrix> {
        match self {
            AnyMatrix::Assembled(m) => Some(m),
            AnyMatrix::Implicit(_) => None,
        }
    }

    pub fn as_implicit(&self) -> Option<&ImplicitMatrix> {
        match self {
            AnyMatrix::Implicit(m) => Some(m),
            AnyMatrix::Assembled(_) => None,
        }
    }

    pub fn as_implicit_mut(&mut self) -> Option<&mut ImplicitMatrix> {
        match self {
            AnyMatrix::Implicit(m) => Some(m),
            AnyMatrix::Assembled(_) => None,
        }
    }

    pub fn into_assembled(self) -> Option<Matrix> {
        match self {
            AnyMatrix::Assembled(m) => Some(m),
            AnyMatrix::Implicit(_) => None,
        }
    }

    pub fn into_implicit(self) -> Option<ImplicitMatrix> {
        match self {
            AnyMatrix::Implicit(m) => Some(m),
            AnyMatrix::Assembled(_) => None,
        }
    }
}

impl MatrixLike for AnyMatrix {
    fn base(&self) -> &MatrixBase {
        match self {
            AnyMatrix::Assembled(m) => m.base(),
            AnyMatrix::Implicit(m) => m.base(),
        }
    }

    fn force_evaluation(&mut self) -> Result<()> {
        match self {
            AnyMatrix::Assembled(m) => m.force_evaluation(),
            AnyMatrix::Implicit(m) => m.force_evaluation(),
        }
    }

    fn is_assembled(&self) -> bool {
        match self {
            AnyMatrix::Assembled(m) => m.is_assembled(),
            AnyMatrix::Implicit(m) => m.is_assembled(),
        }
    }

    fn handle(&mut self) -> Result<&dyn LinearOperator> {
        match self {
            AnyMatrix::Assembled(m) => m.handle(),
            AnyMatrix::Implicit(m) => m.handle(),
        }
    }
}

impl fmt::Display for AnyMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyMatrix::Assembled(m) => fmt::Display::fmt(m, f),
            AnyMatrix::Implicit(m) => fmt::Display::fmt(m, f),
        }
    }
}

impl fmt::Debug for AnyMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyMatrix::Assembled(m) => fmt::Debug::fmt(m, f),
            AnyMatrix::Implicit(m) => fmt::Debug::fmt(m, f),
        }
    }
}
