//! Bilinear forms and their local kernels.
//!
//! A form is a sum of integral terms over the whole mesh. Each term couples
//! one block of the test space with one block of the trial space:
//!
//! - `Mass`:      `c * u * v * dx`
//! - `Stiffness`: `c * inner(grad(u), grad(v)) * dx`
//!
//! Local element tensors are evaluated with Gauss-Legendre quadrature. The
//! per-cell work runs on the rayon pool; contributions are always returned
//! in (term, cell) order so that global sums do not depend on scheduling.

use crate::config::FormCompilerParameters;
use crate::error::{Error, Result};
use crate::function_space::FunctionSpace;
use crate::quadrature::gauss_legendre;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

/// Integrand of a single term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Integrand {
    /// `u * v`
    Mass,
    /// `inner(grad(u), grad(v))`
    Stiffness,
}

impl Integrand {
    /// Polynomial degree of the integrand on an affine cell.
    fn exact_degree(&self, test_degree: usize, trial_degree: usize) -> usize {
        match self {
            Integrand::Mass => test_degree + trial_degree,
            Integrand::Stiffness => (test_degree + trial_degree).saturating_sub(2),
        }
    }
}

/// One integral term of a bilinear form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    pub integrand: Integrand,
    pub coefficient: f64,
    /// Block of the test space
    pub test_block: usize,
    /// Block of the trial space
    pub trial_block: usize,
}

impl Term {
    pub fn new(integrand: Integrand, coefficient: f64, test_block: usize, trial_block: usize) -> Self {
        Self {
            integrand,
            coefficient,
            test_block,
            trial_block,
        }
    }
}

/// Element tensor together with its global row and column dofs.
#[derive(Debug, Clone)]
pub struct ElementTensor {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub values: DMatrix<f64>,
}

/// A bilinear form `a(u, v)`
#[derive(Clone)]
pub struct BilinearForm {
    test: Arc<FunctionSpace>,
    trial: Arc<FunctionSpace>,
    terms: Vec<Term>,
}

impl BilinearForm {
    /// Empty form between two spaces on the same mesh.
    pub fn new(test: Arc<FunctionSpace>, trial: Arc<FunctionSpace>) -> Result<Self> {
        if test.mesh() != trial.mesh() {
            return Err(Error::InvalidParameter(
                "test and trial spaces must live on the same mesh".into(),
            ));
        }
        Ok(Self {
            test,
            trial,
            terms: Vec::new(),
        })
    }

    /// `u * v * dx` on every block of `space`.
    pub fn mass(space: Arc<FunctionSpace>) -> Self {
        Self::diagonal(space, Integrand::Mass)
    }

    /// `inner(grad(u), grad(v)) * dx` on every block of `space`.
    pub fn laplace(space: Arc<FunctionSpace>) -> Self {
        Self::diagonal(space, Integrand::Stiffness)
    }

    fn diagonal(space: Arc<FunctionSpace>, integrand: Integrand) -> Self {
        let terms = (0..space.len())
            .map(|block| Term::new(integrand, 1.0, block, block))
            .collect();
        Self {
            test: space.clone(),
            trial: space,
            terms,
        }
    }

    /// Append a term.
    pub fn with_term(mut self, term: Term) -> Result<Self> {
        if term.test_block >= self.test.len() || term.trial_block >= self.trial.len() {
            return Err(Error::InvalidParameter(format!(
                "term couples blocks ({}, {}) but the form has block shape ({}, {})",
                term.test_block,
                term.trial_block,
                self.test.len(),
                self.trial.len()
            )));
        }
        self.terms.push(term);
        Ok(self)
    }

    /// Sum of two forms with the same arguments.
    pub fn plus(mut self, other: BilinearForm) -> Result<Self> {
        if self.test != other.test || self.trial != other.trial {
            return Err(Error::InvalidParameter(
                "cannot add forms with different arguments".into(),
            ));
        }
        self.terms.extend(other.terms);
        Ok(self)
    }

    /// Multiply every term by `factor`.
    pub fn scaled(mut self, factor: f64) -> Self {
        for term in &mut self.terms {
            term.coefficient *= factor;
        }
        self
    }

    /// Test and trial function spaces.
    pub fn arguments(&self) -> (&Arc<FunctionSpace>, &Arc<FunctionSpace>) {
        (&self.test, &self.trial)
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Global operator shape `(test dim, trial dim)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.test.dim(), self.trial.dim())
    }

    /// Element tensor of one term on one cell.
    pub fn local_tensor(
        &self,
        term: &Term,
        cell: usize,
        params: &FormCompilerParameters,
    ) -> Result<DMatrix<f64>> {
        let test_element = self.test.element(term.test_block);
        let trial_element = self.trial.element(term.trial_block);
        let degree = params.quadrature_degree.unwrap_or_else(|| {
            term.integrand
                .exact_degree(test_element.degree(), trial_element.degree())
        });
        let rule = gauss_legendre(degree)?;
        let h = self.test.mesh().cell_size(cell);

        let mut tensor = DMatrix::zeros(
            test_element.num_local_dofs(),
            trial_element.num_local_dofs(),
        );
        for (xi, weight) in rule {
            let (v, dv) = test_element.tabulate(xi);
            let (u, du) = trial_element.tabulate(xi);
            for i in 0..v.len() {
                for j in 0..u.len() {
                    tensor[(i, j)] += match term.integrand {
                        Integrand::Mass => weight * v[i] * u[j] * h,
                        Integrand::Stiffness => weight * dv[i] * du[j] / h,
                    };
                }
            }
        }

        Ok(tensor * term.coefficient)
    }

    /// All element tensors in (term, cell) order.
    pub fn element_tensors(&self, params: &FormCompilerParameters) -> Result<Vec<ElementTensor>> {
        let num_cells = self.test.mesh().num_cells();
        let work: Vec<(usize, usize)> = (0..self.terms.len())
            .flat_map(|t| (0..num_cells).map(move |cell| (t, cell)))
            .collect();

        log::trace!("evaluating {} element tensors", work.len());

        work.par_iter()
            .map(|&(t, cell)| -> Result<ElementTensor> {
                let term = &self.terms[t];
                Ok(ElementTensor {
                    rows: self.test.cell_dofs(term.test_block, cell),
                    cols: self.trial.cell_dofs(term.trial_block, cell),
                    values: self.local_tensor(term, cell, params)?,
                })
            })
            .collect::<Result<Vec<_>>>()
    }

    /// `A x` evaluated cell by cell, without forming `A`.
    pub fn action(&self, x: &DVector<f64>, params: &FormCompilerParameters) -> Result<DVector<f64>> {
        if x.len() != self.trial.dim() {
            return Err(Error::SizeMismatch(format!(
                "action expects a vector of length {}, got {}",
                self.trial.dim(),
                x.len()
            )));
        }

        let tensors = self.element_tensors(params)?;
        let products: Vec<DVector<f64>> = tensors
            .par_iter()
            .map(|t| {
                let local = DVector::from_iterator(t.cols.len(), t.cols.iter().map(|&c| x[c]));
                &t.values * local
            })
            .collect();

        let mut y = DVector::zeros(self.test.dim());
        for (t, local) in tensors.iter().zip(products) {
            for (k, &row) in t.rows.iter().enumerate() {
                y[row] += local[k];
            }
        }
        Ok(y)
    }

    /// `A^T x` evaluated cell by cell.
    pub fn transpose_action(
        &self,
        x: &DVector<f64>,
        params: &FormCompilerParameters,
    ) -> Result<DVector<f64>> {
        if x.len() != self.test.dim() {
            return Err(Error::SizeMismatch(format!(
                "transpose action expects a vector of length {}, got {}",
                self.test.dim(),
                x.len()
            )));
        }

        let tensors = self.element_tensors(params)?;
        let products: Vec<DVector<f64>> = tensors
            .par_iter()
            .map(|t| {
                let local = DVector::from_iterator(t.rows.len(), t.rows.iter().map(|&r| x[r]));
                t.values.tr_mul(&local)
            })
            .collect();

        let mut y = DVector::zeros(self.trial.dim());
        for (t, local) in tensors.iter().zip(products) {
            for (k, &col) in t.cols.iter().enumerate() {
                y[col] += local[k];
            }
        }
        Ok(y)
    }
}

impl fmt::Display for BilinearForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }

        let mixed = self.test.is_mixed() || self.trial.is_mixed();
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|term| {
                let (u, v) = if mixed {
                    (
                        format!("u[{}]", term.trial_block),
                        format!("v[{}]", term.test_block),
                    )
                } else {
                    ("u".to_string(), "v".to_string())
                };
                let scale = if term.coefficient == 1.0 {
                    String::new()
                } else {
                    format!("{}*", term.coefficient)
                };
                match term.integrand {
                    Integrand::Mass => format!("{}{}*{}*dx", scale, u, v),
                    Integrand::Stiffness => {
                        format!("{}inner(grad({}), grad({}))*dx", scale, u, v)
                    }
                }
            })
            .collect();
        write!(f, "{}", parts.join(" + "))
    }
}

impl fmt::Debug for BilinearForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BilinearForm({})", self)
    }
}
