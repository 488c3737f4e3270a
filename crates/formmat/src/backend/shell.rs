//! Shell matrices: operators defined by a callback context.
//!
//! The lifecycle mirrors an assembled matrix so that solvers can treat both
//! alike: `create`, `set_sizes`, `set_context`, `set_up`, then `assemble`.
//! Assembling a shell matrix stores nothing; it only marks the operator as
//! ready for use.

use super::traits::*;
use crate::comm::Comm;
use nalgebra::DVector;

/// Matrix whose action is computed by a `ShellContext`
#[derive(Debug)]
pub struct ShellMat<C> {
    comm: Comm,
    row_sizes: Option<(usize, usize)>,
    col_sizes: Option<(usize, usize)>,
    block_size: usize,
    context: Option<C>,
    prefix: Option<String>,
    set_up: bool,
    assembly_count: usize,
}

impl<C: ShellContext> ShellMat<C> {
    pub fn create(comm: Comm) -> Self {
        Self {
            comm,
            row_sizes: None,
            col_sizes: None,
            block_size: 1,
            context: None,
            prefix: None,
            set_up: false,
            assembly_count: 0,
        }
    }

    pub fn comm(&self) -> Comm {
        self.comm
    }

    /// Set `(local, global)` row and column sizes and the block size.
    pub fn set_sizes(
        &mut self,
        rows: (usize, usize),
        cols: (usize, usize),
        block_size: usize,
    ) -> BackendResult<()> {
        if block_size == 0 || rows.1 % block_size != 0 || cols.1 % block_size != 0 {
            return Err(BackendError::BlockSize {
                block_size,
                rows: rows.1,
                cols: cols.1,
            });
        }
        if rows.0 > rows.1 {
            return Err(BackendError::SizeMismatch {
                expected: rows.1,
                actual: rows.0,
            });
        }
        if cols.0 > cols.1 {
            return Err(BackendError::SizeMismatch {
                expected: cols.1,
                actual: cols.0,
            });
        }
        self.row_sizes = Some(rows);
        self.col_sizes = Some(cols);
        self.block_size = block_size;
        self.set_up = false;
        Ok(())
    }

    pub fn set_context(&mut self, context: C) {
        self.context = Some(context);
        self.set_up = false;
    }

    pub fn set_options_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = Some(prefix.into());
    }

    /// Check sizes against the context and make the matrix usable.
    pub fn set_up(&mut self) -> BackendResult<()> {
        let rows = self.row_sizes.ok_or(BackendError::MissingSizes)?;
        let cols = self.col_sizes.ok_or(BackendError::MissingSizes)?;
        let context = self.context.as_ref().ok_or(BackendError::MissingContext)?;

        if context.row_sizes() != rows {
            return Err(BackendError::SizeMismatch {
                expected: rows.1,
                actual: context.row_sizes().1,
            });
        }
        if context.col_sizes() != cols {
            return Err(BackendError::SizeMismatch {
                expected: cols.1,
                actual: context.col_sizes().1,
            });
        }
        if context.block_size() != self.block_size {
            return Err(BackendError::BlockSize {
                block_size: context.block_size(),
                rows: rows.1,
                cols: cols.1,
            });
        }

        self.set_up = true;
        Ok(())
    }

    /// Finalise the operator. Collective; stores no values.
    pub fn assemble(&mut self) -> BackendResult<()> {
        if !self.set_up {
            return Err(BackendError::NotSetUp);
        }
        self.assembly_count += 1;
        log::debug!("shell matrix finalised (assembly #{})", self.assembly_count);
        Ok(())
    }

    pub fn is_set_up(&self) -> bool {
        self.set_up
    }

    pub fn is_assembled(&self) -> bool {
        self.set_up && self.assembly_count > 0
    }

    pub fn assembly_count(&self) -> usize {
        self.assembly_count
    }

    pub fn context(&self) -> BackendResult<&C> {
        self.context.as_ref().ok_or(BackendError::MissingContext)
    }

    pub fn context_mut(&mut self) -> BackendResult<&mut C> {
        self.context.as_mut().ok_or(BackendError::MissingContext)
    }

    fn ready_context(&self) -> BackendResult<&C> {
        if !self.is_assembled() {
            return Err(BackendError::NotAssembled);
        }
        self.context()
    }
}

impl<C: ShellContext> LinearOperator for ShellMat<C> {
    fn sizes(&self) -> ((usize, usize), (usize, usize)) {
        (
            self.row_sizes.unwrap_or((0, 0)),
            self.col_sizes.unwrap_or((0, 0)),
        )
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn options_prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn mult(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>> {
        let context = self.ready_context()?;
        let expected = context.col_sizes().1;
        if x.len() != expected {
            return Err(BackendError::SizeMismatch {
                expected,
                actual: x.len(),
            });
        }
        context.mult(x)
    }

    fn mult_transpose(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>> {
        let context = self.ready_context()?;
        let expected = context.row_sizes().1;
        if x.len() != expected {
            return Err(BackendError::SizeMismatch {
                expected,
                actual: x.len(),
            });
        }
        context.mult_transpose(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `y = scale * x` on vectors of length `n`.
    struct Scaling {
        n: usize,
        scale: f64,
    }

    impl ShellContext for Scaling {
        fn row_sizes(&self) -> (usize, usize) {
            (self.n, self.n)
        }

        fn col_sizes(&self) -> (usize, usize) {
            (self.n, self.n)
        }

        fn block_size(&self) -> usize {
            1
        }

        fn mult(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>> {
            Ok(x * self.scale)
        }

        fn mult_transpose(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>> {
            self.mult(x)
        }
    }

    fn ready(n: usize, scale: f64) -> ShellMat<Scaling> {
        let mut mat = ShellMat::create(Comm::world());
        mat.set_sizes((n, n), (n, n), 1).unwrap();
        mat.set_context(Scaling { n, scale });
        mat.set_up().unwrap();
        mat.assemble().unwrap();
        mat
    }

    #[test]
    fn lifecycle_enables_mult() {
        let mat = ready(3, 2.0);
        let y = mat.mult(&DVector::from_vec(vec![1.0, 2.0, 3.0])).unwrap();
        assert_eq!(y.as_slice(), &[2.0, 4.0, 6.0]);
        assert_eq!(mat.global_shape(), (3, 3));
    }

    #[test]
    fn assemble_before_set_up_fails() {
        let mut mat: ShellMat<Scaling> = ShellMat::create(Comm::world());
        assert_eq!(mat.assemble(), Err(BackendError::NotSetUp));
        assert_eq!(mat.set_up(), Err(BackendError::MissingSizes));

        mat.set_sizes((2, 2), (2, 2), 1).unwrap();
        assert_eq!(mat.set_up(), Err(BackendError::MissingContext));
    }

    #[test]
    fn context_sizes_must_match() {
        let mut mat = ShellMat::create(Comm::world());
        mat.set_sizes((4, 4), (4, 4), 1).unwrap();
        mat.set_context(Scaling { n: 3, scale: 1.0 });
        assert!(matches!(
            mat.set_up(),
            Err(BackendError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn mult_before_assembly_fails() {
        let mut mat = ShellMat::create(Comm::world());
        mat.set_sizes((2, 2), (2, 2), 1).unwrap();
        mat.set_context(Scaling { n: 2, scale: 1.0 });
        mat.set_up().unwrap();
        assert_eq!(
            mat.mult(&DVector::zeros(2)),
            Err(BackendError::NotAssembled)
        );
    }

    #[test]
    fn wrong_vector_length_is_rejected() {
        let mat = ready(2, 1.0);
        assert!(matches!(
            mat.mult(&DVector::zeros(3)),
            Err(BackendError::SizeMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn context_can_be_mutated_in_place() {
        let mut mat = ready(2, 1.0);
        mat.context_mut().unwrap().scale = 3.0;
        let y = mat.mult(&DVector::from_vec(vec![1.0, 1.0])).unwrap();
        assert_eq!(y.as_slice(), &[3.0, 3.0]);
        assert!(mat.is_assembled());
    }

    #[test]
    fn block_size_must_divide_sizes() {
        let mut mat: ShellMat<Scaling> = ShellMat::create(Comm::world());
        assert!(mat.set_sizes((3, 3), (3, 3), 2).is_err());
    }
}
