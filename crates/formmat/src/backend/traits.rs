//! Backend trait definitions and shared types.
//!
//! These traits describe what the solver layer needs from a matrix handle,
//! independently of whether the entries are stored or produced by a
//! callback.

use nalgebra::DVector;
use thiserror::Error;

/// Errors raised by the sparse backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("index ({row}, {col}) out of range for a {nrows}x{ncols} matrix")]
    OutOfRange {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },

    #[error("entry ({row}, {col}) is outside the preallocated nonzero pattern")]
    NewNonzero { row: usize, col: usize },

    #[error("block size {block_size} is incompatible with sizes {rows}x{cols}")]
    BlockSize {
        block_size: usize,
        rows: usize,
        cols: usize,
    },

    #[error("invalid sparsity pattern: {0}")]
    Pattern(String),

    #[error("matrix sizes have not been set")]
    MissingSizes,

    #[error("shell matrix has no context")]
    MissingContext,

    #[error("matrix has not been set up")]
    NotSetUp,

    #[error("matrix has unflushed values; assemble it first")]
    NotAssembled,

    #[error("unknown matrix type {0:?}")]
    UnknownMatType(String),

    #[error("invalid value {value:?} for option {option}")]
    InvalidOption { option: String, value: String },

    #[error("operator callback failed: {0}")]
    Callback(String),

    #[error("Krylov solver failed: {0}")]
    Diverged(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// How `set_values` combines new entries with stored ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    Insert,
    Add,
}

/// Sparse matrix in COO (coordinate/triplet) format.
///
/// Interchange format for inspecting assembled storage.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseTripletsF64 {
    pub nrows: usize,
    pub ncols: usize,
    pub row_indices: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseTripletsF64 {
    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }
}

/// Solver convergence and diagnostic info.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveInfo {
    /// Number of iterations
    pub iterations: usize,
    /// Final residual norm (if available)
    pub residual_norm: Option<f64>,
    /// Human-readable solver name (e.g., "cg")
    pub solver_name: String,
}

/// Anything the solver layer can apply: stored or matrix-free.
pub trait LinearOperator {
    /// `((local rows, global rows), (local cols, global cols))`
    fn sizes(&self) -> ((usize, usize), (usize, usize));

    fn block_size(&self) -> usize;

    fn options_prefix(&self) -> Option<&str>;

    /// `y = A x`
    fn mult(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>>;

    /// `y = A^T x`
    fn mult_transpose(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>>;

    fn global_shape(&self) -> (usize, usize) {
        let ((_, rows), (_, cols)) = self.sizes();
        (rows, cols)
    }
}

/// Callback context behind a shell matrix.
pub trait ShellContext: Send + Sync {
    /// `(local, global)` row sizes
    fn row_sizes(&self) -> (usize, usize);

    /// `(local, global)` column sizes
    fn col_sizes(&self) -> (usize, usize);

    fn block_size(&self) -> usize;

    fn mult(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>>;

    fn mult_transpose(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>>;
}
