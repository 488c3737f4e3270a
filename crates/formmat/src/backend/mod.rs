//! Sparse linear-algebra backend.
//!
//! The matrix layer never touches storage directly: it drives backend
//! objects through the same create / set-up / assemble lifecycle a
//! distributed linear-algebra library exposes, and hands the resulting
//! handle to solvers unchanged.
//!
//! # Handles
//!
//! - **SparseMat**: assembled CSR storage over a preallocated pattern
//!   (`aij`, `baij`, `nest` tags), with cached writes flushed by `assemble`.
//! - **ShellMat**: operator defined by a `ShellContext` callback, no storage.
//!
//! # Architecture
//!
//! ```text
//! Matrix / ImplicitMatrix
//!         │
//!         ▼
//!   LinearOperator trait
//!    ┌────┴────┐
//!    ▼         ▼
//! SparseMat  ShellMat<C>
//!    │         │
//!    └────┬────┘
//!         ▼
//!   Krylov solvers
//! ```

pub mod krylov;
pub mod options;
pub mod shell;
pub mod sparse;
pub mod sparsity;
pub mod traits;

pub use krylov::{cg, KrylovConfig};
pub use options::{MatType, OptionsDatabase};
pub use shell::ShellMat;
pub use sparse::SparseMat;
pub use sparsity::{MatSpec, SparsityBuilder};
pub use traits::*;
