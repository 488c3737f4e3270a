//! Linear operators of finite element bilinear forms.
//!
//! A bilinear form together with a set of Dirichlet boundary conditions is
//! turned into an operator that solvers can apply. Operators are either
//! assembled into sparse storage (`Matrix`) or applied matrix-free through a
//! callback context (`ImplicitMatrix`); `assemble` chooses between the two
//! from the requested matrix type.

pub mod assemble;
pub mod backend;
pub mod bcs;
pub mod comm;
pub mod config;
pub mod error;
pub mod form;
pub mod function_space;
pub mod matrix;
pub mod matrix_free;
pub mod mesh;
pub mod quadrature;

pub use assemble::{assemble, assemble_implicit_into, assemble_into, sparsity, AssembleOptions};
pub use backend::{
    cg, BackendError, KrylovConfig, LinearOperator, MatType, OptionsDatabase, SolveInfo,
};
pub use bcs::{DirichletBC, SubDomain};
pub use comm::Comm;
pub use config::{AppContext, FormCompilerParameters};
pub use error::{Error, Result};
pub use form::{BilinearForm, Integrand, Term};
pub use function_space::{FunctionSpace, LagrangeElement};
pub use matrix::{AnyMatrix, Matrix, MatrixBase, MatrixBuilder, MatrixLike};
pub use matrix_free::{ImplicitMatrix, ImplicitMatrixContext, ImplicitParameters};
pub use mesh::{IntervalMesh, LEFT_MARKER, RIGHT_MARKER};
