//! Assembled sparse matrices.
//!
//! `SparseMat` stores its entries in CSR format over a pattern fixed at
//! creation. Writes go through `set_values` and are cached; they become
//! visible to readers only after `assemble` flushes the cache. Reading
//! operations that need consistent values (`mult`) refuse to run on a
//! matrix with pending writes.
//!
//! Rows or columns passed as `None` are skipped, which lets an assembler
//! drop the contributions of constrained dofs without rewriting element
//! tensors.

use super::options::MatType;
use super::sparsity::MatSpec;
use super::traits::*;
use crate::comm::Comm;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

#[derive(Debug, Clone, Copy)]
struct PendingValue {
    /// Position in the CSR value array
    index: usize,
    value: f64,
    mode: InsertMode,
}

/// Assembled sparse matrix
#[derive(Debug, Clone)]
pub struct SparseMat {
    comm: Comm,
    mat_type: MatType,
    block_size: usize,
    row_blocks: Vec<usize>,
    col_blocks: Vec<usize>,
    csr: CsrMatrix<f64>,
    pending: Vec<PendingValue>,
    prefix: Option<String>,
    name: Option<String>,
    assembly_count: usize,
}

impl SparseMat {
    /// Create a zero matrix over the pattern in `spec`.
    pub fn create(comm: Comm, spec: MatSpec) -> BackendResult<Self> {
        let (nrows, ncols) = (spec.nrows(), spec.ncols());
        let bs = spec.block_size;
        if bs == 0 || nrows % bs != 0 || ncols % bs != 0 {
            return Err(BackendError::BlockSize {
                block_size: bs,
                rows: nrows,
                cols: ncols,
            });
        }
        check_block_offsets(&spec.row_blocks, nrows)?;
        check_block_offsets(&spec.col_blocks, ncols)?;

        let nnz = spec.pattern.nnz();
        let csr = CsrMatrix::try_from_pattern_and_values(spec.pattern, vec![0.0; nnz])
            .map_err(|e| BackendError::Pattern(format!("{:?}", e)))?;

        log::debug!(
            "created {} matrix {}x{} with {} preallocated entries",
            spec.mat_type,
            nrows,
            ncols,
            nnz
        );

        Ok(Self {
            comm,
            mat_type: spec.mat_type,
            block_size: bs,
            row_blocks: spec.row_blocks,
            col_blocks: spec.col_blocks,
            csr,
            pending: Vec::new(),
            prefix: None,
            name: None,
            assembly_count: 0,
        })
    }

    pub fn comm(&self) -> Comm {
        self.comm
    }

    pub fn mat_type(&self) -> MatType {
        self.mat_type
    }

    pub fn nrows(&self) -> usize {
        self.csr.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.csr.ncols()
    }

    /// Number of preallocated entries.
    pub fn nnz(&self) -> usize {
        self.csr.nnz()
    }

    pub fn set_options_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = Some(prefix.into());
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of block rows and block columns.
    pub fn block_shape(&self) -> (usize, usize) {
        (self.row_blocks.len() - 1, self.col_blocks.len() - 1)
    }

    /// Cached writes not yet flushed.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_assembled(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of completed flushes.
    pub fn assembly_count(&self) -> usize {
        self.assembly_count
    }

    fn entry_index(&self, row: usize, col: usize) -> Option<usize> {
        let offsets = self.csr.row_offsets();
        let (start, end) = (offsets[row], offsets[row + 1]);
        self.csr.col_indices()[start..end]
            .binary_search(&col)
            .ok()
            .map(|k| start + k)
    }

    /// Storage positions of the unmasked entries of a block, in row-major
    /// order. Fails if any entry lies outside the matrix or its pattern.
    pub fn locate_values(
        &self,
        rows: &[Option<usize>],
        cols: &[Option<usize>],
    ) -> BackendResult<Vec<(usize, usize, usize)>> {
        let mut located = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let Some(row) = *row else { continue };
            for (j, col) in cols.iter().enumerate() {
                let Some(col) = *col else { continue };
                if row >= self.nrows() || col >= self.ncols() {
                    return Err(BackendError::OutOfRange {
                        row,
                        col,
                        nrows: self.nrows(),
                        ncols: self.ncols(),
                    });
                }
                let index = self
                    .entry_index(row, col)
                    .ok_or(BackendError::NewNonzero { row, col })?;
                located.push((i, j, index));
            }
        }
        Ok(located)
    }

    /// Cache a dense block of values.
    ///
    /// Nothing is cached if any entry of the block is rejected.
    pub fn set_values(
        &mut self,
        rows: &[Option<usize>],
        cols: &[Option<usize>],
        block: &DMatrix<f64>,
        mode: InsertMode,
    ) -> BackendResult<()> {
        if block.nrows() != rows.len() {
            return Err(BackendError::SizeMismatch {
                expected: rows.len(),
                actual: block.nrows(),
            });
        }
        if block.ncols() != cols.len() {
            return Err(BackendError::SizeMismatch {
                expected: cols.len(),
                actual: block.ncols(),
            });
        }

        for (i, j, index) in self.locate_values(rows, cols)? {
            self.pending.push(PendingValue {
                index,
                value: block[(i, j)],
                mode,
            });
        }
        Ok(())
    }

    /// Cache a single value.
    pub fn set_value(&mut self, row: usize, col: usize, value: f64, mode: InsertMode) -> BackendResult<()> {
        self.set_values(
            &[Some(row)],
            &[Some(col)],
            &DMatrix::from_element(1, 1, value),
            mode,
        )
    }

    /// Flush cached writes, in the order they were made.
    ///
    /// Collective over the matrix communicator.
    pub fn assemble(&mut self) -> BackendResult<()> {
        let flushed = self.pending.len();
        let values = self.csr.values_mut();
        for p in self.pending.drain(..) {
            match p.mode {
                InsertMode::Add => values[p.index] += p.value,
                InsertMode::Insert => values[p.index] = p.value,
            }
        }
        self.assembly_count += 1;

        log::info!(
            "assembled {} ({} values flushed, assembly #{})",
            self.name.as_deref().unwrap_or("matrix"),
            flushed,
            self.assembly_count
        );
        Ok(())
    }

    /// Drop cached writes and zero stored values; the pattern is kept.
    pub fn zero_entries(&mut self) {
        self.pending.clear();
        self.csr.values_mut().fill(0.0);
    }

    /// Stored value, zero outside the pattern.
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.entry_index(row, col)
            .map(|k| self.csr.values()[k])
            .unwrap_or(0.0)
    }

    pub fn csr(&self) -> &CsrMatrix<f64> {
        &self.csr
    }

    /// Dense copy of the stored values.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows(), self.ncols());
        for (i, j, v) in self.csr.triplet_iter() {
            dense[(i, j)] = *v;
        }
        dense
    }

    pub fn to_triplets(&self) -> SparseTripletsF64 {
        let mut rows = Vec::with_capacity(self.nnz());
        let mut cols = Vec::with_capacity(self.nnz());
        let mut vals = Vec::with_capacity(self.nnz());
        for (i, j, v) in self.csr.triplet_iter() {
            rows.push(i);
            cols.push(j);
            vals.push(*v);
        }
        SparseTripletsF64 {
            nrows: self.nrows(),
            ncols: self.ncols(),
            row_indices: rows,
            col_indices: cols,
            values: vals,
        }
    }

    /// Dense copy of block `(i, j)` of a block-structured matrix.
    pub fn submatrix(&self, i: usize, j: usize) -> BackendResult<DMatrix<f64>> {
        let (block_rows, block_cols) = self.block_shape();
        if i >= block_rows || j >= block_cols {
            return Err(BackendError::OutOfRange {
                row: i,
                col: j,
                nrows: block_rows,
                ncols: block_cols,
            });
        }
        let rows = self.row_blocks[i]..self.row_blocks[i + 1];
        let cols = self.col_blocks[j]..self.col_blocks[j + 1];

        let mut block = DMatrix::zeros(rows.len(), cols.len());
        for (r, c, v) in self.csr.triplet_iter() {
            if rows.contains(&r) && cols.contains(&c) {
                block[(r - rows.start, c - cols.start)] = *v;
            }
        }
        Ok(block)
    }

    fn check_ready(&self, x: &DVector<f64>, expected: usize) -> BackendResult<()> {
        if !self.is_assembled() {
            return Err(BackendError::NotAssembled);
        }
        if x.len() != expected {
            return Err(BackendError::SizeMismatch {
                expected,
                actual: x.len(),
            });
        }
        Ok(())
    }
}

fn check_block_offsets(offsets: &[usize], dim: usize) -> BackendResult<()> {
    let valid = offsets.len() >= 2
        && offsets[0] == 0
        && offsets[offsets.len() - 1] == dim
        && offsets.windows(2).all(|w| w[0] <= w[1]);
    if valid {
        Ok(())
    } else {
        Err(BackendError::Pattern(format!(
            "block offsets {:?} do not partition 0..{}",
            offsets, dim
        )))
    }
}

impl LinearOperator for SparseMat {
    fn sizes(&self) -> ((usize, usize), (usize, usize)) {
        (
            (self.comm.local_size(self.nrows()), self.nrows()),
            (self.comm.local_size(self.ncols()), self.ncols()),
        )
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn options_prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn mult(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>> {
        self.check_ready(x, self.ncols())?;
        let mut y = DVector::zeros(self.nrows());
        for (i, j, v) in self.csr.triplet_iter() {
            y[i] += v * x[j];
        }
        Ok(y)
    }

    fn mult_transpose(&self, x: &DVector<f64>) -> BackendResult<DVector<f64>> {
        self.check_ready(x, self.nrows())?;
        let mut y = DVector::zeros(self.ncols());
        for (i, j, v) in self.csr.triplet_iter() {
            y[j] += v * x[i];
        }
        Ok(y)
    }
}
