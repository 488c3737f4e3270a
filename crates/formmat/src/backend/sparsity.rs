//! Nonzero-pattern construction for assembled matrices.
//!
//! The pattern is fixed when a matrix is created; later insertions outside
//! it are rejected, as with a preallocated AIJ matrix.

use super::options::MatType;
use super::traits::{BackendError, BackendResult};
use nalgebra_sparse::pattern::SparsityPattern;
use std::collections::BTreeSet;
use std::ops::Range;

/// Incremental builder of a CSR sparsity pattern
#[derive(Debug, Clone)]
pub struct SparsityBuilder {
    ncols: usize,
    rows: Vec<BTreeSet<usize>>,
}

impl SparsityBuilder {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            ncols,
            rows: vec![BTreeSet::new(); nrows],
        }
    }

    pub fn insert(&mut self, row: usize, col: usize) -> BackendResult<()> {
        if row >= self.rows.len() || col >= self.ncols {
            return Err(BackendError::OutOfRange {
                row,
                col,
                nrows: self.rows.len(),
                ncols: self.ncols,
            });
        }
        self.rows[row].insert(col);
        Ok(())
    }

    /// Couple every row in `rows` with every column in `cols`.
    pub fn insert_block(&mut self, rows: &[usize], cols: &[usize]) -> BackendResult<()> {
        for &row in rows {
            for &col in cols {
                self.insert(row, col)?;
            }
        }
        Ok(())
    }

    /// Reserve the diagonal entries of a square index range.
    pub fn insert_diagonal(&mut self, range: Range<usize>) -> BackendResult<()> {
        for i in range {
            self.insert(i, i)?;
        }
        Ok(())
    }

    pub fn build(self) -> BackendResult<SparsityPattern> {
        let nrows = self.rows.len();
        let mut offsets = Vec::with_capacity(nrows + 1);
        let mut indices = Vec::new();
        offsets.push(0);
        for row in self.rows {
            indices.extend(row);
            offsets.push(indices.len());
        }

        SparsityPattern::try_from_offsets_and_indices(nrows, self.ncols, offsets, indices)
            .map_err(|e| BackendError::Pattern(format!("{:?}", e)))
    }
}

/// Construction parameters of an assembled matrix
#[derive(Debug, Clone)]
pub struct MatSpec {
    pub pattern: SparsityPattern,
    pub mat_type: MatType,
    pub block_size: usize,
    /// Row block offsets (`[0, nrows]` for an unblocked matrix)
    pub row_blocks: Vec<usize>,
    /// Column block offsets
    pub col_blocks: Vec<usize>,
}

impl MatSpec {
    pub fn new(pattern: SparsityPattern) -> Self {
        let row_blocks = vec![0, pattern.major_dim()];
        let col_blocks = vec![0, pattern.minor_dim()];
        Self {
            pattern,
            mat_type: MatType::Aij,
            block_size: 1,
            row_blocks,
            col_blocks,
        }
    }

    pub fn with_mat_type(mut self, mat_type: MatType) -> Self {
        self.mat_type = mat_type;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_blocks(mut self, row_blocks: Vec<usize>, col_blocks: Vec<usize>) -> Self {
        self.row_blocks = row_blocks;
        self.col_blocks = col_blocks;
        self
    }

    pub fn nrows(&self) -> usize {
        self.pattern.major_dim()
    }

    pub fn ncols(&self) -> usize {
        self.pattern.minor_dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sorts_and_deduplicates() {
        let mut builder = SparsityBuilder::new(3, 3);
        builder.insert_block(&[0, 1], &[1, 0]).unwrap();
        builder.insert_block(&[1, 2], &[2, 1]).unwrap();
        builder.insert(0, 1).unwrap();
        let pattern = builder.build().unwrap();

        assert_eq!(pattern.nnz(), 7);
        assert_eq!(pattern.major_offsets(), &[0, 2, 5, 7]);
        assert_eq!(pattern.minor_indices(), &[0, 1, 0, 1, 2, 1, 2]);
    }

    #[test]
    fn empty_rows_are_allowed() {
        let mut builder = SparsityBuilder::new(3, 2);
        builder.insert(2, 1).unwrap();
        let pattern = builder.build().unwrap();
        assert_eq!(pattern.major_offsets(), &[0, 0, 0, 1]);
    }

    #[test]
    fn out_of_range_insert_fails() {
        let mut builder = SparsityBuilder::new(2, 2);
        assert!(matches!(
            builder.insert(2, 0),
            Err(BackendError::OutOfRange { .. })
        ));
    }

    #[test]
    fn spec_defaults_to_single_block() {
        let mut builder = SparsityBuilder::new(4, 3);
        builder.insert_diagonal(0..3).unwrap();
        let spec = MatSpec::new(builder.build().unwrap());
        assert_eq!(spec.row_blocks, vec![0, 4]);
        assert_eq!(spec.col_blocks, vec![0, 3]);
        assert_eq!(spec.mat_type, MatType::Aij);
    }
}
