//! Communicator descriptor.
//!
//! A `Comm` identifies the group of cooperating processes that share a mesh,
//! its function spaces and every matrix built on them. Collective calls
//! (matrix finalisation) are issued in program order on every member.

use crate::error::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Comm {
    rank: usize,
    size: usize,
}

impl Comm {
    /// The single-process world communicator.
    pub fn world() -> Self {
        Self { rank: 0, size: 1 }
    }

    pub fn new(rank: usize, size: usize) -> Result<Self> {
        if size == 0 || rank >= size {
            return Err(Error::InvalidParameter(format!(
                "rank {} is not a member of a communicator of size {}",
                rank, size
            )));
        }
        Ok(Self { rank, size })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_serial(&self) -> bool {
        self.size == 1
    }

    /// Number of the `global` rows owned by this rank.
    ///
    /// Rows are split in contiguous chunks; the first `global % size` ranks
    /// own one extra row.
    pub fn local_size(&self, global: usize) -> usize {
        let base = global / self.size;
        if self.rank < global % self.size {
            base + 1
        } else {
            base
        }
    }
}

impl Default for Comm {
    fn default() -> Self {
        Self::world()
    }
}

impl fmt::Display for Comm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Comm(rank {} of {})", self.rank, self.size)
    }
}
