//! One-dimensional interval meshes.
//!
//! Cells are numbered left to right; cell `c` spans vertices `c` and `c + 1`.
//! The two exterior points carry the boundary markers `1` (left) and `2`
//! (right).

use crate::comm::Comm;
use crate::error::{Error, Result};

/// Marker of the left end point.
pub const LEFT_MARKER: u32 = 1;
/// Marker of the right end point.
pub const RIGHT_MARKER: u32 = 2;

/// An interval mesh
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalMesh {
    /// Vertex coordinates, strictly increasing
    coordinates: Vec<f64>,
    /// Communicator the mesh is distributed over
    comm: Comm,
}

impl IntervalMesh {
    /// Uniform mesh of `[0, length]` with `num_cells` cells.
    pub fn new(num_cells: usize, length: f64) -> Result<Self> {
        if num_cells == 0 {
            return Err(Error::InvalidParameter(
                "an interval mesh needs at least one cell".into(),
            ));
        }
        if !(length.is_finite() && length > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "interval length must be positive, got {}",
                length
            )));
        }

        let h = length / num_cells as f64;
        let mut coordinates: Vec<f64> = (0..num_cells).map(|i| i as f64 * h).collect();
        coordinates.push(length);

        Ok(Self {
            coordinates,
            comm: Comm::world(),
        })
    }

    /// Uniform mesh of the unit interval.
    pub fn unit(num_cells: usize) -> Result<Self> {
        Self::new(num_cells, 1.0)
    }

    /// Mesh with explicitly given vertex coordinates.
    pub fn from_coordinates(coordinates: Vec<f64>) -> Result<Self> {
        if coordinates.len() < 2 {
            return Err(Error::InvalidParameter(
                "an interval mesh needs at least two vertices".into(),
            ));
        }
        if coordinates.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidParameter(
                "vertex coordinates must be finite".into(),
            ));
        }
        if coordinates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidParameter(
                "vertex coordinates must be strictly increasing".into(),
            ));
        }

        Ok(Self {
            coordinates,
            comm: Comm::world(),
        })
    }

    /// Attach the mesh to another communicator.
    pub fn with_comm(mut self, comm: Comm) -> Self {
        self.comm = comm;
        self
    }

    pub fn comm(&self) -> Comm {
        self.comm
    }

    pub fn num_cells(&self) -> usize {
        self.coordinates.len() - 1
    }

    pub fn num_vertices(&self) -> usize {
        self.coordinates.len()
    }

    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    /// End points of a cell.
    pub fn cell_bounds(&self, cell: usize) -> (f64, f64) {
        (self.coordinates[cell], self.coordinates[cell + 1])
    }

    pub fn cell_size(&self, cell: usize) -> f64 {
        let (a, b) = self.cell_bounds(cell);
        b - a
    }

    /// Vertex carrying a boundary marker, if the marker exists.
    pub fn marker_vertex(&self, marker: u32) -> Option<usize> {
        match marker {
            LEFT_MARKER => Some(0),
            RIGHT_MARKER => Some(self.num_vertices() - 1),
            _ => None,
        }
    }

    pub fn boundary_markers(&self) -> [u32; 2] {
        [LEFT_MARKER, RIGHT_MARKER]
    }
}
