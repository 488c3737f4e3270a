//! Continuous Lagrange function spaces on interval meshes.
//!
//! A space is a list of blocks sharing one mesh. Plain spaces have a single
//! block; mixed spaces concatenate the blocks of their components, block
//! `i` owning the global dofs `block_offset(i)..block_offset(i + 1)`.
//!
//! Inside a block the dof numbering follows the mesh from left to right:
//! local dof `k` of cell `c` is dof `c * degree + k`.

use crate::comm::Comm;
use crate::error::{Error, Result};
use crate::mesh::IntervalMesh;
use std::fmt;
use std::sync::Arc;

/// Highest supported polynomial degree.
pub const MAX_DEGREE: usize = 4;

/// Lagrange element on the reference cell `[0, 1]` with equispaced nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LagrangeElement {
    degree: usize,
}

impl LagrangeElement {
    pub fn new(degree: usize) -> Result<Self> {
        if degree == 0 || degree > MAX_DEGREE {
            return Err(Error::UnsupportedElement(format!(
                "CG{} (supported degrees are 1..={})",
                degree, MAX_DEGREE
            )));
        }
        Ok(Self { degree })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn num_local_dofs(&self) -> usize {
        self.degree + 1
    }

    /// Node positions on the reference cell.
    pub fn reference_nodes(&self) -> Vec<f64> {
        (0..=self.degree)
            .map(|k| k as f64 / self.degree as f64)
            .collect()
    }

    /// Basis function values and derivatives at a reference point.
    pub fn tabulate(&self, xi: f64) -> (Vec<f64>, Vec<f64>) {
        let nodes = self.reference_nodes();
        let n = nodes.len();
        let mut values = vec![0.0; n];
        let mut derivatives = vec![0.0; n];

        for k in 0..n {
            let mut value = 1.0;
            for m in (0..n).filter(|&m| m != k) {
                value *= (xi - nodes[m]) / (nodes[k] - nodes[m]);
            }
            values[k] = value;

            let mut derivative = 0.0;
            for j in (0..n).filter(|&j| j != k) {
                let mut term = 1.0 / (nodes[k] - nodes[j]);
                for m in (0..n).filter(|&m| m != k && m != j) {
                    term *= (xi - nodes[m]) / (nodes[k] - nodes[m]);
                }
                derivative += term;
            }
            derivatives[k] = derivative;
        }

        (values, derivatives)
    }
}

/// A (possibly mixed) continuous Lagrange space
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSpace {
    mesh: Arc<IntervalMesh>,
    elements: Vec<LagrangeElement>,
    /// Block offsets, `elements.len() + 1` entries
    offsets: Vec<usize>,
}

impl FunctionSpace {
    /// Scalar space of the given family and degree.
    ///
    /// Accepted families: `"CG"`, `"Lagrange"`, `"P"`.
    pub fn new(mesh: Arc<IntervalMesh>, family: &str, degree: usize) -> Result<Arc<Self>> {
        match family {
            "CG" | "Lagrange" | "P" => {}
            other => {
                return Err(Error::UnsupportedElement(format!(
                    "family {:?} is not available on interval meshes",
                    other
                )));
            }
        }
        let element = LagrangeElement::new(degree)?;
        Ok(Arc::new(Self::from_elements(mesh, vec![element])))
    }

    /// Mixed space built from components defined on the same mesh.
    pub fn mixed(spaces: &[Arc<FunctionSpace>]) -> Result<Arc<Self>> {
        let first = spaces.first().ok_or_else(|| {
            Error::InvalidParameter("a mixed space needs at least one component".into())
        })?;

        let mut elements = Vec::new();
        for space in spaces {
            if space.mesh != first.mesh {
                return Err(Error::InvalidParameter(
                    "mixed space components must share one mesh".into(),
                ));
            }
            elements.extend(space.elements.iter().copied());
        }

        Ok(Arc::new(Self::from_elements(first.mesh.clone(), elements)))
    }

    fn from_elements(mesh: Arc<IntervalMesh>, elements: Vec<LagrangeElement>) -> Self {
        let mut offsets = Vec::with_capacity(elements.len() + 1);
        let mut offset = 0;
        offsets.push(0);
        for element in &elements {
            offset += mesh.num_cells() * element.degree() + 1;
            offsets.push(offset);
        }
        Self {
            mesh,
            elements,
            offsets,
        }
    }

    pub fn mesh(&self) -> &Arc<IntervalMesh> {
        &self.mesh
    }

    pub fn comm(&self) -> Comm {
        self.mesh.comm()
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn is_mixed(&self) -> bool {
        self.elements.len() > 1
    }

    /// Components per node; all supported elements are scalar.
    pub fn value_size(&self) -> usize {
        1
    }

    pub fn element(&self, block: usize) -> LagrangeElement {
        self.elements[block]
    }

    /// Total number of dofs over all blocks.
    pub fn dim(&self) -> usize {
        self.offsets[self.elements.len()]
    }

    pub fn block_dim(&self, block: usize) -> usize {
        self.offsets[block + 1] - self.offsets[block]
    }

    pub fn block_offset(&self, block: usize) -> usize {
        self.offsets[block]
    }

    pub fn block_offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Global dofs of a cell in a block, in reference-node order.
    pub fn cell_dofs(&self, block: usize, cell: usize) -> Vec<usize> {
        let degree = self.elements[block].degree();
        let first = self.offsets[block] + cell * degree;
        (first..=first + degree).collect()
    }

    /// Coordinate of a block-local dof.
    pub fn dof_coordinate(&self, block: usize, dof: usize) -> f64 {
        let degree = self.elements[block].degree();
        let cell = (dof / degree).min(self.mesh.num_cells() - 1);
        let k = dof - cell * degree;
        let (a, b) = self.mesh.cell_bounds(cell);
        a + (b - a) * k as f64 / degree as f64
    }

    /// Global dof sitting on a marked boundary point.
    pub fn boundary_dof(&self, block: usize, marker: u32) -> Result<usize> {
        if block >= self.len() {
            return Err(Error::InvalidParameter(format!(
                "block {} out of range for a space with {} blocks",
                block,
                self.len()
            )));
        }
        let vertex = self.mesh.marker_vertex(marker).ok_or_else(|| {
            Error::InvalidSubDomain(format!("no boundary carries marker {}", marker))
        })?;
        let degree = self.elements[block].degree();
        Ok(self.offsets[block] + vertex * degree)
    }
}

impl fmt::Display for FunctionSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .elements
            .iter()
            .map(|e| format!("CG{}", e.degree()))
            .collect();
        if self.is_mixed() {
            write!(f, "MixedFunctionSpace({})", names.join(" x "))
        } else {
            write!(f, "FunctionSpace({})", names.join(""))
        }
    }
}
