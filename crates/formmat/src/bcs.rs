//! Dirichlet boundary conditions.
//!
//! A boundary condition fixes the dofs of one function space (or one block
//! of a mixed space) that sit on a marked part of the boundary. Matrices keep
//! their conditions as an ordered sequence: iteration order decides the
//! order of floating-point updates and must be the same on every process.
//! Two conditions compare equal when they constrain the same space, block
//! and sub-domain to the same value; `same_set` uses that equality to
//! compare whole collections without regard to order.

use crate::error::{Error, Result};
use crate::function_space::FunctionSpace;
use nalgebra::DVector;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Part of the boundary a condition applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubDomain {
    /// Points carrying one boundary marker
    Marker(u32),
    /// Every exterior point
    Boundary,
}

impl fmt::Display for SubDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubDomain::Marker(marker) => write!(f, "{}", marker),
            SubDomain::Boundary => write!(f, "on_boundary"),
        }
    }
}

/// A Dirichlet condition `u = value` on a sub-domain
#[derive(Clone)]
pub struct DirichletBC {
    space: Arc<FunctionSpace>,
    /// Restricting block; `None` constrains every block
    block: Option<usize>,
    value: f64,
    sub_domain: SubDomain,
    /// Constrained global dofs, sorted
    nodes: Vec<usize>,
}

impl DirichletBC {
    pub fn new(space: Arc<FunctionSpace>, value: f64, sub_domain: SubDomain) -> Result<Self> {
        Self::build(space, None, value, sub_domain)
    }

    /// Restrict the condition to one block of a mixed space.
    pub fn on_block(self, block: usize) -> Result<Self> {
        Self::build(self.space, Some(block), self.value, self.sub_domain)
    }

    fn build(
        space: Arc<FunctionSpace>,
        block: Option<usize>,
        value: f64,
        sub_domain: SubDomain,
    ) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "boundary value must be finite, got {}",
                value
            )));
        }

        let blocks: Vec<usize> = match block {
            Some(b) => vec![b],
            None => (0..space.len()).collect(),
        };
        let markers: Vec<u32> = match sub_domain {
            SubDomain::Marker(marker) => vec![marker],
            SubDomain::Boundary => space.mesh().boundary_markers().to_vec(),
        };

        let mut nodes = Vec::new();
        for &b in &blocks {
            for &marker in &markers {
                nodes.push(space.boundary_dof(b, marker)?);
            }
        }
        nodes.sort_unstable();
        nodes.dedup();

        Ok(Self {
            space,
            block,
            value,
            sub_domain,
            nodes,
        })
    }

    pub fn function_space(&self) -> &Arc<FunctionSpace> {
        &self.space
    }

    pub fn block(&self) -> Option<usize> {
        self.block
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn sub_domain(&self) -> SubDomain {
        self.sub_domain
    }

    /// Constrained global dofs, sorted ascending.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Whether the condition constrains dofs of `space`.
    pub fn is_on(&self, space: &Arc<FunctionSpace>) -> bool {
        Arc::ptr_eq(&self.space, space)
    }

    /// `x[n] = 0` on constrained dofs.
    pub fn zero(&self, x: &mut DVector<f64>) {
        for &n in &self.nodes {
            x[n] = 0.0;
        }
    }

    /// `y[n] = x[n]` on constrained dofs.
    pub fn copy_from(&self, y: &mut DVector<f64>, x: &DVector<f64>) {
        for &n in &self.nodes {
            y[n] = x[n];
        }
    }

    /// `x[n] = value` on constrained dofs.
    pub fn apply(&self, x: &mut DVector<f64>) {
        for &n in &self.nodes {
            x[n] = self.value;
        }
    }
}

impl PartialEq for DirichletBC {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.space, &other.space)
            && self.block == other.block
            && self.sub_domain == other.sub_domain
            && self.value.to_bits() == other.value.to_bits()
    }
}

impl Eq for DirichletBC {}

impl Hash for DirichletBC {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.space) as usize).hash(state);
        self.block.hash(state);
        self.sub_domain.hash(state);
        self.value.to_bits().hash(state);
    }
}

impl fmt::Display for DirichletBC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block {
            Some(block) => write!(
                f,
                "DirichletBC({}.sub({}), {}, {})",
                self.space, block, self.value, self.sub_domain
            ),
            None => write!(f, "DirichletBC({}, {}, {})", self.space, self.value, self.sub_domain),
        }
    }
}

impl fmt::Debug for DirichletBC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Order-independent comparison of two condition collections.
pub fn same_set(a: &[DirichletBC], b: &[DirichletBC]) -> bool {
    let a: HashSet<&DirichletBC> = a.iter().collect();
    let b: HashSet<&DirichletBC> = b.iter().collect();
    a == b
}

/// All constrained dofs of a collection, mapped to their prescribed value.
///
/// Later conditions win where two conditions share a dof.
pub fn constrained_dofs(bcs: &[DirichletBC]) -> BTreeMap<usize, f64> {
    let mut constrained = BTreeMap::new();
    for bc in bcs {
        for &n in bc.nodes() {
            constrained.insert(n, bc.value());
        }
    }
    constrained
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{IntervalMesh, LEFT_MARKER, RIGHT_MARKER};

    fn p1_space(cells: usize) -> Arc<FunctionSpace> {
        let mesh = Arc::new(IntervalMesh::unit(cells).unwrap());
        FunctionSpace::new(mesh, "CG", 1).unwrap()
    }

    #[test]
    fn marker_selects_one_end() {
        let v = p1_space(4);
        let left = DirichletBC::new(v.clone(), 0.0, SubDomain::Marker(LEFT_MARKER)).unwrap();
        let right = DirichletBC::new(v, 1.0, SubDomain::Marker(RIGHT_MARKER)).unwrap();
        assert_eq!(left.nodes(), &[0]);
        assert_eq!(right.nodes(), &[4]);
    }

    #[test]
    fn whole_boundary_selects_both_ends() {
        let bc = DirichletBC::new(p1_space(3), 0.0, SubDomain::Boundary).unwrap();
        assert_eq!(bc.nodes(), &[0, 3]);
    }

    #[test]
    fn block_restriction_in_mixed_space() {
        let mesh = Arc::new(IntervalMesh::unit(2).unwrap());
        let v = FunctionSpace::new(mesh.clone(), "CG", 1).unwrap();
        let w = FunctionSpace::new(mesh, "CG", 2).unwrap();
        let z = FunctionSpace::mixed(&[v, w]).unwrap();

        let all = DirichletBC::new(z.clone(), 0.0, SubDomain::Marker(RIGHT_MARKER)).unwrap();
        assert_eq!(all.nodes(), &[2, 7]);

        let second = all.on_block(1).unwrap();
        assert_eq!(second.nodes(), &[7]);
        assert!(DirichletBC::new(z, 0.0, SubDomain::Boundary)
            .unwrap()
            .on_block(2)
            .is_err());
    }

    #[test]
    fn unknown_marker_is_rejected() {
        let result = DirichletBC::new(p1_space(2), 0.0, SubDomain::Marker(5));
        assert!(matches!(result, Err(Error::InvalidSubDomain(_))));
    }

    #[test]
    fn equality_requires_same_space_instance() {
        let v = p1_space(2);
        let other = p1_space(2);
        let a = DirichletBC::new(v.clone(), 0.0, SubDomain::Marker(1)).unwrap();
        let b = DirichletBC::new(v.clone(), 0.0, SubDomain::Marker(1)).unwrap();
        let c = DirichletBC::new(other, 0.0, SubDomain::Marker(1)).unwrap();
        let d = DirichletBC::new(v, 2.0, SubDomain::Marker(1)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn same_set_ignores_order() {
        let v = p1_space(2);
        let a = DirichletBC::new(v.clone(), 0.0, SubDomain::Marker(1)).unwrap();
        let b = DirichletBC::new(v.clone(), 1.0, SubDomain::Marker(2)).unwrap();
        let c = DirichletBC::new(v, 3.0, SubDomain::Marker(2)).unwrap();

        assert!(same_set(&[a.clone(), b.clone()], &[b.clone(), a.clone()]));
        assert!(!same_set(&[a.clone(), b.clone()], &[a.clone(), c]));
        assert!(!same_set(&[a], &[]));
        assert!(same_set(&[], &[]));
    }

    #[test]
    fn vector_helpers_touch_only_constrained_dofs() {
        let v = p1_space(2);
        let bc = DirichletBC::new(v, 5.0, SubDomain::Marker(LEFT_MARKER)).unwrap();

        let mut x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        bc.zero(&mut x);
        assert_eq!(x.as_slice(), &[0.0, 2.0, 3.0]);

        bc.apply(&mut x);
        assert_eq!(x.as_slice(), &[5.0, 2.0, 3.0]);

        let mut y = DVector::zeros(3);
        bc.copy_from(&mut y, &x);
        assert_eq!(y.as_slice(), &[5.0, 0.0, 0.0]);
    }

    #[test]
    fn constrained_dofs_last_condition_wins() {
        let v = p1_space(2);
        let bcs = vec![
            DirichletBC::new(v.clone(), 1.0, SubDomain::Boundary).unwrap(),
            DirichletBC::new(v, 4.0, SubDomain::Marker(RIGHT_MARKER)).unwrap(),
        ];
        let constrained = constrained_dofs(&bcs);
        assert_eq!(constrained.len(), 2);
        assert_eq!(constrained.get(&0), Some(&1.0));
        assert_eq!(constrained.get(&2), Some(&4.0));
    }
}
