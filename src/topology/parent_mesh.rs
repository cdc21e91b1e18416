//! The simulation's own mesh, seen only through element selection and geometry.
//!
//! Element ids are per dimension (`0..n_elements(dim)`); vertex ids are shared
//! by all dimensions.

use crate::mesh_error::MeshCouplingError;
use crate::topology::selection::SelectionCriterion;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Parent-mesh collaborator consumed by coupled meshes.
pub trait ParentMesh {
    /// Number of elements of dimension `dim`.
    fn n_elements(&self, dim: usize) -> usize;
    /// Number of vertices.
    fn n_vertices(&self) -> usize;
    /// Elements of dimension `dim` matching `criterion`, ascending and without duplicates.
    fn select_elements(
        &self,
        criterion: &SelectionCriterion,
        dim: usize,
    ) -> Result<Vec<usize>, MeshCouplingError>;
    /// Vertices of one element.
    fn element_vertices(&self, dim: usize, element: usize) -> Option<&[usize]>;
    /// Coordinates of one vertex.
    fn vertex_coords(&self, vertex: usize) -> Option<[f64; 3]>;
}

/// Simple in-memory parent mesh with named element groups.
#[derive(Clone, Debug, Default)]
pub struct InMemoryParentMesh {
    vertices: Vec<[f64; 3]>,
    elements: BTreeMap<usize, Vec<Vec<usize>>>,
    groups: HashMap<String, HashMap<usize, BTreeSet<usize>>>,
}

impl InMemoryParentMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex, returning its id.
    pub fn add_vertex(&mut self, coords: [f64; 3]) -> usize {
        self.vertices.push(coords);
        self.vertices.len() - 1
    }

    /// Append an element of dimension `dim`, returning its id within that dimension.
    pub fn add_element(
        &mut self,
        dim: usize,
        vertices: &[usize],
    ) -> Result<usize, MeshCouplingError> {
        if let Some(&bad) = vertices.iter().find(|&&v| v >= self.vertices.len()) {
            return Err(MeshCouplingError::UnknownParentVertex(bad));
        }
        let list = self.elements.entry(dim).or_default();
        list.push(vertices.to_vec());
        Ok(list.len() - 1)
    }

    /// Put an existing element into group `name`.
    ///
    /// Returns `false` if it was already a member.
    pub fn add_to_group(
        &mut self,
        name: &str,
        dim: usize,
        element: usize,
    ) -> Result<bool, MeshCouplingError> {
        if element >= self.n_elements(dim) {
            return Err(MeshCouplingError::UnknownParentElement {
                dimension: dim,
                element,
            });
        }
        Ok(self
            .groups
            .entry(name.to_string())
            .or_default()
            .entry(dim)
            .or_default()
            .insert(element))
    }

    /// Members of group `name` with dimension `dim`, ascending.
    pub fn group_elements(&self, name: &str, dim: usize) -> Vec<usize> {
        self.groups
            .get(name)
            .and_then(|by_dim| by_dim.get(&dim))
            .map_or_else(Vec::new, |set| set.iter().copied().collect())
    }

    /// Names of all groups, sorted.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).sorted().collect()
    }
}

impl ParentMesh for InMemoryParentMesh {
    fn n_elements(&self, dim: usize) -> usize {
        self.elements.get(&dim).map_or(0, Vec::len)
    }

    fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    fn select_elements(
        &self,
        criterion: &SelectionCriterion,
        dim: usize,
    ) -> Result<Vec<usize>, MeshCouplingError> {
        match criterion {
            SelectionCriterion::All => Ok((0..self.n_elements(dim)).collect()),
            SelectionCriterion::Groups(names) => {
                for name in names.iter().filter(|n| !self.groups.contains_key(n.as_str())) {
                    log::warn!("selection group `{name}` is not defined on the parent mesh");
                }
                Ok(names
                    .iter()
                    .map(|name| self.group_elements(name, dim))
                    .kmerge()
                    .dedup()
                    .collect())
            }
        }
    }

    fn element_vertices(&self, dim: usize, element: usize) -> Option<&[usize]> {
        self.elements
            .get(&dim)
            .and_then(|list| list.get(element))
            .map(Vec::as_slice)
    }

    fn vertex_coords(&self, vertex: usize) -> Option<[f64; 3]> {
        self.vertices.get(vertex).copied()
    }
}
