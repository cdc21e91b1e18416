//! Coupled subsets of a parent mesh.
//!
//! A [`SubsetMesh`] is the minimal mesh of the elements picked by a selection
//! criterion: compact cell and vertex numbering, connectivity, and the
//! geometry an interpolation engine needs. Both numberings carry a
//! [`SubsetMap`] back to the parent.

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshCouplingError;
use crate::topology::parent_mesh::ParentMesh;
use crate::topology::selection::SelectionCriterion;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Where field values live on a mesh.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldLocation {
    Cells,
    Nodes,
}

/// Bidirectional mapping between subset indices and parent indices.
///
/// Both directions are built together and cover the same element set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubsetMap {
    sub_to_parent: Vec<usize>,
    parent_to_sub: HashMap<usize, usize>,
}

impl SubsetMap {
    /// Subset index `i` maps to `parents[i]`; fails if a parent index repeats.
    pub fn from_parent_indices(parents: Vec<usize>) -> Result<Self, MeshCouplingError> {
        let mut parent_to_sub = HashMap::with_capacity(parents.len());
        for (sub, &parent) in parents.iter().enumerate() {
            if let Some(first) = parent_to_sub.insert(parent, sub) {
                return Err(MeshCouplingError::InconsistentSubsetMap(format!(
                    "parent index {parent} selected twice (subset {first} and {sub})"
                )));
            }
        }
        Ok(Self {
            sub_to_parent: parents,
            parent_to_sub,
        })
    }

    pub fn len(&self) -> usize {
        self.sub_to_parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_to_parent.is_empty()
    }

    /// Parent index of every subset entry, in subset order.
    pub fn sub_to_parent(&self) -> &[usize] {
        &self.sub_to_parent
    }

    pub fn parent_of(&self, sub: usize) -> Option<usize> {
        self.sub_to_parent.get(sub).copied()
    }

    pub fn sub_of(&self, parent: usize) -> Option<usize> {
        self.parent_to_sub.get(&parent).copied()
    }

    /// `(parent, sub)` pairs of the reverse mapping, in no particular order.
    pub fn parent_to_sub(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.parent_to_sub.iter().map(|(&p, &s)| (p, s))
    }

    /// Largest parent index referenced, if any.
    pub fn max_parent(&self) -> Option<usize> {
        self.sub_to_parent.iter().copied().max()
    }
}

impl DebugInvariants for SubsetMap {
    fn validate_invariants(&self) -> Result<(), MeshCouplingError> {
        if self.parent_to_sub.len() != self.sub_to_parent.len() {
            return Err(MeshCouplingError::InconsistentSubsetMap(format!(
                "{} subset entries but {} reverse entries",
                self.sub_to_parent.len(),
                self.parent_to_sub.len()
            )));
        }
        for (sub, &parent) in self.sub_to_parent.iter().enumerate() {
            if self.parent_to_sub.get(&parent) != Some(&sub) {
                return Err(MeshCouplingError::InconsistentSubsetMap(format!(
                    "subset {sub} -> parent {parent} has no matching reverse entry"
                )));
            }
        }
        Ok(())
    }
}

/// Minimal mesh of a selected parent subset.
#[derive(Clone, Debug)]
pub struct SubsetMesh {
    name: String,
    dimension: usize,
    cells: SubsetMap,
    vertices: SubsetMap,
    /// CSR offsets into `cell_vertices`, `n_cells + 1` entries.
    cell_offsets: Vec<usize>,
    cell_vertices: Vec<usize>,
    centroids: Vec<[f64; 3]>,
    coords: Vec<[f64; 3]>,
    parent_cells: usize,
    parent_vertices: usize,
}

impl SubsetMesh {
    /// A named mesh with no elements yet.
    pub fn empty(name: &str, dimension: usize) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            cells: SubsetMap::default(),
            vertices: SubsetMap::default(),
            cell_offsets: vec![0],
            cell_vertices: Vec::new(),
            centroids: Vec::new(),
            coords: Vec::new(),
            parent_cells: 0,
            parent_vertices: 0,
        }
    }

    /// Resolve `criterion` against `parent` and build the subset mesh.
    ///
    /// Cells keep the order returned by the selection; vertices are
    /// renumbered in ascending parent order.
    pub fn from_parent<P: ParentMesh + ?Sized>(
        name: &str,
        parent: &P,
        criterion: &SelectionCriterion,
        dimension: usize,
    ) -> Result<Self, MeshCouplingError> {
        let selected = parent.select_elements(criterion, dimension)?;
        let cells = SubsetMap::from_parent_indices(selected)?;

        let mut parent_vertices: Vec<usize> = Vec::new();
        for &elt in cells.sub_to_parent() {
            let verts = parent.element_vertices(dimension, elt).ok_or(
                MeshCouplingError::UnknownParentElement {
                    dimension,
                    element: elt,
                },
            )?;
            parent_vertices.extend_from_slice(verts);
        }
        parent_vertices.sort_unstable();
        parent_vertices.dedup();
        let vertices = SubsetMap::from_parent_indices(parent_vertices)?;

        let mut coords = Vec::with_capacity(vertices.len());
        for &v in vertices.sub_to_parent() {
            coords.push(
                parent
                    .vertex_coords(v)
                    .ok_or(MeshCouplingError::UnknownParentVertex(v))?,
            );
        }

        let mut cell_offsets = Vec::with_capacity(cells.len() + 1);
        let mut cell_vertices = Vec::new();
        let mut centroids = Vec::with_capacity(cells.len());
        cell_offsets.push(0);
        for &elt in cells.sub_to_parent() {
            let mut centroid = [0.0; 3];
            let verts = parent.element_vertices(dimension, elt).unwrap_or_default();
            for &v in verts {
                // every vertex was inserted into `vertices` above
                let local = vertices
                    .sub_of(v)
                    .ok_or(MeshCouplingError::UnknownParentVertex(v))?;
                cell_vertices.push(local);
                for (c, x) in centroid.iter_mut().zip(coords[local]) {
                    *c += x;
                }
            }
            if !verts.is_empty() {
                let n = verts.len() as f64;
                centroid.iter_mut().for_each(|c| *c /= n);
            }
            centroids.push(centroid);
            cell_offsets.push(cell_vertices.len());
        }

        let mesh = Self {
            name: name.to_string(),
            dimension,
            cells,
            vertices,
            cell_offsets,
            cell_vertices,
            centroids,
            coords,
            parent_cells: parent.n_elements(dimension),
            parent_vertices: parent.n_vertices(),
        };
        crate::debug_invariants!(mesh.validate_invariants(), "SubsetMesh::from_parent");
        Ok(mesh)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of value locations of the given kind.
    pub fn n_locations(&self, location: FieldLocation) -> usize {
        self.map(location).len()
    }

    /// Subset/parent mapping for the given location kind.
    pub fn map(&self, location: FieldLocation) -> &SubsetMap {
        match location {
            FieldLocation::Cells => &self.cells,
            FieldLocation::Nodes => &self.vertices,
        }
    }

    /// Number of parent locations of the given kind, for parent-indexed arrays.
    pub fn n_parent_locations(&self, location: FieldLocation) -> usize {
        match location {
            FieldLocation::Cells => self.parent_cells,
            FieldLocation::Nodes => self.parent_vertices,
        }
    }

    /// Geometric position of each location: cell centroids or vertex coordinates.
    pub fn positions(&self, location: FieldLocation) -> &[[f64; 3]] {
        match location {
            FieldLocation::Cells => &self.centroids,
            FieldLocation::Nodes => &self.coords,
        }
    }

    /// Subset-local vertices of subset cell `cell`.
    pub fn cell_vertices(&self, cell: usize) -> &[usize] {
        match (self.cell_offsets.get(cell), self.cell_offsets.get(cell + 1)) {
            (Some(&start), Some(&end)) => &self.cell_vertices[start..end],
            _ => &[],
        }
    }
}

impl DebugInvariants for SubsetMesh {
    fn validate_invariants(&self) -> Result<(), MeshCouplingError> {
        self.cells.validate_invariants()?;
        self.vertices.validate_invariants()?;
        if self.cell_offsets.len() != self.cells.len() + 1 {
            return Err(MeshCouplingError::InconsistentSubsetMap(format!(
                "{} cells but {} connectivity offsets",
                self.cells.len(),
                self.cell_offsets.len()
            )));
        }
        if let Some(&v) = self.cell_vertices.iter().find(|&&v| v >= self.vertices.len()) {
            return Err(MeshCouplingError::InconsistentSubsetMap(format!(
                "connectivity references vertex {v} of {}",
                self.vertices.len()
            )));
        }
        Ok(())
    }
}
