//! Parent meshes, selection criteria and the subset meshes cut out of them.
//!
//! A [`ParentMesh`](parent_mesh::ParentMesh) is the host code's mesh. A
//! [`SubsetMesh`](subset::SubsetMesh) is the part of it selected for
//! coupling, together with the index maps linking both numberings.

pub mod parent_mesh;
pub mod selection;
pub mod subset;

pub use parent_mesh::{InMemoryParentMesh, ParentMesh};
pub use selection::SelectionCriterion;
pub use subset::{FieldLocation, SubsetMap, SubsetMesh};
