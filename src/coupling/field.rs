//! Coupled fields: named arrays bound to one coupled mesh and one direction.

use crate::coupling::channel::ChannelDirection;
use crate::coupling::mesh::MeshPartition;
use crate::mesh_error::MeshCouplingError;
use crate::topology::subset::FieldLocation;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Time discretization attached to a field.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeDiscretization {
    #[default]
    NoTime,
    OneTime,
    LinearTime,
    ConstOnTimeInterval,
}

/// Physical nature of a field, which decides how interpolation treats it.
///
/// Coupled fields are always intensive: per-unit-measure quantities are
/// preserved rather than extensive totals.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldNature {
    #[default]
    IntensiveConservation,
}

/// Dense row-major value buffer (`n_tuples x n_components`).
#[derive(Clone, Debug, PartialEq)]
pub struct FieldValues {
    data: Vec<f64>,
    n_components: usize,
    revision: u64,
}

impl FieldValues {
    /// Zero-filled buffer for `n_tuples` locations.
    pub fn zeros(n_tuples: usize, n_components: usize) -> Self {
        Self {
            data: vec![0.0; n_tuples * n_components],
            n_components,
            revision: 0,
        }
    }

    /// Wrap existing values; `data.len()` must be a multiple of `n_components`.
    pub fn from_vec(
        name: &str,
        data: Vec<f64>,
        n_components: usize,
    ) -> Result<Self, MeshCouplingError> {
        if n_components == 0 {
            return Err(MeshCouplingError::ZeroComponents(name.to_string()));
        }
        if data.len() % n_components != 0 {
            return Err(MeshCouplingError::LengthMismatch {
                field: name.to_string(),
                expected: data.len().next_multiple_of(n_components),
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            n_components,
            revision: 0,
        })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn n_tuples(&self) -> usize {
        self.data.len() / self.n_components.max(1)
    }

    /// Mark the contents as changed for consumers caching derived data.
    pub fn declare_as_new(&mut self) {
        self.revision += 1;
    }

    /// Number of times the contents were declared new.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Buffer shared between a field and the channel it is attached to.
pub type SharedValues = Arc<RwLock<FieldValues>>;

/// What a channel sees of a field: its identity, layout and buffer handle.
#[derive(Clone, Debug)]
pub struct AttachedField {
    pub field_id: usize,
    pub mesh_id: usize,
    pub name: String,
    pub location: FieldLocation,
    pub n_components: usize,
    pub nature: FieldNature,
    pub partition: Arc<MeshPartition>,
    pub values: SharedValues,
}

impl AttachedField {
    /// Mesh id, mesh name and location kind; fields sharing it share geometry.
    ///
    /// Both groups must define their meshes in the same order.
    pub fn support_key(&self) -> String {
        let loc = match self.location {
            FieldLocation::Cells => "cells",
            FieldLocation::Nodes => "nodes",
        };
        format!("{}:{}/{}", self.mesh_id, self.partition.mesh().name(), loc)
    }

    /// Whether this handle still points at `values`.
    pub fn shares_buffer(&self, values: &SharedValues) -> bool {
        Arc::ptr_eq(&self.values, values)
    }
}

/// A field registered on a coupling.
#[derive(Debug)]
pub struct CoupledField {
    pub(crate) name: String,
    pub(crate) mesh_id: usize,
    pub(crate) n_components: usize,
    pub(crate) location: FieldLocation,
    pub(crate) time_discretization: TimeDiscretization,
    pub(crate) direction: Option<ChannelDirection>,
    pub(crate) nature: FieldNature,
    pub(crate) partition: Option<Arc<MeshPartition>>,
    pub(crate) values: SharedValues,
}

impl CoupledField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh_id(&self) -> usize {
        self.mesh_id
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn location(&self) -> FieldLocation {
        self.location
    }

    pub fn time_discretization(&self) -> TimeDiscretization {
        self.time_discretization
    }

    pub fn direction(&self) -> Option<ChannelDirection> {
        self.direction
    }

    pub fn nature(&self) -> FieldNature {
        self.nature
    }

    /// Partition the field lives on; `None` for direction-less fields.
    pub fn partition(&self) -> Option<&Arc<MeshPartition>> {
        self.partition.as_ref()
    }

    /// Handle to the current buffer instance.
    pub fn values(&self) -> &SharedValues {
        &self.values
    }

    /// Number of scalars in the backing buffer.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Channel view of this field; `None` when it has no partition.
    pub fn attachment(&self, field_id: usize) -> Option<AttachedField> {
        let partition = self.partition.as_ref()?;
        Some(AttachedField {
            field_id,
            mesh_id: self.mesh_id,
            name: self.name.clone(),
            location: self.location,
            n_components: self.n_components,
            nature: self.nature,
            partition: Arc::clone(partition),
            values: Arc::clone(&self.values),
        })
    }
}
