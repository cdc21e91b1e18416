//! A named exchange session between two rank groups.

use crate::algs::rank_group::{
    ChannelGroups, GroupSide, RankGroup, channel_groups, classify,
};
use crate::coupling::channel::{
    ChannelDirection, ChannelId, ExchangeChannel, InterpolationChannel,
};
use crate::coupling::field::{
    CoupledField, FieldNature, FieldValues, SharedValues, TimeDiscretization,
};
use crate::coupling::mesh::{CoupledMesh, MeshDirection};
use crate::mesh_error::MeshCouplingError;
use crate::topology::parent_mesh::ParentMesh;
use crate::topology::subset::FieldLocation;
use parking_lot::RwLock;
use std::sync::Arc;

/// One coupling: channel pair, coupled meshes and fields.
///
/// Owns everything it refers to. Fields are declared before meshes, and
/// meshes before channels, so dropping a coupling releases them in that order.
#[derive(Debug)]
pub struct Coupling<E> {
    fields: Vec<CoupledField>,
    meshes: Vec<CoupledMesh>,
    send: ExchangeChannel<E>,
    recv: ExchangeChannel<E>,
    name: String,
    groups: [RankGroup; 2],
    side: Option<GroupSide>,
}

impl<E: InterpolationChannel> Coupling<E> {
    /// Build a coupling as seen from `my_rank`, opening both channels with `open`.
    ///
    /// `open` is called for the send channel first, then the receive channel.
    pub fn new<F>(
        id: usize,
        name: &str,
        group1: RankGroup,
        group2: RankGroup,
        my_rank: usize,
        mut open: F,
    ) -> Result<Self, MeshCouplingError>
    where
        F: FnMut(ChannelId, &ChannelGroups) -> Result<E, MeshCouplingError>,
    {
        if let Some(shared) = group1.first_shared(&group2) {
            return Err(MeshCouplingError::OverlappingGroups(shared));
        }
        let side = classify(my_rank, &group1, &group2);
        if side.is_none() {
            log::debug!("rank {my_rank} is outside both groups of coupling `{name}`");
        }

        let (send_groups, recv_groups) = channel_groups(my_rank, &group1, &group2);
        let send_engine = open(
            ChannelId {
                coupling: id,
                orientation: send_groups.orientation(&group1),
            },
            &send_groups,
        )?;
        let recv_engine = open(
            ChannelId {
                coupling: id,
                orientation: recv_groups.orientation(&group1),
            },
            &recv_groups,
        )?;

        Ok(Self {
            fields: Vec::new(),
            meshes: Vec::new(),
            send: ExchangeChannel::new(ChannelDirection::Send, send_groups, send_engine),
            recv: ExchangeChannel::new(ChannelDirection::Receive, recv_groups, recv_engine),
            name: name.to_string(),
            groups: [group1, group2],
            side,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The two rank groups, in creation order.
    pub fn groups(&self) -> &[RankGroup; 2] {
        &self.groups
    }

    /// Group of the calling process, if it belongs to one.
    pub fn side(&self) -> Option<GroupSide> {
        self.side
    }

    pub fn channel(&self, direction: ChannelDirection) -> &ExchangeChannel<E> {
        match direction {
            ChannelDirection::Send => &self.send,
            ChannelDirection::Receive => &self.recv,
        }
    }

    fn channel_mut(&mut self, direction: ChannelDirection) -> &mut ExchangeChannel<E> {
        match direction {
            ChannelDirection::Send => &mut self.send,
            ChannelDirection::Receive => &mut self.recv,
        }
    }

    // --- meshes ---

    /// Declare a coupled mesh; the parent mesh is not queried yet.
    pub fn define_mesh(
        &mut self,
        name: &str,
        criterion: &str,
        dimension: usize,
        is_source: bool,
        is_dest: bool,
    ) -> usize {
        let direction = MeshDirection::from_flags(is_source, is_dest);
        self.meshes
            .push(CoupledMesh::define(name, criterion, dimension, direction));
        self.meshes.len() - 1
    }

    /// Resolve every defined mesh against `parent` and build its partitions.
    ///
    /// Runs once per coupling.
    pub fn init_meshes<P: ParentMesh + ?Sized>(
        &mut self,
        parent: &P,
    ) -> Result<(), MeshCouplingError> {
        if self.meshes.iter().any(CoupledMesh::is_initialized) {
            return Err(MeshCouplingError::MeshesAlreadyInitialized(self.name.clone()));
        }
        let send_group = self.send.source_group().clone();
        let recv_group = self.recv.target_group().clone();
        for mesh in &mut self.meshes {
            mesh.initialize(parent, &send_group, &recv_group)?;
        }
        Ok(())
    }

    /// Id of the first mesh named `name`.
    pub fn mesh_id(&self, name: &str) -> Option<usize> {
        self.meshes.iter().position(|m| m.name() == name)
    }

    pub fn mesh(&self, mesh_id: usize) -> Option<&CoupledMesh> {
        self.meshes.get(mesh_id)
    }

    pub fn n_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Coupled element count; 0 for an unknown id.
    pub fn mesh_element_count(&self, mesh_id: usize) -> usize {
        self.meshes.get(mesh_id).map_or(0, CoupledMesh::element_count)
    }

    /// Parent ids of the coupled elements; empty for an unknown id.
    pub fn mesh_element_list(&self, mesh_id: usize) -> &[usize] {
        self.meshes
            .get(mesh_id)
            .map_or(&[][..], CoupledMesh::element_list)
    }

    // --- fields ---

    /// Add a field on `mesh_id`.
    ///
    /// With a direction, the matching mesh partition is created if needed and
    /// the buffer is attached to that direction's channel. Without one, the
    /// field is a free-standing buffer sized on the coupled subset.
    pub fn add_field(
        &mut self,
        name: &str,
        mesh_id: usize,
        n_components: usize,
        location: FieldLocation,
        time_discretization: TimeDiscretization,
        direction: Option<ChannelDirection>,
    ) -> Result<usize, MeshCouplingError> {
        if n_components == 0 {
            return Err(MeshCouplingError::ZeroComponents(name.to_string()));
        }
        let field_id = self.fields.len();
        let group = match direction {
            Some(ChannelDirection::Send) => Some(self.send.source_group().clone()),
            Some(ChannelDirection::Receive) => Some(self.recv.target_group().clone()),
            None => None,
        };
        let coupling = self.name.clone();
        let mesh = self
            .meshes
            .get_mut(mesh_id)
            .ok_or(MeshCouplingError::InvalidMeshId {
                coupling,
                mesh: mesh_id,
            })?;

        let partition = match (direction, group) {
            (Some(dir), Some(group)) => {
                if !mesh.direction().supports(dir) {
                    log::debug!(
                        "field `{name}`: mesh `{}` was not declared for {}",
                        mesh.name(),
                        dir.as_str()
                    );
                }
                Some(mesh.ensure_partition(dir, &group))
            }
            _ => None,
        };
        let n_tuples = match &partition {
            Some(p) => p.n_locations(location),
            None => mesh.subset().n_locations(location),
        };

        let field = CoupledField {
            name: name.to_string(),
            mesh_id,
            n_components,
            location,
            time_discretization,
            direction,
            nature: FieldNature::IntensiveConservation,
            partition,
            values: Arc::new(RwLock::new(FieldValues::zeros(n_tuples, n_components))),
        };
        let attachment = field.attachment(field_id);
        self.fields.push(field);

        if let (Some(dir), Some(attached)) = (direction, attachment) {
            self.channel_mut(dir).attach(attached);
        }
        Ok(field_id)
    }

    /// Id of the first field named `name` on `mesh_id`.
    pub fn field_id(&self, mesh_id: usize, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.mesh_id == mesh_id && f.name == name)
    }

    pub fn field(&self, field_id: usize) -> Option<&CoupledField> {
        self.fields.get(field_id)
    }

    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    fn field_and_mesh(
        &self,
        field_id: usize,
    ) -> Result<(&CoupledField, &CoupledMesh), MeshCouplingError> {
        let field = self
            .fields
            .get(field_id)
            .ok_or_else(|| MeshCouplingError::InvalidFieldId {
                coupling: self.name.clone(),
                field: field_id,
            })?;
        let mesh = self
            .meshes
            .get(field.mesh_id)
            .ok_or_else(|| MeshCouplingError::InvalidMeshId {
                coupling: self.name.clone(),
                mesh: field.mesh_id,
            })?;
        Ok((field, mesh))
    }

    /// Copy caller values into the field buffer and declare it new.
    ///
    /// With `on_parent`, `values` is indexed by parent location and read
    /// through the subset-to-parent map; otherwise it is in subset order.
    pub fn export_field(
        &self,
        field_id: usize,
        on_parent: bool,
        values: &[f64],
    ) -> Result<(), MeshCouplingError> {
        let (field, mesh) = self.field_and_mesh(field_id)?;
        let dim = field.n_components;
        let mut buffer = field.values.write();
        let out = buffer.as_mut_slice();

        if on_parent {
            let subset = mesh.subset();
            check_len(field, subset.n_parent_locations(field.location) * dim, values.len())?;
            let map = subset.map(field.location);
            // a buffer sized before `init_meshes` no longer fits the subset
            check_len(field, map.len() * dim, out.len())?;
            for (sub, &parent) in map.sub_to_parent().iter().enumerate() {
                if (parent + 1) * dim > values.len() {
                    return Err(MeshCouplingError::ParentIndexOutOfRange {
                        field: field.name.clone(),
                        index: parent,
                        len: values.len() / dim,
                    });
                }
                out[sub * dim..(sub + 1) * dim]
                    .copy_from_slice(&values[parent * dim..(parent + 1) * dim]);
            }
        } else {
            check_len(field, out.len(), values.len())?;
            out.copy_from_slice(values);
        }
        buffer.declare_as_new();
        Ok(())
    }

    /// Copy the field buffer out to caller values.
    ///
    /// With `on_parent`, entries go through the parent-to-subset map and
    /// parent locations outside the subset are left untouched; otherwise the
    /// buffer is copied in subset order.
    pub fn import_field(
        &self,
        field_id: usize,
        on_parent: bool,
        values: &mut [f64],
    ) -> Result<(), MeshCouplingError> {
        let (field, mesh) = self.field_and_mesh(field_id)?;
        let dim = field.n_components;
        let buffer = field.values.read();
        let src = buffer.as_slice();

        if on_parent {
            let subset = mesh.subset();
            let n_parent = subset.n_parent_locations(field.location);
            check_len(field, n_parent * dim, values.len())?;
            let map = subset.map(field.location);
            check_len(field, map.len() * dim, src.len())?;
            for (parent, sub) in map.parent_to_sub() {
                if parent >= n_parent {
                    return Err(MeshCouplingError::ParentIndexOutOfRange {
                        field: field.name.clone(),
                        index: parent,
                        len: n_parent,
                    });
                }
                values[parent * dim..(parent + 1) * dim]
                    .copy_from_slice(&src[sub * dim..(sub + 1) * dim]);
            }
        } else {
            check_len(field, src.len(), values.len())?;
            values.copy_from_slice(src);
        }
        Ok(())
    }

    /// Install a new buffer instance for a field.
    ///
    /// Channels keep the previous instance until [`reattach_field`](Self::reattach_field).
    pub fn replace_field_values(
        &mut self,
        field_id: usize,
        data: Vec<f64>,
    ) -> Result<SharedValues, MeshCouplingError> {
        let (field, _) = self.field_and_mesh(field_id)?;
        let expected = field.len();
        check_len(field, expected, data.len())?;
        let values = FieldValues::from_vec(&field.name, data, field.n_components)?;
        let shared = Arc::new(RwLock::new(values));
        self.fields[field_id].values = Arc::clone(&shared);
        Ok(shared)
    }

    // --- channels ---

    /// Compute the exchange pattern of one direction; later calls are no-ops.
    pub fn synchronize(&mut self, direction: ChannelDirection) -> Result<(), MeshCouplingError> {
        self.channel_mut(direction).synchronize()
    }

    /// Push all send-channel buffers to the remote group. Collective.
    pub fn send_data(&mut self) -> Result<(), MeshCouplingError> {
        self.send.send(&self.name)
    }

    /// Pull interpolated values into all receive-channel buffers. Collective.
    pub fn receive_data(&mut self) -> Result<(), MeshCouplingError> {
        self.recv.receive(&self.name)
    }

    /// Re-bind a field's current buffer to its channel.
    ///
    /// Fields without a direction are skipped.
    pub fn reattach_field(&mut self, field_id: usize) -> Result<(), MeshCouplingError> {
        let (field, _) = self.field_and_mesh(field_id)?;
        let (Some(direction), Some(attached)) = (field.direction, field.attachment(field_id))
        else {
            log::debug!("reattach: field `{}` has no direction, skipped", field.name);
            return Ok(());
        };
        self.channel_mut(direction).reattach(attached);
        Ok(())
    }
}

fn check_len(field: &CoupledField, expected: usize, actual: usize) -> Result<(), MeshCouplingError> {
    if expected == actual {
        Ok(())
    } else {
        Err(MeshCouplingError::LengthMismatch {
            field: field.name.clone(),
            expected,
            actual,
        })
    }
}
