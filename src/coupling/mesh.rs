//! Coupled meshes and their per-direction parallel partitions.

use crate::algs::rank_group::RankGroup;
use crate::coupling::channel::ChannelDirection;
use crate::mesh_error::MeshCouplingError;
use crate::topology::parent_mesh::ParentMesh;
use crate::topology::selection::SelectionCriterion;
use crate::topology::subset::{FieldLocation, SubsetMesh};
use std::sync::Arc;

/// Directions a coupled mesh takes part in, as a bit set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MeshDirection(u8);

impl MeshDirection {
    pub const NONE: MeshDirection = MeshDirection(0);
    pub const SEND: MeshDirection = MeshDirection(1);
    pub const RECEIVE: MeshDirection = MeshDirection(2);
    pub const BOTH: MeshDirection = MeshDirection(3);

    pub fn from_flags(is_source: bool, is_dest: bool) -> Self {
        let mut bits = 0;
        if is_source {
            bits |= Self::SEND.0;
        }
        if is_dest {
            bits |= Self::RECEIVE.0;
        }
        MeshDirection(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn supports(self, direction: ChannelDirection) -> bool {
        let bit = match direction {
            ChannelDirection::Send => Self::SEND.0,
            ChannelDirection::Receive => Self::RECEIVE.0,
        };
        self.0 & bit != 0
    }
}

/// A subset mesh distributed over one rank group, as seen by one channel.
#[derive(Debug)]
pub struct MeshPartition {
    mesh: Arc<SubsetMesh>,
    group: RankGroup,
    direction: ChannelDirection,
}

impl MeshPartition {
    pub fn new(mesh: Arc<SubsetMesh>, group: RankGroup, direction: ChannelDirection) -> Self {
        Self {
            mesh,
            group,
            direction,
        }
    }

    pub fn mesh(&self) -> &SubsetMesh {
        &self.mesh
    }

    pub fn group(&self) -> &RankGroup {
        &self.group
    }

    pub fn direction(&self) -> ChannelDirection {
        self.direction
    }

    /// Role of this partition in its channel.
    pub fn role(&self) -> &'static str {
        match self.direction {
            ChannelDirection::Send => "source mesh",
            ChannelDirection::Receive => "target mesh",
        }
    }

    /// Local value locations of the given kind on this rank.
    pub fn n_locations(&self, location: FieldLocation) -> usize {
        self.mesh.n_locations(location)
    }
}

/// A named parent subset selected for exchange.
#[derive(Debug)]
pub struct CoupledMesh {
    criterion: String,
    dimension: usize,
    direction: MeshDirection,
    subset: Arc<SubsetMesh>,
    partitions: [Option<Arc<MeshPartition>>; 2],
    initialized: bool,
}

impl CoupledMesh {
    /// Record selection parameters; nothing is resolved yet.
    pub fn define(
        name: &str,
        criterion: &str,
        dimension: usize,
        direction: MeshDirection,
    ) -> Self {
        Self {
            criterion: criterion.to_string(),
            dimension,
            direction,
            subset: Arc::new(SubsetMesh::empty(name, dimension)),
            partitions: [None, None],
            initialized: false,
        }
    }

    /// Resolve the selection against `parent` and build both partitions.
    pub fn initialize<P: ParentMesh + ?Sized>(
        &mut self,
        parent: &P,
        send_group: &RankGroup,
        recv_group: &RankGroup,
    ) -> Result<(), MeshCouplingError> {
        let criterion = SelectionCriterion::parse(&self.criterion)?;
        let subset = SubsetMesh::from_parent(self.name(), parent, &criterion, self.dimension)?;
        if self.partitions.iter().any(Option::is_some) {
            log::warn!(
                "mesh `{}` had partitions before initialization; fields added earlier keep the empty layout",
                self.name()
            );
        }
        self.subset = Arc::new(subset);
        self.partitions = [
            Some(self.new_partition(send_group, ChannelDirection::Send)),
            Some(self.new_partition(recv_group, ChannelDirection::Receive)),
        ];
        self.initialized = true;
        log::info!(
            "coupled mesh `{}`: {} elements, {} vertices selected by `{}`",
            self.name(),
            self.subset.n_cells(),
            self.subset.n_vertices(),
            self.criterion
        );
        Ok(())
    }

    /// Partition for `direction`, created over `group` if missing.
    pub fn ensure_partition(
        &mut self,
        direction: ChannelDirection,
        group: &RankGroup,
    ) -> Arc<MeshPartition> {
        let slot = direction.index();
        if let Some(existing) = &self.partitions[slot] {
            return Arc::clone(existing);
        }
        let partition = self.new_partition(group, direction);
        self.partitions[slot] = Some(Arc::clone(&partition));
        partition
    }

    fn new_partition(&self, group: &RankGroup, direction: ChannelDirection) -> Arc<MeshPartition> {
        Arc::new(MeshPartition::new(
            Arc::clone(&self.subset),
            group.clone(),
            direction,
        ))
    }

    pub fn name(&self) -> &str {
        self.subset.name()
    }

    pub fn criterion(&self) -> &str {
        &self.criterion
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn direction(&self) -> MeshDirection {
        self.direction
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn subset(&self) -> &SubsetMesh {
        &self.subset
    }

    pub fn partition(&self, direction: ChannelDirection) -> Option<&Arc<MeshPartition>> {
        self.partitions[direction.index()].as_ref()
    }

    pub fn element_count(&self) -> usize {
        self.subset.n_cells()
    }

    /// Parent element id of each coupled element, in subset order.
    pub fn element_list(&self) -> &[usize] {
        self.subset.map(FieldLocation::Cells).sub_to_parent()
    }
}
