//! Process-wide collection of couplings.
//!
//! Couplings are indexed by creation order; ids stay stable and a destroyed
//! id is never reused. Every process of both groups must create its couplings
//! in the same order so that ids (and hence channel tags) agree.

use crate::algs::rank_group::RankGroup;
use crate::coupling::channel::CouplingBackend;
use crate::coupling::coupling::Coupling;
use crate::mesh_error::MeshCouplingError;

/// Append-only registry of the couplings of one process.
pub struct CouplingRegistry<B: CouplingBackend> {
    backend: B,
    couplings: Vec<Option<Coupling<B::Channel>>>,
}

impl<B: CouplingBackend> CouplingRegistry<B> {
    /// Build the coupling subsystem on top of `backend`.
    ///
    /// Fails with [`MeshCouplingError::CapabilityUnavailable`] when the crate
    /// is built without the `coupling` feature or the backend is unusable.
    pub fn new(backend: B) -> Result<Self, MeshCouplingError> {
        if !cfg!(feature = "coupling") || !backend.is_available() {
            log::error!("coupling registry cannot be built without coupling support");
            return Err(MeshCouplingError::CapabilityUnavailable);
        }
        Ok(Self {
            backend,
            couplings: Vec::new(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create a coupling between two groups of global ranks; returns its id.
    pub fn create(
        &mut self,
        name: &str,
        group1: &[usize],
        group2: &[usize],
    ) -> Result<usize, MeshCouplingError> {
        if self.find(name).is_some() {
            return Err(MeshCouplingError::DuplicateCouplingName(name.to_string()));
        }
        let group1 = RankGroup::new(group1.iter().copied())?;
        let group2 = RankGroup::new(group2.iter().copied())?;
        let id = self.couplings.len();
        let my_rank = self.backend.world_rank();
        let backend = &self.backend;
        let coupling = Coupling::new(id, name, group1, group2, my_rank, |cid, groups| {
            backend.open_channel(cid, groups)
        })?;
        log::info!(
            "coupling `{name}` created (id {id}, rank {my_rank} on {:?})",
            coupling.side()
        );
        self.couplings.push(Some(coupling));
        Ok(id)
    }

    pub fn get(&self, id: usize) -> Result<&Coupling<B::Channel>, MeshCouplingError> {
        self.couplings
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(MeshCouplingError::InvalidCouplingId(id))
    }

    pub fn get_mut(&mut self, id: usize) -> Result<&mut Coupling<B::Channel>, MeshCouplingError> {
        self.couplings
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(MeshCouplingError::InvalidCouplingId(id))
    }

    /// Id of the live coupling named `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.couplings
            .iter()
            .position(|c| c.as_ref().is_some_and(|c| c.name() == name))
    }

    /// Release a coupling with all its fields, meshes and channels.
    pub fn destroy(&mut self, id: usize) -> Result<(), MeshCouplingError> {
        let coupling = self
            .couplings
            .get_mut(id)
            .and_then(Option::take)
            .ok_or(MeshCouplingError::InvalidCouplingId(id))?;
        log::info!(
            "coupling `{}` destroyed ({} fields, {} meshes)",
            coupling.name(),
            coupling.n_fields(),
            coupling.n_meshes()
        );
        drop(coupling);
        Ok(())
    }

    /// Number of ids issued so far, destroyed ones included.
    pub fn len(&self) -> usize {
        self.couplings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.couplings.is_empty()
    }

    /// Ids of couplings that are still alive.
    pub fn live_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.couplings
            .iter()
            .enumerate()
            .filter_map(|(id, c)| c.as_ref().map(|_| id))
    }
}
