#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-coupling
//!
//! mesh-coupling is a data-exchange manager for coupled simulation codes. Two
//! groups of processes (two codes, or two partitions of one parallel job)
//! exchange field values defined on possibly non-matching meshes through
//! interpolation channels whose weights are computed once and reused.
//!
//! ## Features
//! - Process-wide [`CouplingRegistry`](coupling::CouplingRegistry) with stable integer ids
//! - Send/receive channel pair per coupling; "send" always flows out of the caller's group
//! - Coupled meshes cut out of a parent mesh by a selection criterion, with
//!   validated subset/parent index maps
//! - Per-direction field buffers, scattered from and gathered into parent-indexed arrays
//! - Pluggable communication backends (serial, in-process threads, MPI)
//! - A reference nearest-point interpolation engine
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! mesh-coupling = "0.1"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! The typical call sequence on every process of both groups:
//!
//! ```text
//! registry.create -> define_mesh -> init_meshes -> add_field
//!     -> synchronize(dir) -> { export_field, send_data / receive_data, import_field }*
//!     -> registry.destroy
//! ```
//!
//! `synchronize`, `send_data` and `receive_data` are collective over both
//! groups of a coupling and must be called in the same order everywhere.
//!
//! ## Capability
//! The `coupling` feature (on by default) is the interpolation capability.
//! Without it [`CouplingRegistry::new`](coupling::CouplingRegistry::new)
//! fails with [`MeshCouplingError::CapabilityUnavailable`](mesh_error::MeshCouplingError::CapabilityUnavailable).

pub mod algs;
pub mod coupling;
pub mod debug_invariants;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, NoComm, RayonComm};
    pub use crate::algs::nearest_point::{NearestPointBackend, NearestPointConfig};
    pub use crate::algs::rank_group::{RankGroup, global_ranks_of_local_group};
    pub use crate::coupling::{
        ChannelDirection, Coupling, CouplingBackend, CouplingRegistry, InterpolationChannel,
        TimeDiscretization,
    };
    pub use crate::mesh_error::MeshCouplingError;
    pub use crate::topology::{FieldLocation, InMemoryParentMesh, ParentMesh};
}
