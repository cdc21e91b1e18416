//! Couplings: named exchange sessions between two rank groups.
//!
//! A [`CouplingRegistry`] owns couplings; each [`Coupling`] owns its coupled
//! meshes, fields and one send plus one receive [`ExchangeChannel`].

pub mod channel;
#[allow(clippy::module_inception)]
pub mod coupling;
pub mod field;
pub mod mesh;
pub mod registry;

pub use channel::{
    ChannelDirection, ChannelId, CouplingBackend, ExchangeChannel, InterpolationChannel,
};
pub use coupling::Coupling;
pub use field::{
    AttachedField, CoupledField, FieldNature, FieldValues, SharedValues, TimeDiscretization,
};
pub use mesh::{CoupledMesh, MeshDirection, MeshPartition};
pub use registry::CouplingRegistry;
