//! MeshCouplingError: Unified error type for mesh-coupling public APIs
//!
//! Every fallible operation of the crate returns this error instead of
//! panicking, including misuse by the caller (unknown ids, wrongly sized
//! arrays) which is reported as a programming-error diagnostic.

use thiserror::Error;

/// Unified error type for coupling operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshCouplingError {
    /// The crate was built without the `coupling` feature, or the backend is unusable.
    #[error("this operation cannot be called without coupling support")]
    CapabilityUnavailable,
    /// A coupling id that was never issued or has already been destroyed.
    #[error("unknown or destroyed coupling id {0}")]
    InvalidCouplingId(usize),
    /// A mesh id outside the meshes defined on a coupling.
    #[error("unknown mesh id {mesh} in coupling `{coupling}`")]
    InvalidMeshId { coupling: String, mesh: usize },
    /// A field id outside the fields added to a coupling.
    #[error("unknown field id {field} in coupling `{coupling}`")]
    InvalidFieldId { coupling: String, field: usize },
    /// Coupling names are unique process-wide.
    #[error("a coupling named `{0}` already exists")]
    DuplicateCouplingName(String),
    /// A rank group must contain at least one rank.
    #[error("rank group must not be empty")]
    EmptyRankGroup,
    /// The two sides of a coupling must be disjoint.
    #[error("rank {0} belongs to both groups of the coupling")]
    OverlappingGroups(usize),
    /// Fields need at least one component.
    #[error("field `{0}` must have at least one component")]
    ZeroComponents(String),
    /// A caller-provided array does not match the expected number of scalars.
    #[error("field `{field}`: expected {expected} values, got {actual}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    /// A subset element refers to a parent index outside the caller's array.
    #[error("field `{field}`: parent index {index} is outside an array of {len} locations")]
    ParentIndexOutOfRange {
        field: String,
        index: usize,
        len: usize,
    },
    /// `init_meshes` may only run once per coupling.
    #[error("meshes of coupling `{0}` are already initialized")]
    MeshesAlreadyInitialized(String),
    /// Selection criterion could not be parsed.
    #[error("invalid selection criterion `{criterion}`: {reason}")]
    InvalidSelection { criterion: String, reason: String },
    /// The parent mesh does not know an element it selected.
    #[error("parent mesh has no element {element} of dimension {dimension}")]
    UnknownParentElement { dimension: usize, element: usize },
    /// Parent vertex id without coordinates.
    #[error("parent mesh has no vertex {0}")]
    UnknownParentVertex(usize),
    /// `sub_to_parent` and `parent_to_sub` disagree, or the selection is not injective.
    #[error("inconsistent subset mapping: {0}")]
    InconsistentSubsetMap(String),
    /// Data was exchanged on a channel that was never synchronized.
    #[error("{0} channel of coupling `{1}` has not been synchronized")]
    ChannelNotSynchronized(&'static str, String),
    /// A message was lost or malformed.
    #[error("communication error: {0}")]
    Communication(String),
    /// The interpolation engine could not apply its pattern.
    #[error("interpolation error: {0}")]
    Interpolation(String),
    /// Too many couplings for the 16-bit message tag space.
    #[error("no message tags left for coupling {coupling} (tag base {tag_base:#06x})")]
    TagSpaceExhausted { coupling: usize, tag_base: u16 },
}
