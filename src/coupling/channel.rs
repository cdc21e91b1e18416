//! Exchange channels: one-time synchronization, repeated data motion.
//!
//! An [`ExchangeChannel`] wraps an external [`InterpolationChannel`] bound to
//! a source and a target rank group. Weight computation happens once, in
//! [`ExchangeChannel::synchronize`]; `send`/`receive` reuse the pattern.
//!
//! `synchronize`, `send` and `receive` are collective over both groups: every
//! process must call them in the same relative order.

use crate::algs::rank_group::{ChannelGroups, GroupSide, RankGroup};
use crate::coupling::field::AttachedField;
use crate::mesh_error::MeshCouplingError;
use serde::{Deserialize, Serialize};

/// Direction of an exchange, from the calling process's point of view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelDirection {
    /// From my group outward.
    Send,
    /// Into my group.
    Receive,
}

impl ChannelDirection {
    pub fn index(self) -> usize {
        match self {
            ChannelDirection::Send => 0,
            ChannelDirection::Receive => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelDirection::Send => "send",
            ChannelDirection::Receive => "receive",
        }
    }
}

/// Identity of a channel shared by the processes at both of its ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId {
    /// Creation index of the coupling.
    pub coupling: usize,
    /// Which coupling group is the source.
    pub orientation: GroupSide,
}

/// Parallel interpolation service driven by an [`ExchangeChannel`].
///
/// `fields` lists the attached fields taking part in the communication
/// pattern, in attachment order.
pub trait InterpolationChannel {
    /// Compute interpolation weights / communication pattern. Collective.
    fn synchronize(&mut self, fields: &[AttachedField]) -> Result<(), MeshCouplingError>;
    /// Push source buffers to the remote group. Collective.
    fn send(&mut self, fields: &[AttachedField]) -> Result<(), MeshCouplingError>;
    /// Pull interpolated values into target buffers. Collective.
    fn receive(&mut self, fields: &[AttachedField]) -> Result<(), MeshCouplingError>;
}

/// Factory for interpolation channels; its existence is the coupling capability.
pub trait CouplingBackend {
    type Channel: InterpolationChannel;

    /// Rank of the calling process in the global numbering.
    fn world_rank(&self) -> usize;

    /// Whether the backend can run at all (e.g. the parallel runtime is up).
    fn is_available(&self) -> bool {
        true
    }

    /// Bind a new channel to its groups.
    fn open_channel(
        &self,
        id: ChannelId,
        groups: &ChannelGroups,
    ) -> Result<Self::Channel, MeshCouplingError>;
}

/// One direction of a coupling: engine, groups, attached fields and sync state.
#[derive(Debug)]
pub struct ExchangeChannel<E> {
    direction: ChannelDirection,
    groups: ChannelGroups,
    engine: E,
    synchronized: bool,
    /// Fields included in the synchronized pattern.
    pattern: Vec<AttachedField>,
    /// Fields attached after synchronization, awaiting `reattach`.
    pending: Vec<AttachedField>,
}

impl<E: InterpolationChannel> ExchangeChannel<E> {
    pub fn new(direction: ChannelDirection, groups: ChannelGroups, engine: E) -> Self {
        Self {
            direction,
            groups,
            engine,
            synchronized: false,
            pattern: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn direction(&self) -> ChannelDirection {
        self.direction
    }

    pub fn groups(&self) -> &ChannelGroups {
        &self.groups
    }

    pub fn source_group(&self) -> &RankGroup {
        &self.groups.source
    }

    pub fn target_group(&self) -> &RankGroup {
        &self.groups.target
    }

    /// Becomes true on the first `synchronize` and never resets.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Fields exchanged by `send`/`receive`.
    pub fn pattern_fields(&self) -> &[AttachedField] {
        &self.pattern
    }

    /// Fields attached after synchronization and not yet reattached.
    pub fn pending_fields(&self) -> &[AttachedField] {
        &self.pending
    }

    /// Attach a field buffer.
    ///
    /// Before synchronization the field joins the pattern; afterwards it
    /// waits until [`reattach`](Self::reattach).
    pub fn attach(&mut self, field: AttachedField) {
        if self.synchronized {
            log::debug!(
                "{} channel: field `{}` attached after synchronization; reattach to exchange it",
                self.direction.as_str(),
                field.name
            );
            self.pending.push(field);
        } else {
            log::debug!("{} channel: attached field `{}`", self.direction.as_str(), field.name);
            self.pattern.push(field);
        }
    }

    /// Re-bind a field's current buffer and include it in the pattern.
    pub fn reattach(&mut self, field: AttachedField) {
        self.pending.retain(|f| f.field_id != field.field_id);
        match self.pattern.iter_mut().find(|f| f.field_id == field.field_id) {
            Some(slot) => *slot = field,
            None => self.pattern.push(field),
        }
    }

    /// Compute the pattern once; later calls are no-ops.
    pub fn synchronize(&mut self) -> Result<(), MeshCouplingError> {
        if self.synchronized {
            return Ok(());
        }
        self.engine.synchronize(&self.pattern)?;
        self.synchronized = true;
        log::info!(
            "{} channel synchronized with {} field(s)",
            self.direction.as_str(),
            self.pattern.len()
        );
        Ok(())
    }

    pub fn send(&mut self, coupling: &str) -> Result<(), MeshCouplingError> {
        self.require_sync(coupling)?;
        self.engine.send(&self.pattern)
    }

    pub fn receive(&mut self, coupling: &str) -> Result<(), MeshCouplingError> {
        self.require_sync(coupling)?;
        self.engine.receive(&self.pattern)
    }

    fn require_sync(&self, coupling: &str) -> Result<(), MeshCouplingError> {
        if self.synchronized {
            Ok(())
        } else {
            Err(MeshCouplingError::ChannelNotSynchronized(
                self.direction.as_str(),
                coupling.to_string(),
            ))
        }
    }
}
