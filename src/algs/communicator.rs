//! Thin façade over intra-process (thread mailbox) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Handles are **waitable**: callers invoke `.wait()` before they trust that a
//! buffer has arrived. Messages between the same (source, destination, tag)
//! triple are delivered in the order they were sent.

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

/// Point-to-point byte messaging between ranks.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Post a send of `buf` to `peer`.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of at most `buf.len()` bytes from `peer`.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;
    /// Rank of the calling process in this communicator.
    fn rank(&self) -> usize;
    /// Number of ranks in this communicator.
    fn size(&self) -> usize;

    fn is_no_comm(&self) -> bool {
        false
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// A message tag reserved by one protocol; `offset` derives sub-phases.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(base: u16) -> Self {
        Self(base)
    }
    pub const fn base(self) -> u16 {
        self.0
    }
    pub const fn offset(self, k: u16) -> Self {
        Self(self.0.wrapping_add(k))
    }
}

/// Compile-time no-op comm for pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- RayonComm: intra-process / multi-thread ---
type Key = (u32, usize, usize, u16); // (context, src, dst, tag)

static MAILBOX: Lazy<DashMap<Key, VecDeque<Bytes>>> = Lazy::new(DashMap::new);
static NEXT_CONTEXT: AtomicU32 = AtomicU32::new(1);

/// Receive handle of [`RayonComm`]; `wait` spins until the message is posted.
pub struct LocalHandle {
    key: Key,
    limit: usize,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut queue) = MAILBOX.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    let n = bytes.len().min(self.limit);
                    return Some(bytes[..n].to_vec());
                }
            }
            std::thread::yield_now();
        }
    }
}

/// Ranks living on threads of one process, exchanging through a shared mailbox.
///
/// Each rank value is owned by exactly one thread. Ranks created together by
/// [`RayonComm::universe`] share a private context, so independent universes
/// (e.g. concurrently running tests) never see each other's messages.
#[derive(Clone, Debug)]
pub struct RayonComm {
    context: u32,
    rank: usize,
    size: usize,
}

impl RayonComm {
    /// Rank `rank` of `size` in the shared default context.
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            context: 0,
            rank,
            size,
        }
    }

    /// All ranks of a fresh communicator context, indexed by rank.
    pub fn universe(size: usize) -> Vec<Self> {
        let context = NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed);
        (0..size)
            .map(|rank| Self {
                context,
                rank,
                size,
            })
            .collect()
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.context, self.rank, peer, tag);
        MAILBOX
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            key: (self.context, peer, self.rank, tag),
            limit: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::mesh_error::MeshCouplingError;
    use mpi::environment::Universe;
    use mpi::topology::{Color, SimpleCommunicator};
    use mpi::traits::Communicator as _;
    use mpi::traits::*;
    use std::rc::Rc;

    /// MPI communicator. Sends are blocking; receives complete when posted.
    pub struct MpiComm {
        // `comm` must drop before the universe finalizes MPI.
        comm: SimpleCommunicator,
        rank: usize,
        size: usize,
        _universe: Rc<Universe>,
    }

    impl MpiComm {
        /// Initialize MPI and wrap `MPI_COMM_WORLD`.
        pub fn new() -> Result<Self, MeshCouplingError> {
            let universe = mpi::initialize().ok_or_else(|| {
                MeshCouplingError::Communication("MPI is already initialized".into())
            })?;
            let comm = universe.world();
            Ok(Self {
                rank: comm.rank() as usize,
                size: comm.size() as usize,
                comm,
                _universe: Rc::new(universe),
            })
        }

        /// Split into sub-communicators; ranks passing the same `color` end up together.
        pub fn split(&self, color: u16) -> Result<Self, MeshCouplingError> {
            let comm = self
                .comm
                .split_by_color(Color::with_value(i32::from(color)))
                .ok_or_else(|| {
                    MeshCouplingError::Communication("communicator split failed".into())
                })?;
            Ok(Self {
                rank: comm.rank() as usize,
                size: comm.size() as usize,
                comm,
                _universe: Rc::clone(&self._universe),
            })
        }
    }

    pub struct MpiRecv(Option<Vec<u8>>);

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecv;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.comm
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiRecv {
            let (mut data, _status) = self
                .comm
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(i32::from(tag));
            data.truncate(buf.len());
            MpiRecv(Some(data))
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
