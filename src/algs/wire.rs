//! Fixed, little-endian wire encoding for coupling messages.
//!
//! Variable-length payloads travel as a [`WireCount`] header followed by the
//! payload on the same tag; per-(peer, tag) FIFO delivery keeps the pair
//! together.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::mesh_error::MeshCouplingError;
use bytemuck::{Pod, Zeroable};
use static_assertions::assert_eq_size;

/// Byte count carried ahead of every counted payload.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct WireCount {
    pub n_le: u32,
}

assert_eq_size!(WireCount, u32);

impl WireCount {
    /// Header for `n`, or a `Communication` error if `n` does not fit in 32 bits.
    pub fn new(n: usize) -> Result<Self, MeshCouplingError> {
        let n = u32::try_from(n).map_err(|_| {
            MeshCouplingError::Communication(format!("count {n} does not fit a 32-bit header"))
        })?;
        Ok(Self { n_le: n.to_le() })
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), MeshCouplingError> {
    if actual == expected {
        Ok(())
    } else {
        Err(MeshCouplingError::Communication(format!(
            "expected {expected} bytes, got {actual}"
        )))
    }
}

/// Send `payload` to `peer` preceded by its length.
///
/// Nothing is sent when the length does not fit the header.
pub fn send_counted<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    payload: &[u8],
) -> Result<(), MeshCouplingError> {
    let header = [WireCount::new(payload.len())?];
    comm.isend(peer, tag.base(), bytemuck::cast_slice(&header))
        .wait();
    comm.isend(peer, tag.base(), payload).wait();
    Ok(())
}

/// Receive a payload sent with [`send_counted`].
pub fn recv_counted<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
) -> Result<Vec<u8>, MeshCouplingError> {
    let mut header = [WireCount::zeroed()];
    let raw = comm
        .irecv(peer, tag.base(), bytemuck::cast_slice_mut(&mut header))
        .wait()
        .ok_or_else(|| lost(peer, tag))?;
    expect_exact_len(raw.len(), size_of::<WireCount>())?;
    bytemuck::cast_slice_mut(&mut header).copy_from_slice(&raw);

    let expected = header[0].get();
    let mut payload = vec![0u8; expected];
    let raw = comm
        .irecv(peer, tag.base(), &mut payload)
        .wait()
        .ok_or_else(|| lost(peer, tag))?;
    expect_exact_len(raw.len(), expected)?;
    Ok(raw)
}

/// Send a single count (no payload).
pub fn send_count<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    n: usize,
) -> Result<(), MeshCouplingError> {
    let header = [WireCount::new(n)?];
    comm.isend(peer, tag.base(), bytemuck::cast_slice(&header))
        .wait();
    Ok(())
}

pub fn recv_count<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
) -> Result<usize, MeshCouplingError> {
    let mut header = [WireCount::zeroed()];
    let raw = comm
        .irecv(peer, tag.base(), bytemuck::cast_slice_mut(&mut header))
        .wait()
        .ok_or_else(|| lost(peer, tag))?;
    expect_exact_len(raw.len(), size_of::<WireCount>())?;
    bytemuck::cast_slice_mut(&mut header).copy_from_slice(&raw);
    Ok(header[0].get())
}

fn lost(peer: usize, tag: CommTag) -> MeshCouplingError {
    MeshCouplingError::Communication(format!(
        "no message from rank {peer} on tag {:#06x}",
        tag.base()
    ))
}

/// Little-endian packing of `f64` values.
pub fn encode_f64s(values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub fn decode_f64s(raw: &[u8]) -> Result<Vec<f64>, MeshCouplingError> {
    if raw.len() % 8 != 0 {
        return Err(MeshCouplingError::Communication(format!(
            "{} bytes is not a whole number of f64 values",
            raw.len()
        )));
    }
    Ok(raw
        .chunks_exact(8)
        .map(|chunk| {
            let mut b = [0u8; 8];
            b.copy_from_slice(chunk);
            f64::from_le_bytes(b)
        })
        .collect())
}

/// Pack 3D points as consecutive `f64` triples.
pub fn encode_points(points: &[[f64; 3]]) -> Vec<u8> {
    encode_f64s(bytemuck::cast_slice(points))
}

pub fn decode_points(raw: &[u8]) -> Result<Vec<[f64; 3]>, MeshCouplingError> {
    let flat = decode_f64s(raw)?;
    if flat.len() % 3 != 0 {
        return Err(MeshCouplingError::Communication(format!(
            "{} coordinates do not form 3D points",
            flat.len()
        )));
    }
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}
