//! Fixed-width float records exchanged with the advisory peer.
//!
//! There is no framing: no length prefix, type tag, checksum or version.
//! Message boundaries come from the fixed sizes alone.
//!
//! ```text
//! client -> peer   20 bytes   [reserved=0, rot_x, rot_y, trans_z, mi]   5 x f32
//! peer -> client  >=12 bytes  [rot_x, rot_y, trans_z, ...ignored]       3 x f32
//! ```
//!
//! Floats are IEEE-754 binary32 in native byte order, matching a peer that
//! packs with Python's `struct.pack('f' * n, ...)` on the same host.

use crate::error::{Error, ExchangeFailure, Result};

/// Size of an encoded [`MetricRecord`].
pub const METRIC_RECORD_LEN: usize = 20;
/// Minimum size of a reply carrying a [`ReplyRecord`].
pub const REPLY_RECORD_LEN: usize = 12;
/// Upper bound on the bytes read for one reply.
pub const MAX_REPLY_LEN: usize = 2000;

const F32_LEN: usize = 4;

/// Client-to-peer payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRecord {
    /// Always written as 0. The peer reads it as a timestep slot.
    pub reserved: f32,
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub translation_z: f32,
    pub mutual_information: f32,
}

impl MetricRecord {
    pub fn new(rotation_x: f32, rotation_y: f32, translation_z: f32, mutual_information: f32) -> Self {
        Self {
            reserved: 0.0,
            rotation_x,
            rotation_y,
            translation_z,
            mutual_information,
        }
    }

    /// Fields in wire order.
    pub fn as_array(&self) -> [f32; 5] {
        [
            self.reserved,
            self.rotation_x,
            self.rotation_y,
            self.translation_z,
            self.mutual_information,
        ]
    }

    pub fn encode(&self) -> [u8; METRIC_RECORD_LEN] {
        let mut out = [0u8; METRIC_RECORD_LEN];
        for (slot, v) in out.chunks_exact_mut(F32_LEN).zip(self.as_array()) {
            slot.copy_from_slice(&v.to_ne_bytes());
        }
        out
    }

    /// Decode the first 20 bytes of `bytes`. Extra bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let f = decode_floats::<5>(bytes)?;
        Ok(Self {
            reserved: f[0],
            rotation_x: f[1],
            rotation_y: f[2],
            translation_z: f[3],
            mutual_information: f[4],
        })
    }
}

/// Peer-to-client payload: the pose to render next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplyRecord {
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub translation_z: f32,
}

impl ReplyRecord {
    pub fn new(rotation_x: f32, rotation_y: f32, translation_z: f32) -> Self {
        Self {
            rotation_x,
            rotation_y,
            translation_z,
        }
    }

    pub fn encode(&self) -> [u8; REPLY_RECORD_LEN] {
        let mut out = [0u8; REPLY_RECORD_LEN];
        let vals = [self.rotation_x, self.rotation_y, self.translation_z];
        for (slot, v) in out.chunks_exact_mut(F32_LEN).zip(vals) {
            slot.copy_from_slice(&v.to_ne_bytes());
        }
        out
    }

    /// Decode the leading 12 bytes of a reply. Trailing bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let f = decode_floats::<3>(bytes)?;
        Ok(Self::new(f[0], f[1], f[2]))
    }
}

fn decode_floats<const N: usize>(bytes: &[u8]) -> Result<[f32; N]> {
    let need = N * F32_LEN;
    if bytes.len() < need {
        return Err(Error::ExchangeFailed(ExchangeFailure::Truncated {
            expected: need,
            actual: bytes.len(),
        }));
    }
    let mut out = [0f32; N];
    for (v, chunk) in out.iter_mut().zip(bytes[..need].chunks_exact(F32_LEN)) {
        let mut raw = [0u8; F32_LEN];
        raw.copy_from_slice(chunk);
        *v = f32::from_ne_bytes(raw);
    }
    Ok(out)
}
