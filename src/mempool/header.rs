//! In-region layout of the slab mempool

use std::{mem, sync::atomic::AtomicU32};

use crate::region::RegionHeader;

/// Pool header at the start of the region; the element array follows on
/// the next cache line.
#[repr(C, align(64))]
#[derive(Debug)]
pub struct PoolHeader {
    /// Common region header (name, total size, element size, capacity)
    pub region: RegionHeader,
    /// Monotonically advancing allocation cursor; slot = cursor & mask
    pub cursor: AtomicU32,
    /// Count of currently claimed elements, used for admission control
    pub outstanding: AtomicU32,
}

/// Per-element header preceding each payload.
///
/// `claimed` is the single source of truth for ownership; the remaining
/// fields are stamped by the claimant and carried to whichever process the
/// element is handed to. All fields are atomics because unrelated processes
/// read them while the claimant writes.
#[repr(C)]
#[derive(Debug)]
pub struct ElementHeader {
    /// Process id of the current claimant
    pub pid: AtomicU32,
    /// Cursor value at claim time
    pub seq: AtomicU32,
    /// Caller-defined status word
    pub status: AtomicU32,
    /// 1 while the element is claimed, 0 otherwise
    pub claimed: AtomicU32,
    /// Valid payload length in bytes
    pub data_len: AtomicU32,
    _pad: [u32; 3],
}

impl PoolHeader {
    /// Byte offset of the element array from the region base
    pub const fn elements_offset() -> usize {
        mem::size_of::<PoolHeader>()
    }
}

/// Per-slot stride: element header plus payload, kept 8-byte aligned
pub fn element_stride(element_size: u32) -> usize {
    (mem::size_of::<ElementHeader>() + element_size as usize + 7) & !7
}

/// Total region byte size needed for a pool of `capacity` elements
pub fn pool_region_size(element_size: u32, capacity: u32) -> usize {
    PoolHeader::elements_offset() + capacity as usize * element_stride(element_size)
}
