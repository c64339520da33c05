//! In-region layout of the lock-free ring

use std::{mem, sync::atomic::AtomicU32};

use crate::region::RegionHeader;

/// Producer-side cursors, padded to their own cache line so that producer
/// CAS traffic does not false-share with the consumer side.
#[repr(C, align(64))]
#[derive(Debug)]
pub struct ProducerCursors {
    /// Next slot index to reserve
    pub head: AtomicU32,
    /// Publication point: slots below this are visible to consumers
    pub tail: AtomicU32,
    /// Congestion threshold; equal to capacity when disabled
    pub watermark: AtomicU32,
    /// Nonzero when the ring was created in single-producer mode
    pub single: u32,
}

/// Consumer-side cursors, mirroring the producer side on its own cache line
#[repr(C, align(64))]
#[derive(Debug)]
pub struct ConsumerCursors {
    /// Next slot index to reserve for reading
    pub head: AtomicU32,
    /// Release point: slots below this are free for producers to reuse
    pub tail: AtomicU32,
    /// Nonzero when the ring was created in single-consumer mode
    pub single: u32,
}

/// Full ring header as stored at the start of the region; the slot array
/// follows immediately after.
#[repr(C)]
#[derive(Debug)]
pub struct RingHeader {
    /// Common region header (name, total size, element size, capacity)
    pub region: RegionHeader,
    pub prod: ProducerCursors,
    pub cons: ConsumerCursors,
}

impl RingHeader {
    /// Byte offset of the slot array from the region base
    pub const fn slots_offset() -> usize {
        mem::size_of::<RingHeader>()
    }
}

/// Total region byte size needed for a ring of `capacity` slots of `T`
pub fn ring_region_size<T>(capacity: u32) -> usize {
    RingHeader::slots_offset() + capacity as usize * mem::size_of::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_groups_are_cache_line_separated() {
        assert_eq!(mem::size_of::<ProducerCursors>(), 64);
        assert_eq!(mem::size_of::<ConsumerCursors>(), 64);
        assert_eq!(mem::align_of::<RingHeader>(), 64);
        // region header, then one line each for producer and consumer
        assert_eq!(mem::size_of::<RingHeader>(), 192);
    }

    #[test]
    fn test_slot_array_offset_is_aligned() {
        assert_eq!(RingHeader::slots_offset() % 64, 0);
        assert_eq!(ring_region_size::<u64>(8), 192 + 64);
    }
}
