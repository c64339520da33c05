//! Lock-free circular message ring over a shared region
//!
//! Cursor protocol: each side (producer, consumer) owns a `head`/`tail`
//! pair of 32-bit cursors advanced with wrapping arithmetic and masked into
//! the slot array. A bulk operation first reserves a cursor range (CAS on
//! `head` in multi mode, plain store in single mode), copies its slots,
//! waits for earlier peers to publish, then publishes its own `tail`
//! advance. Publication is the visibility point; a peer that dies between
//! reservation and publication stalls later peers, which is inherent to the
//! protocol and must be handled by external liveness monitoring.

use std::{
    marker::PhantomData,
    mem,
    ptr::NonNull,
    sync::atomic::Ordering,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ShmIpcError},
    region::{RegionConfig, SharedRegion},
};

use super::header::{ring_region_size, RingHeader};
use super::stats::RingStats;

/// Configuration for creating or attaching a shared ring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingConfig {
    /// Backing region settings
    pub region: RegionConfig,
    /// Number of slots; must be a nonzero power of two
    pub capacity: u32,
    /// Skip the producer CAS when only one producer ever enqueues
    pub single_producer: bool,
    /// Skip the consumer CAS when only one consumer ever dequeues
    pub single_consumer: bool,
}

impl RingConfig {
    /// Create a new ring configuration
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            region: RegionConfig::new(name),
            capacity,
            single_producer: false,
            single_consumer: false,
        }
    }

    /// Set the backing file path
    pub fn with_file_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.region = self.region.with_file_path(path);
        self
    }

    /// Set single-producer mode
    pub fn with_single_producer(mut self, single: bool) -> Self {
        self.single_producer = single;
        self
    }

    /// Set single-consumer mode
    pub fn with_single_consumer(mut self, single: bool) -> Self {
        self.single_consumer = single;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.region.validate()?;
        if self.capacity == 0 || !self.capacity.is_power_of_two() {
            return Err(ShmIpcError::invalid_capacity(self.capacity));
        }
        Ok(())
    }
}

/// Fixed-capacity lock-free ring shared between processes.
///
/// `T` must be `Copy`: slot contents are raw fixed-size values read and
/// written directly in shared memory, with no drop glue and no pointers
/// that would only be valid in one process.
#[derive(Debug)]
pub struct ShmRing<T> {
    /// Backing region; keeps the mapping alive
    region: SharedRegion,
    /// Ring header at the region base
    header: NonNull<RingHeader>,
    /// Slot array following the header
    slots: NonNull<T>,
    capacity: u32,
    mask: u32,
    single_producer: bool,
    single_consumer: bool,
    _phantom: PhantomData<T>,
}

impl<T: Copy> ShmRing<T> {
    /// Create a fresh ring or attach to an existing one with the same name.
    ///
    /// A fresh ring starts with all four cursors at zero and watermarking
    /// disabled. When attaching, the capacity and mode flags stored in the
    /// region header win; the header shape (element size, capacity, name)
    /// is validated against this `T` and configuration.
    pub fn create_or_attach(config: RingConfig) -> Result<Self> {
        config.validate()?;
        if mem::align_of::<T>() > 64 {
            return Err(ShmIpcError::invalid_parameter(
                "T",
                "slot type alignment exceeds the 64-byte slot array alignment",
            ));
        }

        let requested = ring_region_size::<T>(config.capacity);
        let region = SharedRegion::create_or_open(&config.region, requested)?;

        if region.created() {
            let total_size = region.size() as u64;
            let header = unsafe { &mut *region.as_mut_ptr::<RingHeader>() };
            header.region.total_size = total_size;
            header.region.element_size = mem::size_of::<T>() as u32;
            header.region.capacity = config.capacity;
            header.region.set_name(&config.region.name);
            *header.prod.head.get_mut() = 0;
            *header.prod.tail.get_mut() = 0;
            // watermark == capacity means "disabled"
            *header.prod.watermark.get_mut() = config.capacity;
            header.prod.single = config.single_producer as u32;
            *header.cons.head.get_mut() = 0;
            *header.cons.tail.get_mut() = 0;
            header.cons.single = config.single_consumer as u32;
        } else {
            let header = unsafe { &*(region.as_mut_ptr::<RingHeader>() as *const RingHeader) };
            Self::validate_header(header, &config, region.size())?;
        }

        let header_ptr = unsafe { region.as_mut_ptr::<RingHeader>() };
        let slots_ptr = unsafe {
            region
                .as_mut_ptr::<u8>()
                .add(RingHeader::slots_offset())
                .cast::<T>()
        };

        let header = NonNull::new(header_ptr)
            .ok_or_else(|| ShmIpcError::map("Region base pointer is null"))?;
        let slots = NonNull::new(slots_ptr)
            .ok_or_else(|| ShmIpcError::map("Slot array pointer is null"))?;

        let stored = unsafe { header.as_ref() };
        let capacity = stored.region.capacity;
        let mask = stored.region.mask();
        let single_producer = stored.prod.single != 0;
        let single_consumer = stored.cons.single != 0;

        Ok(Self {
            region,
            header,
            slots,
            capacity,
            mask,
            single_producer,
            single_consumer,
            _phantom: PhantomData,
        })
    }

    /// Attach-time shape validation of an existing header
    fn validate_header(header: &RingHeader, config: &RingConfig, mapped: usize) -> Result<()> {
        let name = &config.region.name;
        if header.region.element_size != mem::size_of::<T>() as u32 {
            return Err(ShmIpcError::region_mismatch(
                name,
                format!(
                    "stored element size {} differs from slot type size {}",
                    header.region.element_size,
                    mem::size_of::<T>()
                ),
            ));
        }
        let capacity = header.region.capacity;
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(ShmIpcError::region_mismatch(
                name,
                format!("stored capacity {} is not a power of two", capacity),
            ));
        }
        if mapped < ring_region_size::<T>(capacity) {
            return Err(ShmIpcError::region_mismatch(
                name,
                "mapped region smaller than header plus slot array",
            ));
        }
        if header.region.name() != name {
            return Err(ShmIpcError::region_mismatch(
                name,
                format!("stored name <{}> differs", header.region.name()),
            ));
        }
        Ok(())
    }

    fn header(&self) -> &RingHeader {
        unsafe { self.header.as_ref() }
    }

    /// Enqueue as many of `items` as fit; returns the number enqueued.
    ///
    /// Never blocks on a full ring: a short count (possibly 0) is the sole
    /// backpressure signal. In multi-producer mode the call spin-waits for
    /// producers holding earlier reservations before publishing its own.
    pub fn enqueue_bulk(&self, items: &[T]) -> usize {
        if items.is_empty() {
            return 0;
        }
        let want = items.len().min(u32::MAX as usize) as u32;
        unsafe { self.enqueue_raw(items.as_ptr(), want) as usize }
    }

    /// Enqueue a single item; `false` when the ring is full
    pub fn enqueue(&self, item: T) -> bool {
        self.enqueue_bulk(std::slice::from_ref(&item)) == 1
    }

    unsafe fn enqueue_raw(&self, items: *const T, want: u32) -> u32 {
        let prod = &self.header().prod;
        let cons = &self.header().cons;

        let (head, n) = loop {
            let head = prod.head.load(Ordering::Relaxed);
            let cons_tail = cons.tail.load(Ordering::Acquire);
            let free = self.capacity.wrapping_sub(head.wrapping_sub(cons_tail));
            let n = want.min(free);
            if n == 0 {
                return 0;
            }
            let next = head.wrapping_add(n);
            if self.single_producer {
                prod.head.store(next, Ordering::Relaxed);
                break (head, n);
            }
            match prod
                .head
                .compare_exchange_weak(head, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break (head, n),
                Err(_) => continue,
            }
        };

        // slots [head, head + n) are exclusively ours now
        for i in 0..n {
            let index = (head.wrapping_add(i) & self.mask) as usize;
            std::ptr::write(self.slots.as_ptr().add(index), *items.add(i as usize));
        }

        // earlier reservations publish first, in reservation order
        if !self.single_producer {
            while prod.tail.load(Ordering::Acquire) != head {
                std::hint::spin_loop();
            }
        }
        prod.tail.store(head.wrapping_add(n), Ordering::Release);
        n
    }

    /// Dequeue up to `out.len()` items; returns the number dequeued
    pub fn dequeue_bulk(&self, out: &mut [T]) -> usize {
        if out.is_empty() {
            return 0;
        }
        let want = out.len().min(u32::MAX as usize) as u32;
        unsafe { self.dequeue_raw(out.as_mut_ptr(), want) as usize }
    }

    /// Dequeue a single item; `None` when the ring is empty
    pub fn dequeue(&self) -> Option<T> {
        let mut slot = mem::MaybeUninit::<T>::uninit();
        let n = unsafe { self.dequeue_raw(slot.as_mut_ptr(), 1) };
        if n == 1 {
            Some(unsafe { slot.assume_init() })
        } else {
            None
        }
    }

    unsafe fn dequeue_raw(&self, out: *mut T, want: u32) -> u32 {
        let prod = &self.header().prod;
        let cons = &self.header().cons;

        let (head, n) = loop {
            let head = cons.head.load(Ordering::Relaxed);
            let prod_tail = prod.tail.load(Ordering::Acquire);
            let available = prod_tail.wrapping_sub(head);
            let n = want.min(available);
            if n == 0 {
                return 0;
            }
            let next = head.wrapping_add(n);
            if self.single_consumer {
                cons.head.store(next, Ordering::Relaxed);
                break (head, n);
            }
            match cons
                .head
                .compare_exchange_weak(head, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break (head, n),
                Err(_) => continue,
            }
        };

        for i in 0..n {
            let index = (head.wrapping_add(i) & self.mask) as usize;
            std::ptr::write(out.add(i as usize), std::ptr::read(self.slots.as_ptr().add(index)));
        }

        if !self.single_consumer {
            while cons.tail.load(Ordering::Acquire) != head {
                std::hint::spin_loop();
            }
        }
        cons.tail.store(head.wrapping_add(n), Ordering::Release);
        n
    }

    /// Number of published, not yet consumed slots
    pub fn occupancy(&self) -> u32 {
        let header = self.header();
        let prod_tail = header.prod.tail.load(Ordering::Acquire);
        let cons_tail = header.cons.tail.load(Ordering::Acquire);
        prod_tail.wrapping_sub(cons_tail)
    }

    /// Number of free slots
    pub fn free_count(&self) -> u32 {
        self.capacity.wrapping_sub(self.occupancy())
    }

    /// Check if the ring is empty
    pub fn is_empty(&self) -> bool {
        self.occupancy() == 0
    }

    /// Check if the ring is full
    pub fn is_full(&self) -> bool {
        self.free_count() == 0
    }

    /// Set the congestion watermark.
    ///
    /// `count` of 0 disables watermarking; `count >= capacity` is rejected.
    /// The watermark is purely advisory: it gates [`is_congested`] and
    /// nothing else, never enqueue admission.
    ///
    /// [`is_congested`]: ShmRing::is_congested
    pub fn set_watermark(&self, count: u32) -> Result<()> {
        if count >= self.capacity {
            return Err(ShmIpcError::invalid_watermark(count, self.capacity));
        }
        let value = if count == 0 { self.capacity } else { count };
        self.header().prod.watermark.store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Current watermark, or `None` when disabled
    pub fn watermark(&self) -> Option<u32> {
        let value = self.header().prod.watermark.load(Ordering::Relaxed);
        if value == self.capacity {
            None
        } else {
            Some(value)
        }
    }

    /// Whether occupancy has reached the watermark (always `false` when
    /// watermarking is disabled)
    pub fn is_congested(&self) -> bool {
        match self.watermark() {
            Some(mark) => self.occupancy() >= mark,
            None => false,
        }
    }

    /// Zero all four cursors.
    ///
    /// Only safe to call while no producer or consumer is active on any
    /// attached process; there is no internal quiescence check.
    pub fn reset(&self) {
        let header = self.header();
        header.prod.head.store(0, Ordering::Release);
        header.prod.tail.store(0, Ordering::Release);
        header.cons.head.store(0, Ordering::Release);
        header.cons.tail.store(0, Ordering::Release);
    }

    /// Get the slot capacity
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Get the ring name
    pub fn name(&self) -> &str {
        self.region.name()
    }

    /// Whether the ring was created in single-producer mode
    pub fn single_producer(&self) -> bool {
        self.single_producer
    }

    /// Whether the ring was created in single-consumer mode
    pub fn single_consumer(&self) -> bool {
        self.single_consumer
    }

    /// Snapshot the ring state for diagnostics
    pub fn stats(&self) -> RingStats {
        let header = self.header();
        let watermark = header.prod.watermark.load(Ordering::Relaxed);
        RingStats {
            name: self.region.name().to_string(),
            capacity: self.capacity,
            prod_head: header.prod.head.load(Ordering::Relaxed),
            prod_tail: header.prod.tail.load(Ordering::Relaxed),
            cons_head: header.cons.head.load(Ordering::Relaxed),
            cons_tail: header.cons.tail.load(Ordering::Relaxed),
            used: self.occupancy(),
            available: self.free_count(),
            // 0 encodes "disabled", matching the dump convention
            watermark: if watermark == self.capacity { 0 } else { watermark },
            single_producer: self.single_producer,
            single_consumer: self.single_consumer,
        }
    }

    /// Unmap the ring and delete its backing file
    pub fn destroy(self) -> Result<()> {
        self.region.destroy()
    }

    /// Force every cursor to `value`, to exercise wraparound arithmetic
    #[cfg(test)]
    pub(crate) fn force_cursors(&self, value: u32) {
        let header = self.header();
        header.prod.head.store(value, Ordering::SeqCst);
        header.prod.tail.store(value, Ordering::SeqCst);
        header.cons.head.store(value, Ordering::SeqCst);
        header.cons.tail.store(value, Ordering::SeqCst);
    }
}

unsafe impl<T: Copy + Send> Send for ShmRing<T> {}
unsafe impl<T: Copy + Send> Sync for ShmRing<T> {}
