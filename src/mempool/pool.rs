//! Slab mempool over a shared region
//!
//! Claim protocol: admission first (CAS-increment `outstanding`, rejecting
//! once the pool would be full), then cursor advance to pick a slot, then a
//! CAS on the slot's `claimed` flag. A claimed element travels between
//! processes by slot index; the receiver re-materializes a claim token with
//! [`ShmMempool::get`] and releases it like any other element.

use std::{mem, ptr::NonNull, sync::atomic::Ordering};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ShmIpcError},
    region::{RegionConfig, SharedRegion},
};

use super::header::{element_stride, pool_region_size, ElementHeader, PoolHeader};
use super::stats::PoolStats;

/// Configuration for creating or attaching a shared mempool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Backing region settings
    pub region: RegionConfig,
    /// Payload bytes per element
    pub element_size: u32,
    /// Number of elements; must be a nonzero power of two
    pub capacity: u32,
}

impl PoolConfig {
    /// Create a new pool configuration
    pub fn new(name: impl Into<String>, element_size: u32, capacity: u32) -> Self {
        Self {
            region: RegionConfig::new(name),
            element_size,
            capacity,
        }
    }

    /// Set the backing file path
    pub fn with_file_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.region = self.region.with_file_path(path);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.region.validate()?;
        if self.capacity == 0 || !self.capacity.is_power_of_two() {
            return Err(ShmIpcError::invalid_capacity(self.capacity));
        }
        if self.element_size == 0 {
            return Err(ShmIpcError::invalid_parameter(
                "element_size",
                "Element size must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Fixed-capacity slab allocator shared between processes
#[derive(Debug)]
pub struct ShmMempool {
    /// Backing region; keeps the mapping alive
    region: SharedRegion,
    /// Pool header at the region base
    header: NonNull<PoolHeader>,
    /// Element array following the header
    elements: NonNull<u8>,
    capacity: u32,
    mask: u32,
    element_size: u32,
    stride: usize,
}

impl ShmMempool {
    /// Create a fresh pool or attach to an existing one with the same name.
    ///
    /// A fresh pool starts with both counters at zero and every element
    /// unclaimed. When attaching, the shape stored in the region header
    /// wins and is validated against the configuration.
    pub fn create_or_attach(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let requested = pool_region_size(config.element_size, config.capacity);
        let region = SharedRegion::create_or_open(&config.region, requested)?;

        if region.created() {
            let total_size = region.size() as u64;
            let header = unsafe { &mut *region.as_mut_ptr::<PoolHeader>() };
            header.region.total_size = total_size;
            header.region.element_size = config.element_size;
            header.region.capacity = config.capacity;
            header.region.set_name(&config.region.name);
            *header.cursor.get_mut() = 0;
            *header.outstanding.get_mut() = 0;
            // element headers are zero (unclaimed) in the fresh mapping
        } else {
            let header = unsafe { &*(region.as_mut_ptr::<PoolHeader>() as *const PoolHeader) };
            Self::validate_header(header, &config, region.size())?;
        }

        let header_ptr = unsafe { region.as_mut_ptr::<PoolHeader>() };
        let elements_ptr = unsafe {
            region.as_mut_ptr::<u8>().add(PoolHeader::elements_offset())
        };

        let header = NonNull::new(header_ptr)
            .ok_or_else(|| ShmIpcError::map("Region base pointer is null"))?;
        let elements = NonNull::new(elements_ptr)
            .ok_or_else(|| ShmIpcError::map("Element array pointer is null"))?;

        let stored = unsafe { header.as_ref() };
        let capacity = stored.region.capacity;
        let mask = stored.region.mask();
        let element_size = stored.region.element_size;

        Ok(Self {
            region,
            header,
            elements,
            capacity,
            mask,
            element_size,
            stride: element_stride(element_size),
        })
    }

    /// Attach-time shape validation of an existing header
    fn validate_header(header: &PoolHeader, config: &PoolConfig, mapped: usize) -> Result<()> {
        let name = &config.region.name;
        if header.region.element_size != config.element_size {
            return Err(ShmIpcError::region_mismatch(
                name,
                format!(
                    "stored element size {} differs from requested {}",
                    header.region.element_size, config.element_size
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
        if mapped < pool_region_size(header.region.element_size, capacity) {
            return Err(ShmIpcError::region_mismatch(
                name,
                "mapped region smaller than header plus element array",
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

    fn header(&self) -> &PoolHeader {
        unsafe { self.header.as_ref() }
    }

    fn element_header(&self, index: u32) -> &ElementHeader {
        debug_assert!(index < self.capacity);
        unsafe {
            &*(self
                .elements
                .as_ptr()
                .add(index as usize * self.stride)
                .cast::<ElementHeader>())
        }
    }

    fn payload_ptr(&self, index: u32) -> *mut u8 {
        unsafe {
            self.elements
                .as_ptr()
                .add(index as usize * self.stride + mem::size_of::<ElementHeader>())
        }
    }

    /// Claim one element.
    ///
    /// Fails with [`ShmIpcError::PoolFull`] once admitting another claim
    /// would reach capacity (a capacity-N pool admits N-1 concurrent
    /// claims, preserving the original admission rule), and with
    /// [`ShmIpcError::SlotCollision`] when the cursor lands on a slot that
    /// is still claimed. On collision the admission count is rolled back
    /// before returning, so repeated collisions do not strand capacity;
    /// the caller decides whether to retry.
    pub fn alloc(&self) -> Result<Element<'_>> {
        let header = self.header();

        // admission: reserve a unit of capacity before picking a slot
        loop {
            let used = header.outstanding.load(Ordering::Relaxed);
            if used + 1 >= self.capacity {
                return Err(ShmIpcError::pool_full(self.capacity));
            }
            if header
                .outstanding
                .compare_exchange_weak(used, used + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }

        let seq = header.cursor.fetch_add(1, Ordering::Relaxed);
        let slot = seq & self.mask;

        let element = self.element_header(slot);
        if element
            .claimed
            .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            header.outstanding.fetch_sub(1, Ordering::Release);
            return Err(ShmIpcError::slot_collision(slot));
        }

        element.pid.store(std::process::id(), Ordering::Relaxed);
        element.seq.store(seq, Ordering::Relaxed);
        element.status.store(0, Ordering::Relaxed);
        element.data_len.store(0, Ordering::Relaxed);

        Ok(Element { pool: self, index: slot })
    }

    /// Re-materialize a claim token for an element received by index from
    /// a peer process. The slot must currently be claimed.
    pub fn get(&self, index: u32) -> Result<Element<'_>> {
        if index >= self.capacity {
            return Err(ShmIpcError::invalid_parameter(
                "index",
                format!("element index {} out of range (capacity {})", index, self.capacity),
            ));
        }
        if self.element_header(index).claimed.load(Ordering::Acquire) == 0 {
            return Err(ShmIpcError::unclaimed_release(index));
        }
        Ok(Element { pool: self, index })
    }

    /// Release a claimed element back to the pool.
    ///
    /// Releasing through a token whose slot is no longer claimed reports
    /// [`ShmIpcError::DoubleFree`] instead of corrupting the counters.
    pub fn free(&self, element: Element<'_>) -> Result<()> {
        if !std::ptr::eq(element.pool, self) {
            return Err(ShmIpcError::invalid_parameter(
                "element",
                "Element belongs to a different pool handle",
            ));
        }

        let header = self.header();
        let slot = element.index;

        if self
            .element_header(slot)
            .claimed
            .compare_exchange(1, 0, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            return Err(ShmIpcError::double_free(slot));
        }

        loop {
            let used = header.outstanding.load(Ordering::Relaxed);
            if header
                .outstanding
                .compare_exchange_weak(
                    used,
                    used.wrapping_sub(1),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break;
            }
        }
        Ok(())
    }

    /// Count of currently claimed elements
    pub fn outstanding(&self) -> u32 {
        self.header().outstanding.load(Ordering::Acquire)
    }

    /// Get the element capacity
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Get the payload size of each element
    pub fn element_size(&self) -> u32 {
        self.element_size
    }

    /// Get the pool name
    pub fn name(&self) -> &str {
        self.region.name()
    }

    /// Snapshot the pool state for diagnostics
    pub fn stats(&self) -> PoolStats {
        let header = self.header();
        let outstanding = header.outstanding.load(Ordering::Relaxed);
        PoolStats {
            name: self.region.name().to_string(),
            capacity: self.capacity,
            element_size: self.element_size,
            cursor: header.cursor.load(Ordering::Relaxed),
            outstanding,
            available: self.capacity - outstanding.min(self.capacity),
        }
    }

    /// Unmap the pool and delete its backing file
    pub fn destroy(self) -> Result<()> {
        self.region.destroy()
    }
}

unsafe impl Send for ShmMempool {}
unsafe impl Sync for ShmMempool {}

/// Claim token for one mempool element.
///
/// Holding the token is what entitles a caller to touch the payload; it is
/// surrendered to [`ShmMempool::free`]. Dropping a token without freeing
/// leaves the element claimed (intentionally: the element may have been
/// handed to a peer by index).
#[derive(Debug)]
pub struct Element<'a> {
    pool: &'a ShmMempool,
    index: u32,
}

impl<'a> Element<'a> {
    /// Slot index of this element; this is what travels between processes
    pub fn index(&self) -> u32 {
        self.index
    }

    fn header(&self) -> &ElementHeader {
        self.pool.element_header(self.index)
    }

    /// Process id of the claimant
    pub fn pid(&self) -> u32 {
        self.header().pid.load(Ordering::Relaxed)
    }

    /// Allocation sequence number (cursor value at claim time)
    pub fn seq(&self) -> u32 {
        self.header().seq.load(Ordering::Relaxed)
    }

    /// Caller-defined status word
    pub fn status(&self) -> u32 {
        self.header().status.load(Ordering::Acquire)
    }

    /// Set the caller-defined status word
    pub fn set_status(&self, status: u32) {
        self.header().status.store(status, Ordering::Release);
    }

    /// Valid payload length in bytes
    pub fn len(&self) -> usize {
        self.header().data_len.load(Ordering::Acquire) as usize
    }

    /// Check if no payload has been written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload capacity in bytes
    pub fn capacity(&self) -> usize {
        self.pool.element_size as usize
    }

    /// Copy `bytes` into the payload and record the length
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.capacity() {
            return Err(ShmIpcError::invalid_parameter(
                "bytes",
                format!(
                    "payload of {} bytes exceeds element size {}",
                    bytes.len(),
                    self.capacity()
                ),
            ));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.pool.payload_ptr(self.index),
                bytes.len(),
            );
        }
        self.header()
            .data_len
            .store(bytes.len() as u32, Ordering::Release);
        Ok(())
    }

    /// Record the valid payload length after writing through `payload_mut`
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.capacity() {
            return Err(ShmIpcError::invalid_parameter(
                "len",
                format!("length {} exceeds element size {}", len, self.capacity()),
            ));
        }
        self.header().data_len.store(len as u32, Ordering::Release);
        Ok(())
    }

    /// Valid payload bytes
    pub fn payload(&self) -> &[u8] {
        let len = self.len().min(self.capacity());
        unsafe { std::slice::from_raw_parts(self.pool.payload_ptr(self.index), len) }
    }

    /// Full writable payload slice of `capacity()` bytes
    pub fn payload_mut(&mut self) -> &mut [u8] {
        unsafe {
            std::slice::from_raw_parts_mut(self.pool.payload_ptr(self.index), self.capacity())
        }
    }
}
