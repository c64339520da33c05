//! # shmipc - Lock-Free Shared-Memory IPC Primitives
//!
//! shmipc provides two low-level, lock-free structures for inter-process
//! communication over POSIX shared memory: a fixed-capacity circular
//! message ring and a fixed-size-element slab mempool. Both live in a
//! memory-mapped region backed by a named file; any process that names the
//! same file attaches the same structure.
//!
//! ## Features
//!
//! - **File-backed regions**: one backing file per ring/pool, created
//!   exclusively so racing creators resolve to a single owner
//! - **Bulk ring operations**: multi-producer/multi-consumer cursor
//!   reservation via CAS, with single-producer/consumer fast paths
//! - **Watermark signaling**: advisory congestion threshold, never
//!   admission control
//! - **Slab mempool**: atomic claim/release of equal-size elements,
//!   exchanged between processes by slot index
//! - **Typed errors**: capacity exhaustion is a short count or `PoolFull`;
//!   protocol violations surface as explicit error kinds
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              Backing file (mmap)                │
//! ├─────────────────────────────────────────────────┤
//! │  RegionHeader │ prod cursors │ cons cursors │.. │   ring
//! │  RegionHeader │ cursor/used  │ element array    │   mempool
//! └─────────────────────────────────────────────────┘
//!        ▲                 ▲                ▲
//!   process A          process B        process C
//! ```
//!
//! After the initial attach no operation enters the kernel: the hot path
//! is atomic cursor arithmetic plus copies into exclusively reserved
//! slots. Bulk operations never block; a short count (possibly 0) is the
//! backpressure signal. The one liveness caveat is inherent to the
//! reservation protocol: a peer that dies between reserving and
//! publishing stalls later peers, which only external process monitoring
//! can detect.
//!
//! ## Example
//!
//! ```no_run
//! use shmipc::{RingConfig, ShmRing};
//!
//! let ring: ShmRing<u64> = ShmRing::create_or_attach(
//!     RingConfig::new("demo_ring", 1024).with_single_producer(true),
//! )?;
//! ring.enqueue_bulk(&[1, 2, 3]);
//! let mut out = [0u64; 3];
//! assert_eq!(ring.dequeue_bulk(&mut out), 3);
//! # Ok::<(), shmipc::ShmIpcError>(())
//! ```

pub mod error;
pub mod mempool;
pub mod region;
pub mod ring;

// Main API re-exports
pub use error::{Result, ShmIpcError};
pub use mempool::{Element, PoolConfig, PoolStats, ShmMempool};
pub use region::{RegionConfig, RegionHeader, SharedRegion};
pub use ring::{RingConfig, RingStats, ShmRing};
