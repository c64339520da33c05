//! Shared-memory slab mempool

pub mod header;
pub mod pool;
pub mod stats;


pub use header::{ElementHeader, PoolHeader};
pub use pool::{Element, PoolConfig, ShmMempool};
pub use stats::PoolStats;
