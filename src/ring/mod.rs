//! Lock-free shared-memory ring

pub mod header;
pub mod ring;
pub mod stats;


pub use header::{ConsumerCursors, ProducerCursors, RingHeader};
pub use ring::{RingConfig, ShmRing};
pub use stats::RingStats;
