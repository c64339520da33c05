//! Shared memory region creation, attach and layout

pub mod attach;
pub mod config;

pub use attach::{RegionHeader, SharedRegion};
pub use config::{RegionConfig, MAX_NAME_LEN, NAME_CAPACITY};
