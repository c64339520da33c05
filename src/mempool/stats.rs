//! Read-only mempool diagnostics

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a pool's counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub name: String,
    pub capacity: u32,
    pub element_size: u32,
    pub cursor: u32,
    pub outstanding: u32,
    pub available: u32,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "mempool <{}>", self.name)?;
        writeln!(f, "  capacity={}", self.capacity)?;
        writeln!(f, "  elemt_size={}", self.element_size)?;
        writeln!(f, "  pos={}", self.cursor)?;
        writeln!(f, "  used={}", self.outstanding)?;
        write!(f, "  avail={}", self.available)
    }
}
