//! Read-only ring diagnostics

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a ring's cursors and occupancy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingStats {
    pub name: String,
    pub capacity: u32,
    pub prod_head: u32,
    pub prod_tail: u32,
    pub cons_head: u32,
    pub cons_tail: u32,
    pub used: u32,
    pub available: u32,
    /// 0 when watermarking is disabled
    pub watermark: u32,
    pub single_producer: bool,
    pub single_consumer: bool,
}

impl std::fmt::Display for RingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ring <{}>", self.name)?;
        writeln!(f, "  size={}", self.capacity)?;
        writeln!(f, "  ct={}", self.cons_tail)?;
        writeln!(f, "  ch={}", self.cons_head)?;
        writeln!(f, "  pt={}", self.prod_tail)?;
        writeln!(f, "  ph={}", self.prod_head)?;
        writeln!(f, "  used={}", self.used)?;
        writeln!(f, "  avail={}", self.available)?;
        write!(f, "  watermark={}", self.watermark)
    }
}
