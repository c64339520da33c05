//! Error types and handling for shmipc

/// Result type alias for shmipc operations
pub type Result<T> = std::result::Result<T, ShmIpcError>;

/// Error types for shared-memory ring and mempool operations
#[derive(Debug, thiserror::Error)]
pub enum ShmIpcError {
    /// I/O related errors (backing file open/resize, unlink)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Memory mapping failures
    #[error("Mapping error: {message}")]
    Map { message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Capacity is zero or not a power of two
    #[error("Invalid capacity: {capacity} (must be a nonzero power of two)")]
    InvalidCapacity { capacity: u32 },

    /// Watermark threshold at or above ring capacity
    #[error("Invalid watermark: {requested} (capacity {capacity})")]
    InvalidWatermark { requested: u32, capacity: u32 },

    /// Existing region header does not match the requested shape
    #[error("Region mismatch for <{name}>: {message}")]
    RegionMismatch { name: String, message: String },

    /// Mempool has no admissible elements left
    #[error("Mempool full: capacity {capacity}")]
    PoolFull { capacity: u32 },

    /// Mempool cursor landed on a slot that is still claimed
    #[error("Slot collision: element {slot} is still claimed")]
    SlotCollision { slot: u32 },

    /// Release of an element that is not currently claimed
    #[error("Double free: element {slot} is not claimed")]
    DoubleFree { slot: u32 },

    /// Hand-off lookup of a slot that is not currently claimed
    #[error("Unclaimed element: {slot}")]
    UnclaimedRelease { slot: u32 },
}

impl ShmIpcError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a mapping error
    pub fn map(message: impl Into<String>) -> Self {
        Self::Map {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an invalid capacity error
    pub fn invalid_capacity(capacity: u32) -> Self {
        Self::InvalidCapacity { capacity }
    }

    /// Create an invalid watermark error
    pub fn invalid_watermark(requested: u32, capacity: u32) -> Self {
        Self::InvalidWatermark {
            requested,
            capacity,
        }
    }

    /// Create a region mismatch error
    pub fn region_mismatch(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RegionMismatch {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a pool full error
    pub fn pool_full(capacity: u32) -> Self {
        Self::PoolFull { capacity }
    }

    /// Create a slot collision error
    pub fn slot_collision(slot: u32) -> Self {
        Self::SlotCollision { slot }
    }

    /// Create a double free error
    pub fn double_free(slot: u32) -> Self {
        Self::DoubleFree { slot }
    }

    /// Create an unclaimed element error
    pub fn unclaimed_release(slot: u32) -> Self {
        Self::UnclaimedRelease { slot }
    }
}

// Convert from common error types
impl From<std::io::Error> for ShmIpcError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}
