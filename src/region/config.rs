//! Configuration for shared memory regions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, ShmIpcError};

/// Capacity of the fixed-length name field in a region header
pub const NAME_CAPACITY: usize = 32;

/// Maximum region name length (one byte is reserved for the terminator)
pub const MAX_NAME_LEN: usize = NAME_CAPACITY - 1;

/// Configuration for creating or attaching a shared memory region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Name of the region; also the default backing file name
    pub name: String,
    /// Optional explicit path for the backing file
    pub file_path: Option<PathBuf>,
    /// Unix permissions used when the backing file is created
    pub permissions: u32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            file_path: None,
            permissions: 0o644,
        }
    }
}

impl RegionConfig {
    /// Create a new region configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the backing file path
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Set the permissions for the backing file
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ShmIpcError::invalid_parameter(
                "name",
                "Region name cannot be empty",
            ));
        }

        if self.name.len() > MAX_NAME_LEN {
            return Err(ShmIpcError::invalid_parameter(
                "name",
                format!("Region name exceeds {} bytes", MAX_NAME_LEN),
            ));
        }

        if self.name.bytes().any(|b| b == 0) {
            return Err(ShmIpcError::invalid_parameter(
                "name",
                "Region name contains null bytes",
            ));
        }

        Ok(())
    }

    /// Get the backing file path for this region
    pub fn backing_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/dev/shm/{}", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_names() {
        assert!(RegionConfig::new("").validate().is_err());
        assert!(RegionConfig::new("x".repeat(MAX_NAME_LEN + 1)).validate().is_err());
        assert!(RegionConfig::new("ok_name").validate().is_ok());
    }

    #[test]
    fn test_backing_path_default_and_override() {
        let config = RegionConfig::new("ring0");
        assert_eq!(config.backing_path(), PathBuf::from("/dev/shm/ring0"));

        let config = RegionConfig::new("ring0").with_file_path("/tmp/ring0");
        assert_eq!(config.backing_path(), PathBuf::from("/tmp/ring0"));
    }
}
