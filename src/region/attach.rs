//! File-backed shared memory regions
//!
//! A region is one mmap'd block shared by every process that names the same
//! backing file. Creation and attach are decided atomically by an exclusive
//! create of the backing file: the winner formats the region, losers attach
//! to whatever the stored header describes. All structures kept inside a
//! region use indices/offsets from the region base, so no fixed virtual
//! address is needed and mappings may land anywhere.

use std::{
    fs::{File, OpenOptions},
    io::ErrorKind,
    mem,
    os::unix::fs::OpenOptionsExt,
    path::PathBuf,
};

use memmap2::{MmapMut, MmapOptions};

use crate::error::{Result, ShmIpcError};

use super::config::{RegionConfig, NAME_CAPACITY};

/// Header stored at offset 0 of every region, common to rings and mempools
#[repr(C)]
#[derive(Debug)]
pub struct RegionHeader {
    /// Byte size of the whole mapped region, fixed at creation
    pub total_size: u64,
    /// Size of one element/slot in bytes
    pub element_size: u32,
    /// Number of elements/slots; always a power of two
    pub capacity: u32,
    /// NUL-padded region name, for diagnostics and attach validation
    pub name: [u8; NAME_CAPACITY],
}

impl RegionHeader {
    /// Store a name into the fixed-length field (NUL padded)
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; NAME_CAPACITY];
        let bytes = name.as_bytes();
        self.name[..bytes.len()].copy_from_slice(bytes);
    }

    /// Get the stored name up to the first NUL
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_CAPACITY);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// Derive the index wraparound mask from the stored capacity
    pub fn mask(&self) -> u32 {
        self.capacity.wrapping_sub(1)
    }
}

/// A file-backed shared memory region
#[derive(Debug)]
pub struct SharedRegion {
    /// Memory-mapped region
    mmap: MmapMut,
    /// Backing file path (identity of the region)
    path: PathBuf,
    /// Region name
    name: String,
    /// Whether this process created (and must format) the region
    created: bool,
    /// Backing file handle, kept alive for the lifetime of the mapping
    _file: File,
}

impl SharedRegion {
    /// Create a new region or attach to an existing one.
    ///
    /// `requested_size` is the unaligned byte size the caller needs
    /// (header plus element storage); fresh regions are sized to the next
    /// page boundary. When attaching, the size stored in the existing
    /// header wins and `requested_size` is ignored.
    pub fn create_or_open(config: &RegionConfig, requested_size: usize) -> Result<Self> {
        config.validate()?;
        let path = config.backing_path();

        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(config.permissions)
            .open(&path)
        {
            Ok(file) => Self::create(config, path, file, requested_size),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Self::attach(config, path),
            Err(e) => Err(ShmIpcError::from_io(e, "Failed to create backing file")),
        }
    }

    /// Size and map a freshly created backing file
    fn create(
        config: &RegionConfig,
        path: PathBuf,
        file: File,
        requested_size: usize,
    ) -> Result<Self> {
        let total_size = page_align(requested_size.max(mem::size_of::<RegionHeader>()));

        file.set_len(total_size as u64)
            .map_err(|e| ShmIpcError::from_io(e, "Failed to size backing file"))?;

        let mmap = unsafe {
            MmapOptions::new()
                .len(total_size)
                .map_mut(&file)
                .map_err(|e| ShmIpcError::map(format!("Failed to map fresh region: {}", e)))?
        };

        Ok(Self {
            mmap,
            path,
            name: config.name.clone(),
            created: true,
            _file: file,
        })
    }

    /// Attach to an existing region: probe-map the header to learn the
    /// stored total size, then map the full region at that size.
    fn attach(config: &RegionConfig, path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ShmIpcError::from_io(e, "Failed to open existing backing file"))?;

        let file_len = file
            .metadata()
            .map_err(|e| ShmIpcError::from_io(e, "Failed to stat backing file"))?
            .len() as usize;

        if file_len < mem::size_of::<RegionHeader>() {
            return Err(ShmIpcError::region_mismatch(
                &config.name,
                "backing file smaller than a region header",
            ));
        }

        let total_size = {
            let probe = unsafe {
                MmapOptions::new()
                    .len(mem::size_of::<RegionHeader>())
                    .map_mut(&file)
                    .map_err(|e| ShmIpcError::map(format!("Failed to probe-map region: {}", e)))?
            };
            let header = unsafe { &*(probe.as_ptr() as *const RegionHeader) };
            header.total_size as usize
        };

        if total_size < mem::size_of::<RegionHeader>() || total_size > file_len {
            return Err(ShmIpcError::region_mismatch(
                &config.name,
                format!(
                    "stored total_size {} inconsistent with file length {}",
                    total_size, file_len
                ),
            ));
        }

        let mmap = unsafe {
            MmapOptions::new()
                .len(total_size)
                .map_mut(&file)
                .map_err(|e| ShmIpcError::map(format!("Failed to map existing region: {}", e)))?
        };

        Ok(Self {
            mmap,
            path,
            name: config.name.clone(),
            created: false,
            _file: file,
        })
    }

    /// Whether this process created the region and owns its formatting
    pub fn created(&self) -> bool {
        self.created
    }

    /// Get the size of the mapped region
    pub fn size(&self) -> usize {
        self.mmap.len()
    }

    /// Get the name of the region
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the backing file path
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Shared view of the region header
    pub fn header(&self) -> &RegionHeader {
        unsafe { &*(self.mmap.as_ptr() as *const RegionHeader) }
    }

    /// Exclusive view of the region header, for formatting after creation
    pub fn header_mut(&mut self) -> &mut RegionHeader {
        unsafe { &mut *(self.mmap.as_mut_ptr() as *mut RegionHeader) }
    }

    /// Get a mutable typed pointer to the start of the region
    ///
    /// # Safety
    /// Mutation through the returned pointer races with every attached
    /// process; callers must restrict writes to atomics or exclusively
    /// reserved slots.
    pub unsafe fn as_mut_ptr<T>(&self) -> *mut T {
        self.mmap.as_ptr() as *mut T
    }

    /// Unmap the region and delete its backing file.
    ///
    /// The file is only unlinked once the mapping has been dropped; a peer
    /// that is still attached keeps its mapping (and the inode) alive.
    pub fn destroy(self) -> Result<()> {
        let Self {
            mmap, path, _file, ..
        } = self;
        drop(mmap);
        drop(_file);
        std::fs::remove_file(&path)
            .map_err(|e| ShmIpcError::from_io(e, "Failed to unlink backing file"))
    }
}

unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

/// Round `len` up to the next page boundary
fn page_align(len: usize) -> usize {
    let page = page_size();
    (len + page - 1) & !(page - 1)
}

/// System page size, with the historical 4 KiB fallback
fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        4096
    } else {
        size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(dir: &tempfile::TempDir, name: &str) -> RegionConfig {
        RegionConfig::new(name).with_file_path(dir.path().join(name))
    }

    #[test]
    fn test_create_then_attach() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir, "region0");

        let mut region = SharedRegion::create_or_open(&config, 1024).unwrap();
        assert!(region.created());
        assert!(region.size() >= 1024);

        let size = region.size();
        let header = region.header_mut();
        header.total_size = size as u64;
        header.element_size = 8;
        header.capacity = 16;
        header.set_name("region0");

        let attached = SharedRegion::create_or_open(&config, 0).unwrap();
        assert!(!attached.created());
        assert_eq!(attached.size(), size);
        assert_eq!(attached.header().capacity, 16);
        assert_eq!(attached.header().name(), "region0");
    }

    #[test]
    fn test_attach_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short");
        std::fs::write(&path, b"tiny").unwrap();

        let config = RegionConfig::new("short").with_file_path(&path);
        let err = SharedRegion::create_or_open(&config, 4096).unwrap_err();
        assert!(matches!(err, ShmIpcError::RegionMismatch { .. }));
    }

    #[test]
    fn test_destroy_removes_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir, "gone");
        let path = config.backing_path();

        let region = SharedRegion::create_or_open(&config, 4096).unwrap();
        assert!(path.exists());
        region.destroy().unwrap();
        assert!(!path.exists());
    }
}
