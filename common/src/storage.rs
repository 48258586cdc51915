//! Code for storage structures

use std::path::{Path, PathBuf};

/// The errors that can occur when opening battery backed storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing file could not be opened or resized
    #[error("unable to open {0}: {1}")]
    Open(PathBuf, std::io::ErrorKind),
    /// The backing file could not be memory mapped
    #[error("unable to map {0}: {1}")]
    Map(PathBuf, std::io::ErrorKind),
}

/// Where the bytes of a storage object live
enum Backing {
    /// The vec is battery backed by a file
    Persistent(PathBuf, memmap2::MmapMut),
    /// The vec is simply a plain vector
    Volatile(Vec<u8>),
}

/// A vec that could be battery backed
pub struct PersistentStorage {
    /// The actual contents
    backing: Backing,
    /// Set whenever a byte is written, cleared by whoever persists the contents
    dirty: bool,
}

impl Clone for PersistentStorage {
    fn clone(&self) -> Self {
        Self {
            backing: Backing::Volatile(self.contents().to_vec()),
            dirty: self.dirty,
        }
    }
}

impl std::fmt::Debug for PersistentStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStorage")
            .field("path", &self.path())
            .field("len", &self.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl std::ops::Index<usize> for PersistentStorage {
    type Output = u8;

    fn index(&self, index: usize) -> &Self::Output {
        &self.contents()[index]
    }
}

impl Drop for PersistentStorage {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl PersistentStorage {
    /// Create a volatile storage object of the given size, filled with zeros.
    pub fn new_volatile(size: usize) -> Self {
        Self {
            backing: Backing::Volatile(vec![0; size]),
            dirty: false,
        }
    }

    /// Create a volatile storage object from existing contents.
    pub fn from_vec(v: Vec<u8>) -> Self {
        Self {
            backing: Backing::Volatile(v),
            dirty: false,
        }
    }

    /// Open (or create) a file of at least size bytes and map it. The existing contents of the file are kept.
    pub fn open(p: &Path, size: usize) -> Result<Self, StorageError> {
        if size == 0 {
            return Ok(Self::new_volatile(0));
        }
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(p)
            .map_err(|e| StorageError::Open(p.to_path_buf(), e.kind()))?;
        let current = file
            .metadata()
            .map_err(|e| StorageError::Open(p.to_path_buf(), e.kind()))?
            .len();
        if current < size as u64 {
            file.set_len(size as u64)
                .map_err(|e| StorageError::Open(p.to_path_buf(), e.kind()))?;
        }
        let mm = unsafe { memmap2::MmapOptions::new().len(size).map_mut(&file) }
            .map_err(|e| StorageError::Map(p.to_path_buf(), e.kind()))?;
        Ok(Self {
            backing: Backing::Persistent(p.to_path_buf(), mm),
            dirty: false,
        })
    }

    /// The file backing the contents, if there is one
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Persistent(pb, _) => Some(pb),
            Backing::Volatile(_) => None,
        }
    }

    /// Convenience function for determining if the contents are empty.
    pub fn is_empty(&self) -> bool {
        self.contents().is_empty()
    }

    /// The length of the contents
    pub fn len(&self) -> usize {
        self.contents().len()
    }

    /// The address mask for the contents, zero when there is nothing to address.
    pub fn mask(&self) -> u32 {
        match self.len() {
            0 => 0,
            l => (l.next_power_of_two() - 1) as u32,
        }
    }

    /// Read a byte, None when out of range
    pub fn get(&self, index: usize) -> Option<u8> {
        self.contents().get(index).copied()
    }

    /// Write a byte, silently dropping writes that are out of range
    pub fn set(&mut self, index: usize, data: u8) {
        if let Some(b) = self.contents_mut().get_mut(index) {
            *b = data;
            self.dirty = true;
        }
    }

    /// Has anything been written since the last call to clear_dirty?
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the contents as saved
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Flush the contents out to the backing file, if there is one
    pub fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.backing {
            Backing::Persistent(_, mm) => mm.flush(),
            Backing::Volatile(_) => Ok(()),
        }
    }

    /// Retrieve a reference to the contents
    pub fn contents(&self) -> &[u8] {
        match &self.backing {
            Backing::Persistent(_pb, mm) => mm.as_ref(),
            Backing::Volatile(v) => &v[..],
        }
    }

    /// Retrieve a mutable reference to the contents
    fn contents_mut(&mut self) -> &mut [u8] {
        match &mut self.backing {
            Backing::Persistent(_pb, mm) => mm.as_mut(),
            Backing::Volatile(v) => &mut v[..],
        }
    }
}
