// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! Raw byte allocators backing tile payloads and pools.
//!
//! A backend hands out flat, zeroed, byte-addressable regions. The
//! in-memory variant draws from the process allocator; the file variant
//! maps regions from files under a directory, which also covers
//! DAX-mounted persistent memory paths.

use std::collections::HashMap;
use std::path::PathBuf;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use memmap2::MmapMut;
use parking_lot::Mutex;

use super::{StorageError, StorageResult};

/// Regions are aligned for any cell type the tiles store.
const REGION_ALIGN: usize = 8;

pub type BackendRef = Arc<dyn StorageBackend>;

/// A flat byte allocator. Implementations must return zeroed regions
/// that stay pinned at their address until released.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    fn allocate_raw(&self, size: usize) -> StorageResult<NonNull<u8>>;

    /// Release a region previously returned by [`allocate_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` and `size` must identify exactly one live allocation made
    /// by this backend, and nothing may touch the region afterwards.
    ///
    /// [`allocate_raw`]: StorageBackend::allocate_raw
    unsafe fn release_raw(&self, ptr: NonNull<u8>, size: usize);
}

/// RAII handle over one backend allocation.
pub struct BackendRegion {
    ptr: NonNull<u8>,
    size: usize,
    backend: BackendRef,
}

// The region is a plain byte buffer; all access synchronization is the
// caller's contract (see Tile and Pool).
unsafe impl Send for BackendRegion {}
unsafe impl Sync for BackendRegion {}

impl BackendRegion {
    pub fn allocate(backend: &BackendRef, size: usize) -> StorageResult<BackendRegion> {
        let ptr = backend.allocate_raw(size)?;
        Ok(BackendRegion {
            ptr,
            size,
            backend: backend.clone(),
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for BackendRegion {
    fn drop(&mut self) {
        // SAFETY: we own the only handle to this allocation.
        unsafe { self.backend.release_raw(self.ptr, self.size) };
    }
}

impl std::fmt::Debug for BackendRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegion")
            .field("size", &self.size)
            .finish()
    }
}

/// Backend drawing zeroed regions from the process allocator.
#[derive(Debug, Default)]
pub struct MemBackend;

impl StorageBackend for MemBackend {
    fn allocate_raw(&self, size: usize) -> StorageResult<NonNull<u8>> {
        let layout = std::alloc::Layout::from_size_align(size.max(1), REGION_ALIGN)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or_else(|| StorageError::Backend("out of memory".into()))
    }

    unsafe fn release_raw(&self, ptr: NonNull<u8>, size: usize) {
        let layout = std::alloc::Layout::from_size_align_unchecked(size.max(1), REGION_ALIGN);
        std::alloc::dealloc(ptr.as_ptr(), layout);
    }
}

/// Backend mapping each region from a file under `dir`. Pointing `dir`
/// at a DAX mount gives the NVM deployment.
pub struct FileBackend {
    dir: PathBuf,
    next_region: AtomicU64,
    /// Live mappings keyed by base address; the mapping must outlive
    /// every pointer handed out for it.
    regions: Mutex<HashMap<usize, (PathBuf, MmapMut)>>,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<FileBackend> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::Io(Box::new(e)))?;
        Ok(FileBackend {
            dir,
            next_region: AtomicU64::new(0),
            regions: Mutex::new(HashMap::new()),
        })
    }
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("dir", &self.dir)
            .field("regions", &self.regions.lock().len())
            .finish()
    }
}

impl StorageBackend for FileBackend {
    fn allocate_raw(&self, size: usize) -> StorageResult<NonNull<u8>> {
        let id = self.next_region.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("region_{id:08}"));
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StorageError::Io(Box::new(e)))?;
        file.set_len(size.max(1) as u64)
            .map_err(|e| StorageError::Io(Box::new(e)))?;
        // SAFETY: the file was just created and is owned by this backend.
        let mut mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| StorageError::Io(Box::new(e)))?;
        let ptr = NonNull::new(mmap.as_mut_ptr())
            .ok_or_else(|| StorageError::Backend("mmap returned null".into()))?;
        self.regions
            .lock()
            .insert(ptr.as_ptr() as usize, (path, mmap));
        Ok(ptr)
    }

    unsafe fn release_raw(&self, ptr: NonNull<u8>, _size: usize) {
        if let Some((path, mmap)) = self.regions.lock().remove(&(ptr.as_ptr() as usize)) {
            drop(mmap);
            let _ = std::fs::remove_file(path);
        }
    }
}
