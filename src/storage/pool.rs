// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! Append-only arena for out-of-line values.

use parking_lot::Mutex;

use super::backend::{BackendRef, BackendRegion};
use super::StorageResult;

/// Granularity of backend requests; oversized values get a dedicated
/// block.
const POOL_BLOCK_SIZE: usize = 4096;

/// Handle to one pooled value, stored inline in a tile cell. Zero means
/// "no value".
pub type PoolPtr = u64;

pub const NULL_POOL_PTR: PoolPtr = 0;

struct PoolInner {
    blocks: Vec<BackendRegion>,
    /// Bytes used in the last block.
    used: usize,
}

/// Bump allocator over backend blocks. Values are length-prefixed and
/// never move or get reclaimed until the pool drops, so a [`PoolPtr`]
/// stays valid for the lifetime of the owning tile.
///
/// Appends serialize on a mutex; reads are lock-free.
pub struct Pool {
    backend: BackendRef,
    inner: Mutex<PoolInner>,
}

impl Pool {
    pub fn new(backend: BackendRef) -> Pool {
        Pool {
            backend,
            inner: Mutex::new(PoolInner {
                blocks: Vec::new(),
                used: 0,
            }),
        }
    }

    /// Copy `data` into the pool behind a `u32` length prefix and
    /// return its handle.
    pub fn allocate(&self, data: &[u8]) -> StorageResult<PoolPtr> {
        let need = 4 + data.len();
        let mut inner = self.inner.lock();

        let remaining = inner
            .blocks
            .last()
            .map_or(0, |block| block.size() - inner.used);
        if remaining < need {
            let block_size = need.max(POOL_BLOCK_SIZE);
            let block = BackendRegion::allocate(&self.backend, block_size)?;
            inner.blocks.push(block);
            inner.used = 0;
        }

        let block = inner.blocks.last().unwrap();
        // SAFETY: `used..used + need` is within the block and nobody
        // else writes it: appends hold the mutex and published handles
        // never overlap the unconsumed tail.
        let ptr = unsafe {
            let ptr = block.as_ptr().add(inner.used);
            ptr.cast::<u32>()
                .write_unaligned((data.len() as u32).to_le());
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(4), data.len());
            ptr
        };
        inner.used += need;
        Ok(ptr as PoolPtr)
    }

    /// Borrow the bytes behind `handle`.
    ///
    /// # Safety
    ///
    /// `handle` must come from [`Pool::allocate`] on this pool, and the
    /// caller must have observed its publication (tile cells publish
    /// handles through the tile group header's release store).
    pub unsafe fn read(&self, handle: PoolPtr) -> &[u8] {
        debug_assert_ne!(handle, NULL_POOL_PTR);
        let ptr = handle as usize as *const u8;
        let len = u32::from_le(ptr.cast::<u32>().read_unaligned()) as usize;
        std::slice::from_raw_parts(ptr.add(4), len)
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Pool")
            .field("blocks", &inner.blocks.len())
            .field("used", &inner.used)
            .finish()
    }
}
