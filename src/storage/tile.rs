// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! A tile: the dense column-group payload for one slot range.

use std::sync::atomic::{AtomicU8, Ordering};

use super::backend::{BackendRef, BackendRegion};
use super::pool::{Pool, NULL_POOL_PTR};
use super::{StorageError, StorageResult};
use crate::catalog::Schema;
use crate::types::{DataTypeKind, DataValue, SlotId, TileGroupId, TileId};

/// Row-major storage of a contiguous slice of columns for a fixed
/// number of slots, plus a pool for out-of-line values.
///
/// NULL is tracked out of band: one bit per cell in `nulls`, so the
/// full value range of every type stays storable. The mask bytes are
/// atomic because neighboring slots share a byte and each slot has its
/// own exclusive writer.
///
/// A tile never synchronizes payload access on its own: slot
/// exclusivity for writers and publication ordering for readers both
/// come from the owning tile group's header.
pub struct Tile {
    tile_id: TileId,
    tile_group_id: TileGroupId,
    schema: Schema,
    num_slots: usize,
    data: BackendRegion,
    /// Cell null mask, bit index `slot * column_count + column`; a set
    /// bit means NULL.
    nulls: Box<[AtomicU8]>,
    pool: Pool,
}

impl Tile {
    pub fn new(
        tile_id: TileId,
        tile_group_id: TileGroupId,
        backend: &BackendRef,
        schema: Schema,
        num_slots: usize,
    ) -> StorageResult<Tile> {
        let data = BackendRegion::allocate(backend, schema.tuple_width() * num_slots)?;
        let mask_bytes = (num_slots * schema.column_count() + 7) / 8;
        Ok(Tile {
            tile_id,
            tile_group_id,
            schema,
            num_slots,
            data,
            nulls: (0..mask_bytes).map(|_| AtomicU8::new(0)).collect(),
            pool: Pool::new(backend.clone()),
        })
    }

    pub fn tile_id(&self) -> TileId {
        self.tile_id
    }

    pub fn tile_group_id(&self) -> TileGroupId {
        self.tile_group_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn slot_count(&self) -> usize {
        self.num_slots
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    fn cell_ptr(&self, slot: SlotId, column: usize) -> *mut u8 {
        assert!((slot as usize) < self.num_slots, "slot {slot} out of range");
        let offset = slot as usize * self.schema.tuple_width() + self.schema.offset(column);
        // SAFETY: the offset is within the region by construction.
        unsafe { self.data.as_ptr().add(offset) }
    }

    fn null_bit(&self, slot: SlotId, column: usize) -> (usize, u8) {
        assert!((slot as usize) < self.num_slots, "slot {slot} out of range");
        let bit = slot as usize * self.schema.column_count() + column;
        (bit / 8, 1 << (bit % 8))
    }

    fn cell_is_null(&self, slot: SlotId, column: usize) -> bool {
        let (byte, mask) = self.null_bit(slot, column);
        self.nulls[byte].load(Ordering::Relaxed) & mask != 0
    }

    fn set_cell_null(&self, slot: SlotId, column: usize, null: bool) {
        let (byte, mask) = self.null_bit(slot, column);
        if null {
            self.nulls[byte].fetch_or(mask, Ordering::Relaxed);
        } else {
            self.nulls[byte].fetch_and(!mask, Ordering::Relaxed);
        }
    }

    /// Write `value` into the cell at (`slot`, `column`). Out-of-line
    /// values are appended to the pool and referenced by handle.
    ///
    /// # Safety
    ///
    /// The caller must own `slot` exclusively, i.e. hold it between
    /// `reserve_slot` and the commit/abort transition in the owning
    /// tile group's header. No reader may observe the slot before the
    /// header publishes it.
    pub unsafe fn set_value(
        &self,
        slot: SlotId,
        column: usize,
        value: &DataValue,
    ) -> StorageResult<()> {
        let desc = self.schema.column(column);
        if value.is_null() {
            self.set_cell_null(slot, column, true);
            return Ok(());
        }
        let ptr = self.cell_ptr(slot, column);
        match (desc.kind(), value) {
            (DataTypeKind::Bool, DataValue::Bool(b)) => ptr.write(*b as u8),
            (DataTypeKind::Int32, DataValue::Int32(v)) => {
                ptr.cast::<i32>().write_unaligned(*v);
            }
            (DataTypeKind::Int64, DataValue::Int64(v)) => {
                ptr.cast::<i64>().write_unaligned(*v);
            }
            (DataTypeKind::Float64, DataValue::Float64(v)) => {
                ptr.cast::<f64>().write_unaligned(*v);
            }
            (DataTypeKind::Varchar(max), DataValue::String(s)) => {
                if let Some(max) = max {
                    if s.len() as u64 > max {
                        return Err(StorageError::ValueTooLong {
                            column: desc.name().into(),
                            max,
                        });
                    }
                }
                let handle = self.pool.allocate(s.as_bytes())?;
                ptr.cast::<u64>().write_unaligned(handle);
            }
            (kind, value) => {
                return Err(StorageError::TypeMismatch {
                    column: desc.name().into(),
                    expected: kind.name(),
                    actual: format!("{value:?}"),
                });
            }
        }
        self.set_cell_null(slot, column, false);
        Ok(())
    }

    /// Read the cell at (`slot`, `column`) back into a value.
    ///
    /// # Safety
    ///
    /// The caller must have observed the slot through the owning
    /// header: either it owns the slot, or it acquired the header's
    /// published owner marker, which orders the cell bytes before this
    /// read. Concurrent `get_value` calls on any slots are fine.
    pub unsafe fn get_value(&self, slot: SlotId, column: usize) -> DataValue {
        if self.cell_is_null(slot, column) {
            return DataValue::Null;
        }
        let ptr = self.cell_ptr(slot, column).cast_const();
        match self.schema.column(column).kind() {
            DataTypeKind::Bool => DataValue::Bool(ptr.read() != 0),
            DataTypeKind::Int32 => DataValue::Int32(ptr.cast::<i32>().read_unaligned()),
            DataTypeKind::Int64 => DataValue::Int64(ptr.cast::<i64>().read_unaligned()),
            DataTypeKind::Float64 => DataValue::Float64(ptr.cast::<f64>().read_unaligned()),
            DataTypeKind::Varchar(_) => match ptr.cast::<u64>().read_unaligned() {
                // a cell that was never written
                NULL_POOL_PTR => DataValue::Null,
                handle => {
                    DataValue::String(String::from_utf8_lossy(self.pool.read(handle)).into_owned())
                }
            },
        }
    }
}

impl std::fmt::Debug for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tile")
            .field("tile_id", &self.tile_id)
            .field("tile_group_id", &self.tile_group_id)
            .field("columns", &self.schema.column_count())
            .field("slots", &self.num_slots)
            .finish()
    }
}
