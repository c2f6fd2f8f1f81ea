// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! A tile group: one horizontal partition of a table.
//!
//! ```text
//! < <Tile 0> <Tile 1> .. <Tile n> >
//! ```
//!
//! The group binds one [`TileGroupHeader`] to a vector of tiles laid
//! out by the table's tile partition; all tiles share the group's slot
//! count. See [`TileGroupHeader`] for the MVCC protocol.

use itertools::Itertools;
use parking_lot::Mutex;

use super::backend::BackendRef;
use super::tile::Tile;
use super::tile_group_header::TileGroupHeader;
use super::{StorageError, StorageResult};
use crate::catalog::{ColumnMap, Manager, Schema, TableRefId};
use crate::types::{Cid, ColumnId, DataValue, Row, SlotId, TileGroupId, TxnId};

pub struct TileGroup {
    tile_group_id: TileGroupId,
    /// Owning table, by id only; resolve through the catalog manager
    /// when needed.
    table_id: TableRefId,
    header: TileGroupHeader,
    tiles: Vec<Tile>,
    column_map: ColumnMap,
    num_slots: usize,
    /// Guards structural multi-word maintenance (e.g. migration).
    /// Never taken on the insert/select/delete paths.
    #[allow(dead_code)]
    structural_mutex: Mutex<()>,
}

impl TileGroup {
    pub fn new(
        tile_group_id: TileGroupId,
        table_id: TableRefId,
        backend: &BackendRef,
        manager: &Manager,
        tile_schemas: Vec<Schema>,
        column_map: ColumnMap,
        num_slots: usize,
    ) -> StorageResult<TileGroup> {
        let tiles: Vec<Tile> = tile_schemas
            .into_iter()
            .map(|schema| Tile::new(manager.next_oid(), tile_group_id, backend, schema, num_slots))
            .try_collect()?;
        Ok(TileGroup {
            tile_group_id,
            table_id,
            header: TileGroupHeader::new(num_slots),
            tiles,
            column_map,
            num_slots,
            structural_mutex: Mutex::new(()),
        })
    }

    pub fn tile_group_id(&self) -> TileGroupId {
        self.tile_group_id
    }

    pub fn table_id(&self) -> TableRefId {
        self.table_id
    }

    pub fn header(&self) -> &TileGroupHeader {
        &self.header
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile(&self, tile_offset: usize) -> &Tile {
        &self.tiles[tile_offset]
    }

    /// Number of tuple slots this group was allocated with.
    pub fn capacity(&self) -> usize {
        self.num_slots
    }

    pub fn is_full(&self) -> bool {
        self.header.is_full()
    }

    pub fn allocated_slot_count(&self) -> SlotId {
        self.header.allocated_slot_count()
    }

    pub fn active_tuple_count(&self) -> usize {
        self.header.active_tuple_count()
    }

    /// O(1) lookup of a logical column's tile and intra-tile position.
    pub fn locate_tile_and_column(&self, column_id: ColumnId) -> (usize, usize) {
        let loc = self.column_map.locate(column_id);
        (loc.tile_offset, loc.tile_column_id)
    }

    /// Insert `row` at the next available slot, leaving the slot in
    /// `INSERTING(txn_id)` until the transaction resolves. Returns
    /// [`StorageError::CapacityExhausted`] when the group is full.
    pub fn insert_tuple(&self, txn_id: TxnId, row: &Row) -> StorageResult<SlotId> {
        assert_eq!(
            row.len(),
            self.column_map.column_count(),
            "tuple arity does not match table schema"
        );
        let slot = self
            .header
            .reserve_slot(txn_id)
            .ok_or(StorageError::CapacityExhausted)?;
        for (column_id, value) in row.iter().enumerate() {
            let loc = self.column_map.locate(column_id as ColumnId);
            // SAFETY: `reserve_slot` handed `slot` to this call
            // exclusively; no reader can observe it until the header
            // publishes the commit.
            let result =
                unsafe { self.tiles[loc.tile_offset].set_value(slot, loc.tile_column_id, value) };
            if let Err(e) = result {
                // release the reservation so a rejected tuple does not
                // leave the slot in INSERTING forever
                self.header.abort_inserted(slot);
                return Err(e);
            }
        }
        Ok(slot)
    }

    /// Read back the full logical tuple at `slot`.
    ///
    /// Callers must establish visibility (or slot ownership) through
    /// the header before acting on the values.
    pub fn select_tuple(&self, slot: SlotId) -> Row {
        (0..self.column_map.column_count() as ColumnId)
            .map(|column_id| self.get_value(slot, column_id))
            .collect()
    }

    /// Read back only the columns stored in the tile at `tile_offset`.
    pub fn select_tile_tuple(&self, tile_offset: usize, slot: SlotId) -> Row {
        let tile = &self.tiles[tile_offset];
        (0..tile.schema().column_count())
            // SAFETY: as in `get_value`.
            .map(|column| unsafe { tile.get_value(slot, column) })
            .collect()
    }

    /// Read one column of the tuple at `slot`.
    pub fn get_value(&self, slot: SlotId, column_id: ColumnId) -> DataValue {
        let loc = self.column_map.locate(column_id);
        // SAFETY: callers observe the slot through the header protocol
        // (visibility check or ownership), which orders the cell bytes
        // before this read.
        unsafe { self.tiles[loc.tile_offset].get_value(slot, loc.tile_column_id) }
    }

    /// Try to mark the tuple at `slot` for deletion by `txn_id`.
    /// Returns false on owner contention or if the slot is not live.
    pub fn delete_tuple(&self, txn_id: TxnId, slot: SlotId) -> bool {
        self.header.mark_delete(slot, txn_id)
    }

    pub fn commit_inserted_tuple(&self, slot: SlotId, cid: Cid) {
        self.header.commit_inserted(slot, cid);
    }

    pub fn commit_deleted_tuple(&self, slot: SlotId, txn_id: TxnId, cid: Cid) {
        self.header.commit_deleted(slot, txn_id, cid);
    }

    pub fn abort_inserted_tuple(&self, slot: SlotId) {
        self.header.abort_inserted(slot);
    }

    pub fn abort_deleted_tuple(&self, slot: SlotId) {
        self.header.abort_deleted(slot);
    }
}

impl std::fmt::Debug for TileGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileGroup")
            .field("tile_group_id", &self.tile_group_id)
            .field("table_id", &self.table_id)
            .field("tiles", &self.tiles)
            .field("header", &self.header)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::backend::MemBackend;
    use super::*;
    use crate::catalog::partition;
    use crate::types::{DataTypeExt, DataTypeKind, START_TXN_ID};

    const T1: TxnId = START_TXN_ID;
    const T2: TxnId = START_TXN_ID + 1;
    const T3: TxnId = START_TXN_ID + 2;

    /// schema (id:int, name:varchar(8)), partition [[id], [name]]
    fn two_tile_group(capacity: usize) -> TileGroup {
        let columns = vec![
            DataTypeKind::Int32.not_null().to_column(0, "id"),
            DataTypeKind::Varchar(Some(8)).nullable().to_column(1, "name"),
        ];
        let (schemas, map) = partition(&columns, &[vec![0], vec![1]]).unwrap();
        let backend: BackendRef = Arc::new(MemBackend);
        let manager = Manager::new();
        TileGroup::new(
            1,
            TableRefId::new(0, 1),
            &backend,
            &manager,
            schemas,
            map,
            capacity,
        )
        .unwrap()
    }

    fn row(id: i32, name: &str) -> Row {
        vec![DataValue::Int32(id), DataValue::String(name.into())]
    }

    #[test]
    fn insert_assigns_increasing_slots() {
        let group = two_tile_group(4);
        assert_eq!(group.insert_tuple(T1, &row(1, "a")).unwrap(), 0);
        assert_eq!(group.insert_tuple(T1, &row(2, "bb")).unwrap(), 1);
        assert_eq!(group.insert_tuple(T1, &row(3, "ccc")).unwrap(), 2);
        assert_eq!(group.allocated_slot_count(), 3);
    }

    #[test]
    fn roundtrip_across_tiles() {
        let group = two_tile_group(4);
        let slot = group.insert_tuple(T1, &row(7, "x")).unwrap();
        // writer reads its own slot before commit
        assert_eq!(group.get_value(slot, 0), DataValue::Int32(7));
        assert_eq!(group.get_value(slot, 1), DataValue::String("x".into()));
        assert_eq!(group.select_tuple(slot), row(7, "x"));
        assert_eq!(
            group.select_tile_tuple(1, slot),
            vec![DataValue::String("x".into())]
        );
    }

    #[test]
    fn locate_tile_and_column_matches_partition() {
        let group = two_tile_group(2);
        assert_eq!(group.locate_tile_and_column(0), (0, 0));
        assert_eq!(group.locate_tile_and_column(1), (1, 0));
    }

    #[test]
    fn snapshot_sees_prefix_of_commits() {
        // commit at cids 10/11/12; snapshot 11 sees slots 0 and 1 only
        let group = two_tile_group(4);
        for (i, (id, name)) in [(1, "a"), (2, "bb"), (3, "ccc")].iter().enumerate() {
            let slot = group.insert_tuple(T1, &row(*id, name)).unwrap();
            group.commit_inserted_tuple(slot, 10 + i as Cid);
        }
        let visible: Vec<SlotId> = (0..group.allocated_slot_count())
            .filter(|&slot| group.header().is_visible(slot, 11, T2))
            .collect();
        assert_eq!(visible, vec![0, 1]);
    }

    #[test]
    fn delete_hides_from_later_snapshots() {
        // insert commit at 5, delete commit at 9: cid 8 sees it, 9 does not
        let group = two_tile_group(2);
        let slot = group.insert_tuple(T1, &row(7, "x")).unwrap();
        group.commit_inserted_tuple(slot, 5);

        assert!(group.delete_tuple(T2, slot));
        group.commit_deleted_tuple(slot, T2, 9);

        assert!(group.header().is_visible(slot, 8, T3));
        assert!(!group.header().is_visible(slot, 9, T3));
    }

    #[test]
    fn concurrent_inserts_fill_capacity_exactly() {
        // capacity 2, three concurrent inserts: exactly two succeed
        let group = two_tile_group(2);
        let successes: Vec<SlotId> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..3u64)
                .map(|t| {
                    let group = &group;
                    s.spawn(move || group.insert_tuple(START_TXN_ID + t, &row(t as i32, "v")).ok())
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|h| h.join().unwrap())
                .collect()
        });
        assert_eq!(successes.len(), 2);
        assert!(group.is_full());

        let mut slots = successes;
        slots.sort_unstable();
        assert_eq!(slots, vec![0, 1]);
    }

    #[test]
    fn concurrent_delete_has_one_winner() {
        let group = two_tile_group(2);
        let slot = group.insert_tuple(T1, &row(1, "a")).unwrap();
        group.commit_inserted_tuple(slot, 1);

        let winners: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4u64)
                .map(|t| {
                    let group = &group;
                    s.spawn(move || group.delete_tuple(START_TXN_ID + t, slot) as usize)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(winners, 1);
    }

    #[test]
    fn abort_does_not_refill_the_allocator() {
        let group = two_tile_group(3);
        for i in 0..3 {
            group.insert_tuple(T1, &row(i, "v")).unwrap();
        }
        group.abort_inserted_tuple(1);
        // slot 1 is EMPTY again but never handed out anew
        assert!(matches!(
            group.insert_tuple(T1, &row(9, "z")),
            Err(StorageError::CapacityExhausted)
        ));
        assert_eq!(group.allocated_slot_count(), 3);
    }

    #[test]
    fn rejected_value_releases_the_slot() {
        let group = two_tile_group(4);
        let err = group.insert_tuple(
            T1,
            &vec![DataValue::Int32(1), DataValue::String("far too long".into())],
        );
        assert!(matches!(err, Err(StorageError::ValueTooLong { .. })));
        // the reservation was rolled back, not left dangling
        assert_eq!(group.header().txn_id(0), crate::types::INVALID_TXN_ID);
        // the cursor is spent; the next insert lands on a fresh slot
        assert_eq!(group.insert_tuple(T1, &row(1, "ok")).unwrap(), 1);
    }

    #[test]
    fn active_tuple_count_tracks_live_slots() {
        let group = two_tile_group(4);
        let a = group.insert_tuple(T1, &row(1, "a")).unwrap();
        let b = group.insert_tuple(T1, &row(2, "b")).unwrap();
        assert_eq!(group.active_tuple_count(), 0);
        group.commit_inserted_tuple(a, 5);
        group.commit_inserted_tuple(b, 5);
        assert_eq!(group.active_tuple_count(), 2);
        assert!(group.delete_tuple(T2, b));
        group.commit_deleted_tuple(b, T2, 6);
        assert_eq!(group.active_tuple_count(), 1);
    }
}
