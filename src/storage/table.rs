// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! A table: an ordered sequence of tile groups.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::backend::BackendRef;
use super::tile_group::TileGroup;
use super::{StorageError, StorageResult};
use crate::catalog::{partition, ColumnCatalog, ColumnMap, ManagerRef, Schema, TableRefId};
use crate::types::{ColumnId, ItemPointer, Row, TileGroupId, TxnId};

pub type TableRef = Arc<DataTable>;

/// A single table's physical storage. The table owns its tile groups;
/// at most the tail group accepts new tuples. Older groups stay
/// immutable with respect to allocation but keep serving MVCC state
/// transitions.
pub struct DataTable {
    table_ref_id: TableRefId,
    name: String,
    columns: Vec<ColumnCatalog>,
    /// Tile partition of the table schema, fixed at creation.
    tile_schemas: Vec<Schema>,
    column_map: ColumnMap,
    tuples_per_tile_group: usize,
    backend: BackendRef,
    manager: ManagerRef,
    /// Ordered group list. Appends take the write lock; everything
    /// else snapshots under the read lock.
    tile_groups: RwLock<Vec<Arc<TileGroup>>>,
}

impl DataTable {
    pub fn new(
        table_ref_id: TableRefId,
        name: impl Into<String>,
        columns: Vec<ColumnCatalog>,
        layout: &[Vec<ColumnId>],
        tuples_per_tile_group: usize,
        backend: BackendRef,
        manager: ManagerRef,
    ) -> StorageResult<TableRef> {
        assert!(tuples_per_tile_group > 0);
        let (tile_schemas, column_map) = partition(&columns, layout)?;
        let table = DataTable {
            table_ref_id,
            name: name.into(),
            columns,
            tile_schemas,
            column_map,
            tuples_per_tile_group,
            backend,
            manager,
            tile_groups: RwLock::new(Vec::new()),
        };
        // start with one active group so the first insert never races
        // a structurally empty table
        let group = table.build_tile_group()?;
        table.tile_groups.write().push(group);
        Ok(Arc::new(table))
    }

    pub fn table_ref_id(&self) -> TableRefId {
        self.table_ref_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnCatalog] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_id_by_name(&self, name: &str) -> Option<ColumnId> {
        self.columns
            .iter()
            .find(|col| col.name() == name)
            .map(|col| col.id())
    }

    /// Insert `row` on behalf of `txn_id`. Retries with a freshly
    /// appended tile group when the tail fills up.
    pub fn insert_tuple(&self, txn_id: TxnId, row: &Row) -> StorageResult<ItemPointer> {
        loop {
            let tail = self.tile_groups.read().last().unwrap().clone();
            match tail.insert_tuple(txn_id, row) {
                Ok(slot) => return Ok(ItemPointer::new(tail.tile_group_id(), slot)),
                Err(StorageError::CapacityExhausted) => {
                    self.add_tile_group(tail.tile_group_id())?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Append a fresh tile group, unless another thread already
    /// replaced the full tail we observed.
    fn add_tile_group(&self, observed_tail: TileGroupId) -> StorageResult<()> {
        let mut groups = self.tile_groups.write();
        if groups.last().unwrap().tile_group_id() != observed_tail {
            return Ok(());
        }
        let group = self.build_tile_group()?;
        info!(
            table = %self.name,
            tile_group_id = group.tile_group_id(),
            "appended tile group"
        );
        groups.push(group);
        Ok(())
    }

    fn build_tile_group(&self) -> StorageResult<Arc<TileGroup>> {
        let tile_group_id = self.manager.next_oid();
        let group = Arc::new(TileGroup::new(
            tile_group_id,
            self.table_ref_id,
            &self.backend,
            &self.manager,
            self.tile_schemas.clone(),
            self.column_map.clone(),
            self.tuples_per_tile_group,
        )?);
        self.manager.register_tile_group(tile_group_id, &group);
        Ok(group)
    }

    /// Snapshot of the current group list, oldest first.
    pub fn tile_groups(&self) -> Vec<Arc<TileGroup>> {
        self.tile_groups.read().clone()
    }

    pub fn tile_group(&self, offset: usize) -> Option<Arc<TileGroup>> {
        self.tile_groups.read().get(offset).cloned()
    }

    pub fn tile_group_count(&self) -> usize {
        self.tile_groups.read().len()
    }

    /// Committed-and-live tuples across all groups.
    pub fn active_tuple_count(&self) -> usize {
        self.tile_groups
            .read()
            .iter()
            .map(|group| group.active_tuple_count())
            .sum()
    }
}

impl Drop for DataTable {
    fn drop(&mut self) {
        for group in self.tile_groups.get_mut().iter() {
            self.manager.unregister_tile_group(group.tile_group_id());
        }
    }
}

impl std::fmt::Debug for DataTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTable")
            .field("table_ref_id", &self.table_ref_id)
            .field("name", &self.name)
            .field("columns", &self.columns.len())
            .field("tile_groups", &self.tile_group_count())
            .finish()
    }
}
