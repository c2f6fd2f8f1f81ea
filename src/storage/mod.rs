// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! The tile-group storage layer.
//!
//! A table's data is split horizontally into tile groups; each group
//! splits its columns vertically into tiles and coordinates concurrent
//! access through a per-slot MVCC header. The [`StorageEngine`] is the
//! top-level surface tying tables to the catalog manager and a byte
//! [`backend`](StorageBackend).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

pub use self::backend::{BackendRef, BackendRegion, FileBackend, MemBackend, StorageBackend};
pub use self::pool::{Pool, PoolPtr};
pub use self::table::{DataTable, TableRef};
pub use self::tile::Tile;
pub use self::tile_group::TileGroup;
pub use self::tile_group_header::TileGroupHeader;
use crate::catalog::{
    single_tile_layout, CatalogError, ColumnCatalog, Manager, ManagerRef, TableRefId,
};
use crate::types::{ColumnId, DatabaseId, TableId};

mod backend;
mod pool;
mod table;
mod tile;
mod tile_group;
mod tile_group_header;

/// The single database this engine serves.
pub const DEFAULT_DATABASE_ID: DatabaseId = 0;

/// Slots allocated per tile group.
const DEFAULT_TUPLES_PER_TILE_GROUP: usize = 1000;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("tile group is full")]
    CapacityExhausted,
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),
    #[error("duplicated {0}: {1}")]
    Duplicated(&'static str, String),
    #[error("type mismatch at column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: String,
    },
    #[error("value for column {column} exceeds declared length {max}")]
    ValueTooLong { column: String, max: u64 },
    #[error("backend failure: {0}")]
    Backend(String),
    #[error("IO error: {0}")]
    Io(#[from] Box<std::io::Error>),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Engine construction knobs.
#[derive(Clone, Debug)]
pub struct StorageOptions {
    pub tuples_per_tile_group: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        StorageOptions {
            tuples_per_tile_group: DEFAULT_TUPLES_PER_TILE_GROUP,
        }
    }
}

pub type StorageRef = Arc<StorageEngine>;

/// Top-level storage surface: creates and resolves tables, owns the
/// catalog manager and the byte backend shared by all tiles.
pub struct StorageEngine {
    manager: ManagerRef,
    backend: BackendRef,
    options: StorageOptions,
    next_table_id: AtomicU32,
    tables: RwLock<HashMap<TableRefId, TableRef>>,
    table_names: RwLock<HashMap<String, TableRefId>>,
}

impl StorageEngine {
    pub fn new(backend: BackendRef, options: StorageOptions) -> StorageEngine {
        StorageEngine {
            manager: Arc::new(Manager::new()),
            backend,
            options,
            next_table_id: AtomicU32::new(1),
            tables: RwLock::new(HashMap::new()),
            table_names: RwLock::new(HashMap::new()),
        }
    }

    /// Engine over the in-memory backend with default options.
    pub fn in_memory() -> StorageEngine {
        StorageEngine::new(Arc::new(MemBackend), StorageOptions::default())
    }

    pub fn manager(&self) -> &ManagerRef {
        &self.manager
    }

    /// Create a table. `layout` is the tile partition of the columns;
    /// `None` puts every column in one tile.
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<ColumnCatalog>,
        layout: Option<Vec<Vec<ColumnId>>>,
    ) -> StorageResult<TableRef> {
        let mut names = self.table_names.write();
        if names.contains_key(name) {
            return Err(StorageError::Duplicated("table", name.into()));
        }
        let table_id: TableId = self.next_table_id.fetch_add(1, Ordering::Relaxed);
        let table_ref_id = TableRefId::new(DEFAULT_DATABASE_ID, table_id);
        let layout = layout.unwrap_or_else(|| single_tile_layout(&columns));
        let table = DataTable::new(
            table_ref_id,
            name,
            columns,
            &layout,
            self.options.tuples_per_tile_group,
            self.backend.clone(),
            self.manager.clone(),
        )?;
        self.manager.register_table(table_ref_id, &table);
        self.tables.write().insert(table_ref_id, table.clone());
        names.insert(name.into(), table_ref_id);
        info!(table = name, id = %table_ref_id, "created table");
        Ok(table)
    }

    pub fn get_table(&self, table_ref_id: TableRefId) -> StorageResult<TableRef> {
        self.tables
            .read()
            .get(&table_ref_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound("table", table_ref_id.to_string()))
    }

    pub fn get_table_by_name(&self, name: &str) -> StorageResult<TableRef> {
        let id = *self
            .table_names
            .read()
            .get(name)
            .ok_or_else(|| StorageError::NotFound("table", name.into()))?;
        self.get_table(id)
    }

    pub fn drop_table(&self, name: &str) -> StorageResult<()> {
        let mut names = self.table_names.write();
        let id = names
            .remove(name)
            .ok_or_else(|| StorageError::NotFound("table", name.into()))?;
        self.tables.write().remove(&id);
        self.manager.unregister_table(id);
        info!(table = name, %id, "dropped table");
        Ok(())
    }
}
