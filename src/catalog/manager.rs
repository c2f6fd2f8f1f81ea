// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! Process-wide directory of live storage objects, keyed by id.
//!
//! The manager holds non-owning references: tables own their tile
//! groups, the engine owns its tables. A lookup for an object whose
//! owner dropped it returns `None`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::TableRefId;
use crate::storage::{DataTable, TileGroup};
use crate::types::TileGroupId;

/// First id handed out by [`Manager::next_oid`]; zero is reserved so a
/// zeroed word never aliases a live object.
const START_OID: u32 = 1;

pub type ManagerRef = Arc<Manager>;

/// Directory mapping `tile_group_id → TileGroup` and
/// `TableRefId → DataTable`, plus the process-wide oid allocator.
pub struct Manager {
    next_oid: AtomicU32,
    tile_groups: RwLock<HashMap<TileGroupId, Weak<TileGroup>>>,
    tables: RwLock<HashMap<TableRefId, Weak<DataTable>>>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    pub fn new() -> Manager {
        Manager {
            next_oid: AtomicU32::new(START_OID),
            tile_groups: RwLock::new(HashMap::new()),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate a fresh object id. Tiles and tile groups draw from one
    /// id space.
    pub fn next_oid(&self) -> u32 {
        self.next_oid.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register_tile_group(&self, id: TileGroupId, tile_group: &Arc<TileGroup>) {
        self.tile_groups
            .write()
            .insert(id, Arc::downgrade(tile_group));
    }

    pub fn unregister_tile_group(&self, id: TileGroupId) {
        self.tile_groups.write().remove(&id);
    }

    /// Resolve a tile group id to the live object, if its owner still
    /// holds it.
    pub fn tile_group(&self, id: TileGroupId) -> Option<Arc<TileGroup>> {
        self.tile_groups.read().get(&id)?.upgrade()
    }

    pub fn register_table(&self, id: TableRefId, table: &Arc<DataTable>) {
        self.tables.write().insert(id, Arc::downgrade(table));
    }

    pub fn unregister_table(&self, id: TableRefId) {
        self.tables.write().remove(&id);
    }

    pub fn table(&self, id: TableRefId) -> Option<Arc<DataTable>> {
        self.tables.read().get(&id)?.upgrade()
    }
}
