// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! Transaction identity and the commit/abort driver.
//!
//! The storage core never generates transaction or commit ids; this
//! module owns both counters and walks a transaction's recorded write
//! sets to drive the per-slot state transitions at resolution time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::ManagerRef;
use crate::storage::StorageResult;
use crate::types::{Cid, ItemPointer, TxnId, START_TXN_ID};

pub type TransactionManagerRef = Arc<TransactionManager>;

/// An in-flight transaction: its identity, its snapshot, and the slots
/// it touched. Write sets are tracked here, not in the storage core.
pub struct Transaction {
    txn_id: TxnId,
    /// Last commit id visible to this transaction's reads.
    snapshot_cid: Cid,
    inserted: Vec<ItemPointer>,
    deleted: Vec<ItemPointer>,
    finished: bool,
}

impl Transaction {
    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    pub fn snapshot_cid(&self) -> Cid {
        self.snapshot_cid
    }

    pub fn record_insert(&mut self, ptr: ItemPointer) {
        self.inserted.push(ptr);
    }

    pub fn record_delete(&mut self, ptr: ItemPointer) {
        self.deleted.push(ptr);
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            warn!(txn_id = self.txn_id, "transaction dropped without commit or abort");
        }
    }
}

/// Allocates transaction and commit ids and resolves transactions
/// against the tile groups they touched.
pub struct TransactionManager {
    manager: ManagerRef,
    next_txn_id: AtomicU64,
    /// Next commit id to hand out; commit ids start at 1.
    next_cid: AtomicU64,
    /// Highest commit id whose transitions are fully applied; new
    /// snapshots read this.
    last_cid: AtomicU64,
}

impl TransactionManager {
    pub fn new(manager: ManagerRef) -> TransactionManager {
        TransactionManager {
            manager,
            next_txn_id: AtomicU64::new(START_TXN_ID),
            next_cid: AtomicU64::new(1),
            last_cid: AtomicU64::new(0),
        }
    }

    pub fn begin(&self) -> Transaction {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        let snapshot_cid = self.last_cid.load(Ordering::Acquire);
        debug!(txn_id, snapshot_cid, "begin transaction");
        Transaction {
            txn_id,
            snapshot_cid,
            inserted: Vec::new(),
            deleted: Vec::new(),
            finished: false,
        }
    }

    /// Commit: assign a fresh commit id, publish every touched slot,
    /// then advance the snapshot watermark.
    pub fn commit(&self, mut txn: Transaction) -> StorageResult<Cid> {
        let cid = self.next_cid.fetch_add(1, Ordering::Relaxed);
        for ptr in txn.inserted.drain(..) {
            if let Some(group) = self.manager.tile_group(ptr.tile_group_id) {
                group.commit_inserted_tuple(ptr.slot_id, cid);
            }
        }
        for ptr in txn.deleted.drain(..) {
            if let Some(group) = self.manager.tile_group(ptr.tile_group_id) {
                group.commit_deleted_tuple(ptr.slot_id, txn.txn_id, cid);
            }
        }
        self.last_cid.fetch_max(cid, Ordering::AcqRel);
        txn.finished = true;
        debug!(txn_id = txn.txn_id, cid, "committed transaction");
        Ok(cid)
    }

    /// Abort: roll every touched slot back to its pre-transaction
    /// state.
    pub fn abort(&self, mut txn: Transaction) {
        for ptr in txn.inserted.drain(..) {
            if let Some(group) = self.manager.tile_group(ptr.tile_group_id) {
                group.abort_inserted_tuple(ptr.slot_id);
            }
        }
        for ptr in txn.deleted.drain(..) {
            if let Some(group) = self.manager.tile_group(ptr.tile_group_id) {
                group.abort_deleted_tuple(ptr.slot_id);
            }
        }
        txn.finished = true;
        debug!(txn_id = txn.txn_id, "aborted transaction");
    }

    /// Snapshot for an auto-commit read.
    pub fn last_committed_cid(&self) -> Cid {
        self.last_cid.load(Ordering::Acquire)
    }
}
