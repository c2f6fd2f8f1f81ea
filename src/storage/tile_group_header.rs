// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! Per-slot MVCC metadata and the slot allocator.
//!
//! Each slot moves through a small state machine keyed by
//! `(txn_id, begin_cid, end_cid)`:
//!
//! | state        | triple                              |
//! |--------------|-------------------------------------|
//! | EMPTY        | `(INVALID_TXN, INVALID, INVALID)`   |
//! | INSERTING(T) | `(T, INVALID, INVALID)`             |
//! | LIVE         | `(INITIAL_TXN, c, MAX)`             |
//! | DELETING(T)  | `(T, c, MAX)`                       |
//! | DEAD         | `(INITIAL_TXN, c, d)`               |
//!
//! `txn_id` is the publication point: commit transitions store the
//! commit ids first and then store `txn_id` with release ordering, so a
//! reader that acquires `txn_id == INITIAL_TXN_ID` also observes the
//! ids (and the payload bytes written before the commit).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{
    Cid, ItemPointer, SlotId, TxnId, INITIAL_TXN_ID, INVALID_CID, INVALID_ITEM_POINTER,
    INVALID_TXN_ID, MAX_CID, START_TXN_ID,
};

struct SlotHeader {
    /// Current owner: `INVALID_TXN_ID` (free), a live transaction id,
    /// or `INITIAL_TXN_ID` (committed).
    txn_id: AtomicU64,
    begin_cid: AtomicU64,
    end_cid: AtomicU64,
    /// Packed [`ItemPointer`] forming the MVCC version chain. Carried
    /// but not yet populated: the update path is not designed.
    next_item: AtomicU64,
}

impl SlotHeader {
    fn new() -> SlotHeader {
        SlotHeader {
            txn_id: AtomicU64::new(INVALID_TXN_ID),
            begin_cid: AtomicU64::new(INVALID_CID),
            end_cid: AtomicU64::new(INVALID_CID),
            next_item: AtomicU64::new(INVALID_ITEM_POINTER),
        }
    }
}

/// MVCC metadata array for one tile group: one record per slot plus the
/// next-slot allocator.
pub struct TileGroupHeader {
    slots: Box<[SlotHeader]>,
    /// Monotonic allocator cursor. Freed slots are never recycled, so
    /// occupancy only grows.
    next_slot: AtomicU64,
}

impl TileGroupHeader {
    pub fn new(num_slots: usize) -> TileGroupHeader {
        TileGroupHeader {
            slots: (0..num_slots).map(|_| SlotHeader::new()).collect(),
            next_slot: AtomicU64::new(0),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots handed out so far, clamped to capacity. Scans
    /// iterate `0..allocated_slot_count()`.
    pub fn allocated_slot_count(&self) -> SlotId {
        self.next_slot
            .load(Ordering::Acquire)
            .min(self.slots.len() as u64) as SlotId
    }

    pub fn is_full(&self) -> bool {
        self.next_slot.load(Ordering::Acquire) >= self.slots.len() as u64
    }

    /// Reserve the next free slot for `txn_id`, transitioning it
    /// `EMPTY → INSERTING(T)`. Returns `None` when the group is full.
    ///
    /// The fetch-add hands each slot index to exactly one caller, so
    /// the reserving transaction owns the slot's payload exclusively
    /// until it commits or aborts.
    pub fn reserve_slot(&self, txn_id: TxnId) -> Option<SlotId> {
        debug_assert!(txn_id >= START_TXN_ID);
        let slot = self.next_slot.fetch_add(1, Ordering::AcqRel);
        if slot >= self.slots.len() as u64 {
            return None;
        }
        let record = &self.slots[slot as usize];
        record
            .txn_id
            .compare_exchange(INVALID_TXN_ID, txn_id, Ordering::Acquire, Ordering::Relaxed)
            .unwrap_or_else(|owner| {
                panic!("slot {slot} handed out twice: already owned by txn {owner}")
            });
        Some(slot as SlotId)
    }

    /// `INSERTING(T) → LIVE` at commit id `cid`.
    pub fn commit_inserted(&self, slot: SlotId, cid: Cid) {
        let record = &self.slots[slot as usize];
        let owner = record.txn_id.load(Ordering::Relaxed);
        assert!(
            owner >= START_TXN_ID && record.begin_cid.load(Ordering::Relaxed) == INVALID_CID,
            "commit-insert on slot {slot} not in INSERTING state"
        );
        record.begin_cid.store(cid, Ordering::Relaxed);
        record.end_cid.store(MAX_CID, Ordering::Relaxed);
        record.txn_id.store(INITIAL_TXN_ID, Ordering::Release);
    }

    /// `INSERTING(T) → EMPTY`. The slot is not returned to the
    /// allocator; it stays unreachable for good.
    pub fn abort_inserted(&self, slot: SlotId) {
        let record = &self.slots[slot as usize];
        let owner = record.txn_id.load(Ordering::Relaxed);
        assert!(
            owner >= START_TXN_ID && record.begin_cid.load(Ordering::Relaxed) == INVALID_CID,
            "abort-insert on slot {slot} not in INSERTING state"
        );
        record.begin_cid.store(INVALID_CID, Ordering::Relaxed);
        record.end_cid.store(INVALID_CID, Ordering::Relaxed);
        record.txn_id.store(INVALID_TXN_ID, Ordering::Release);
    }

    /// Try `LIVE → DELETING(T)`. Returns false if another transaction
    /// owns the slot or the slot is already dead.
    pub fn mark_delete(&self, slot: SlotId, txn_id: TxnId) -> bool {
        debug_assert!(txn_id >= START_TXN_ID);
        let record = &self.slots[slot as usize];
        if record
            .txn_id
            .compare_exchange(
                INITIAL_TXN_ID,
                txn_id,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_err()
        {
            return false;
        }
        // The CAS also succeeds on a DEAD slot; back out of those.
        if record.end_cid.load(Ordering::Relaxed) != MAX_CID {
            record.txn_id.store(INITIAL_TXN_ID, Ordering::Release);
            return false;
        }
        true
    }

    /// `DELETING(T) → DEAD` at commit id `cid`.
    pub fn commit_deleted(&self, slot: SlotId, txn_id: TxnId, cid: Cid) {
        let record = &self.slots[slot as usize];
        assert_eq!(
            record.txn_id.load(Ordering::Relaxed),
            txn_id,
            "commit-delete on slot {slot} not owned by txn {txn_id}"
        );
        record.end_cid.store(cid, Ordering::Relaxed);
        record.txn_id.store(INITIAL_TXN_ID, Ordering::Release);
    }

    /// `DELETING(T) → LIVE`.
    pub fn abort_deleted(&self, slot: SlotId) {
        let record = &self.slots[slot as usize];
        assert!(
            record.txn_id.load(Ordering::Relaxed) >= START_TXN_ID,
            "abort-delete on slot {slot} not in DELETING state"
        );
        record.end_cid.store(MAX_CID, Ordering::Relaxed);
        record.txn_id.store(INITIAL_TXN_ID, Ordering::Release);
    }

    /// The visibility predicate: a committed slot is visible to
    /// snapshot `cid` iff `begin_cid <= cid < end_cid`. A slot owned by
    /// `reader` itself is always visible (a transaction reads its own
    /// writes, covering both its pending inserts and pending deletes).
    pub fn is_visible(&self, slot: SlotId, cid: Cid, reader: TxnId) -> bool {
        let record = &self.slots[slot as usize];
        let owner = record.txn_id.load(Ordering::Acquire);
        if reader >= START_TXN_ID && owner == reader {
            return true;
        }
        owner == INITIAL_TXN_ID
            && record.begin_cid.load(Ordering::Relaxed) <= cid
            && cid < record.end_cid.load(Ordering::Relaxed)
    }

    /// Number of slots currently in the LIVE state.
    pub fn active_tuple_count(&self) -> usize {
        (0..self.allocated_slot_count())
            .filter(|&slot| {
                let record = &self.slots[slot as usize];
                record.txn_id.load(Ordering::Acquire) == INITIAL_TXN_ID
                    && record.end_cid.load(Ordering::Relaxed) == MAX_CID
            })
            .count()
    }

    pub fn txn_id(&self, slot: SlotId) -> TxnId {
        self.slots[slot as usize].txn_id.load(Ordering::Acquire)
    }

    pub fn begin_cid(&self, slot: SlotId) -> Cid {
        self.slots[slot as usize].begin_cid.load(Ordering::Relaxed)
    }

    pub fn end_cid(&self, slot: SlotId) -> Cid {
        self.slots[slot as usize].end_cid.load(Ordering::Relaxed)
    }

    pub fn next_item_pointer(&self, slot: SlotId) -> Option<ItemPointer> {
        match self.slots[slot as usize].next_item.load(Ordering::Acquire) {
            INVALID_ITEM_POINTER => None,
            raw => Some(ItemPointer::unpack(raw)),
        }
    }

    pub fn set_next_item_pointer(&self, slot: SlotId, ptr: ItemPointer) {
        self.slots[slot as usize]
            .next_item
            .store(ptr.pack(), Ordering::Release);
    }
}

impl std::fmt::Debug for TileGroupHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileGroupHeader")
            .field("slot_count", &self.slots.len())
            .field("allocated", &self.allocated_slot_count())
            .field("active", &self.active_tuple_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T1: TxnId = START_TXN_ID;
    const T2: TxnId = START_TXN_ID + 1;

    #[test]
    fn allocation_is_fifo_and_bounded() {
        let header = TileGroupHeader::new(3);
        assert_eq!(header.reserve_slot(T1), Some(0));
        assert_eq!(header.reserve_slot(T1), Some(1));
        assert_eq!(header.reserve_slot(T2), Some(2));
        assert!(header.is_full());
        assert_eq!(header.reserve_slot(T2), None);
        assert_eq!(header.allocated_slot_count(), 3);
    }

    #[test]
    fn insert_commit_publishes_visibility() {
        let header = TileGroupHeader::new(2);
        let slot = header.reserve_slot(T1).unwrap();
        // INSERTING: invisible to other snapshots, visible to self
        assert!(!header.is_visible(slot, 100, T2));
        assert!(header.is_visible(slot, 100, T1));

        header.commit_inserted(slot, 10);
        assert_eq!(header.txn_id(slot), INITIAL_TXN_ID);
        assert_eq!(header.begin_cid(slot), 10);
        assert_eq!(header.end_cid(slot), MAX_CID);
        assert!(!header.is_visible(slot, 9, T2));
        assert!(header.is_visible(slot, 10, T2));
        assert!(header.is_visible(slot, u64::MAX - 1, T2));
    }

    #[test]
    fn abort_insert_returns_slot_to_empty_without_recycling() {
        let header = TileGroupHeader::new(2);
        let slot = header.reserve_slot(T1).unwrap();
        header.abort_inserted(slot);
        assert_eq!(header.txn_id(slot), INVALID_TXN_ID);
        assert!(!header.is_visible(slot, 100, T2));
        // the allocator cursor did not move back
        assert_eq!(header.reserve_slot(T2), Some(1));
        assert_eq!(header.reserve_slot(T2), None);
    }

    #[test]
    fn delete_lifecycle() {
        let header = TileGroupHeader::new(1);
        let slot = header.reserve_slot(T1).unwrap();
        header.commit_inserted(slot, 5);

        assert!(header.mark_delete(slot, T2));
        // DELETING: the owner marker hides the slot from other readers
        // until the delete resolves; the deleter still sees it
        assert!(!header.is_visible(slot, 8, T1));
        assert!(header.is_visible(slot, 8, T2));

        // DEAD: committed interval [5, 9) is visible again below 9
        header.commit_deleted(slot, T2, 9);
        assert!(header.is_visible(slot, 8, T1));
        assert!(!header.is_visible(slot, 9, T1));
        assert_eq!(header.end_cid(slot), 9);
    }

    #[test]
    fn abort_delete_restores_live() {
        let header = TileGroupHeader::new(1);
        let slot = header.reserve_slot(T1).unwrap();
        header.commit_inserted(slot, 5);
        assert!(header.mark_delete(slot, T2));
        header.abort_deleted(slot);
        assert_eq!(header.txn_id(slot), INITIAL_TXN_ID);
        assert_eq!(header.end_cid(slot), MAX_CID);
        assert!(header.is_visible(slot, 100, T1));
    }

    #[test]
    fn mark_delete_excludes_concurrent_deleters() {
        let header = TileGroupHeader::new(1);
        let slot = header.reserve_slot(T1).unwrap();
        header.commit_inserted(slot, 5);

        assert!(header.mark_delete(slot, T1));
        assert!(!header.mark_delete(slot, T2));
    }

    #[test]
    fn mark_delete_rejects_dead_and_empty_slots() {
        let header = TileGroupHeader::new(3);
        let slot = header.reserve_slot(T1).unwrap();
        header.commit_inserted(slot, 5);
        assert!(header.mark_delete(slot, T1));
        header.commit_deleted(slot, T1, 9);
        // dead
        assert!(!header.mark_delete(slot, T2));
        assert_eq!(header.txn_id(slot), INITIAL_TXN_ID);
        // never inserted
        assert!(!header.mark_delete(1, T2));
    }

    #[test]
    fn concurrent_reservations_are_unique() {
        const SLOTS: usize = 64;
        const THREADS: u64 = 8;
        let header = TileGroupHeader::new(SLOTS);
        let mut reserved: Vec<SlotId> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|t| {
                    let header = &header;
                    s.spawn(move || {
                        let txn = START_TXN_ID + t;
                        let mut got = vec![];
                        while let Some(slot) = header.reserve_slot(txn) {
                            got.push(slot);
                        }
                        got
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });
        reserved.sort_unstable();
        let expected: Vec<SlotId> = (0..SLOTS as SlotId).collect();
        assert_eq!(reserved, expected);
    }

    #[test]
    fn concurrent_delete_single_winner() {
        let header = TileGroupHeader::new(1);
        let slot = header.reserve_slot(T1).unwrap();
        header.commit_inserted(slot, 1);

        let winners: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8u64)
                .map(|t| {
                    let header = &header;
                    s.spawn(move || header.mark_delete(slot, START_TXN_ID + t) as usize)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(winners, 1);
    }

    #[test]
    fn next_item_pointer_roundtrip() {
        let header = TileGroupHeader::new(1);
        assert_eq!(header.next_item_pointer(0), None);
        header.set_next_item_pointer(0, ItemPointer::new(7, 3));
        assert_eq!(header.next_item_pointer(0), Some(ItemPointer::new(7, 3)));
    }
}
