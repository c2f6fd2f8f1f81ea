// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! Executors for the plan nodes that touch storage.
//!
//! Write executors run inside a [`Transaction`] and record every slot
//! they touch so the transaction manager can resolve them later. The
//! scan executor only needs a snapshot identity.

use crate::planner::{DeleteNode, InsertNode, SeqScanNode};
use crate::storage::StorageError;
use crate::transaction::Transaction;
use crate::types::{Cid, ItemPointer, Row, TxnId, INVALID_CID};

#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("write-write conflict on {0:?}")]
    WriteConflict(ItemPointer),
}

/// Runs an [`InsertNode`]: one storage insert per row, write set
/// recorded on the transaction.
pub struct InsertExecutor {
    pub node: InsertNode,
}

impl InsertExecutor {
    /// Returns the number of rows inserted. On error the transaction's
    /// write set still covers every reserved slot, so aborting the
    /// transaction rolls the partial insert back.
    pub fn execute(self, txn: &mut Transaction) -> Result<usize, ExecutorError> {
        for row in &self.node.rows {
            let ptr = self.node.table.insert_tuple(txn.txn_id(), row)?;
            txn.record_insert(ptr);
        }
        Ok(self.node.rows.len())
    }
}

/// Runs a [`SeqScanNode`]: iterates tile groups in order, filters
/// slots through the header's visibility predicate, applies the
/// node's predicate, projects the requested columns.
pub struct SeqScanExecutor {
    pub node: SeqScanNode,
}

impl SeqScanExecutor {
    pub fn execute(self, snapshot_cid: Cid, reader: TxnId) -> Result<Vec<Row>, ExecutorError> {
        let mut rows = Vec::new();
        for group in self.node.table.tile_groups() {
            let header = group.header();
            for slot in 0..group.allocated_slot_count() {
                if !header.is_visible(slot, snapshot_cid, reader) {
                    // not an error: this snapshot simply cannot see the slot
                    continue;
                }
                let tuple = group.select_tuple(slot);
                if let Some(predicate) = &self.node.predicate {
                    if !predicate(&tuple) {
                        continue;
                    }
                }
                rows.push(
                    self.node
                        .column_ids
                        .iter()
                        .map(|&id| tuple[id as usize].clone())
                        .collect(),
                );
            }
        }
        Ok(rows)
    }
}

/// Runs a [`DeleteNode`]: marks every tuple visible to the transaction
/// as deleted and records the write set.
pub struct DeleteExecutor {
    pub node: DeleteNode,
}

impl DeleteExecutor {
    /// Returns the number of tuples marked. A concurrent deleter on
    /// any slot surfaces as [`ExecutorError::WriteConflict`]; the
    /// caller is expected to abort.
    ///
    /// Targets are picked by commit interval rather than the plain
    /// visibility predicate: a slot whose interval covers the snapshot
    /// but whose owner marker is taken is exactly the serialization
    /// failure this executor must report, not skip.
    pub fn execute(self, txn: &mut Transaction) -> Result<usize, ExecutorError> {
        let snapshot = txn.snapshot_cid();
        let mut deleted = 0;
        for group in self.node.table.tile_groups() {
            let header = group.header();
            for slot in 0..group.allocated_slot_count() {
                let begin = header.begin_cid(slot);
                if begin == INVALID_CID || !(begin <= snapshot && snapshot < header.end_cid(slot)) {
                    continue;
                }
                let ptr = ItemPointer::new(group.tile_group_id(), slot);
                if !group.delete_tuple(txn.txn_id(), slot) {
                    return Err(ExecutorError::WriteConflict(ptr));
                }
                txn.record_delete(ptr);
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::parser::parse;
    use crate::planner::{PlanNode, PlanTransformer};
    use crate::storage::{StorageEngine, StorageRef};
    use crate::transaction::{TransactionManager, TransactionManagerRef};
    use crate::types::{DataValue, INVALID_TXN_ID};

    fn setup() -> (StorageRef, TransactionManagerRef) {
        let storage = Arc::new(StorageEngine::in_memory());
        let txn_mgr = Arc::new(TransactionManager::new(storage.manager().clone()));
        (storage, txn_mgr)
    }

    fn run_insert(storage: &StorageRef, txn_mgr: &TransactionManagerRef, sql: &str) {
        let stmts = parse(sql).unwrap();
        let PlanNode::Insert(node) =
            PlanTransformer::new(storage.clone()).transform(&stmts[0]).unwrap()
        else {
            panic!("expected insert plan")
        };
        let mut txn = txn_mgr.begin();
        InsertExecutor { node }.execute(&mut txn).unwrap();
        txn_mgr.commit(txn).unwrap();
    }

    fn scan(storage: &StorageRef, txn_mgr: &TransactionManagerRef, sql: &str) -> Vec<Row> {
        let stmts = parse(sql).unwrap();
        let PlanNode::SeqScan(node) =
            PlanTransformer::new(storage.clone()).transform(&stmts[0]).unwrap()
        else {
            panic!("expected scan plan")
        };
        SeqScanExecutor { node }
            .execute(txn_mgr.last_committed_cid(), INVALID_TXN_ID)
            .unwrap()
    }

    fn create_t(storage: &StorageRef) {
        let stmts = parse("create table t(id int not null, name varchar(8))").unwrap();
        let PlanNode::CreateTable(node) =
            PlanTransformer::new(storage.clone()).transform(&stmts[0]).unwrap()
        else {
            panic!("expected create table plan")
        };
        storage.create_table(&node.name, node.columns, None).unwrap();
    }

    #[test]
    fn insert_then_scan() {
        let (storage, txn_mgr) = setup();
        create_t(&storage);
        run_insert(&storage, &txn_mgr, "insert into t values (1, 'a'), (2, 'bb')");

        let rows = scan(&storage, &txn_mgr, "select * from t");
        assert_eq!(
            rows,
            vec![
                vec![DataValue::Int32(1), DataValue::String("a".into())],
                vec![DataValue::Int32(2), DataValue::String("bb".into())],
            ]
        );

        let names = scan(&storage, &txn_mgr, "select name from t");
        assert_eq!(
            names,
            vec![
                vec![DataValue::String("a".into())],
                vec![DataValue::String("bb".into())],
            ]
        );
    }

    #[test]
    fn uncommitted_insert_is_invisible_to_other_snapshots() {
        let (storage, txn_mgr) = setup();
        create_t(&storage);

        let stmts = parse("insert into t values (1, 'a')").unwrap();
        let PlanNode::Insert(node) =
            PlanTransformer::new(storage.clone()).transform(&stmts[0]).unwrap()
        else {
            panic!("expected insert plan")
        };
        let mut txn = txn_mgr.begin();
        InsertExecutor { node }.execute(&mut txn).unwrap();

        assert!(scan(&storage, &txn_mgr, "select * from t").is_empty());
        txn_mgr.abort(txn);
        assert!(scan(&storage, &txn_mgr, "select * from t").is_empty());
    }

    #[test]
    fn predicate_filters_rows() {
        let (storage, txn_mgr) = setup();
        create_t(&storage);
        run_insert(
            &storage,
            &txn_mgr,
            "insert into t values (1, 'a'), (2, 'bb'), (3, 'ccc')",
        );

        let stmts = parse("select id from t").unwrap();
        let PlanNode::SeqScan(mut node) =
            PlanTransformer::new(storage.clone()).transform(&stmts[0]).unwrap()
        else {
            panic!("expected scan plan")
        };
        node.predicate = Some(Arc::new(|row: &Row| {
            matches!(row[0], DataValue::Int32(v) if v >= 2)
        }));
        let rows = SeqScanExecutor { node }
            .execute(txn_mgr.last_committed_cid(), INVALID_TXN_ID)
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![DataValue::Int32(2)], vec![DataValue::Int32(3)]]
        );
    }

    #[test]
    fn delete_all_hides_rows_from_later_snapshots() {
        let (storage, txn_mgr) = setup();
        create_t(&storage);
        run_insert(&storage, &txn_mgr, "insert into t values (1, 'a'), (2, 'bb')");

        let stmts = parse("delete from t").unwrap();
        let PlanNode::Delete(node) =
            PlanTransformer::new(storage.clone()).transform(&stmts[0]).unwrap()
        else {
            panic!("expected delete plan")
        };
        let mut txn = txn_mgr.begin();
        assert_eq!(DeleteExecutor { node }.execute(&mut txn).unwrap(), 2);
        txn_mgr.commit(txn).unwrap();

        assert!(scan(&storage, &txn_mgr, "select * from t").is_empty());
    }

    #[test]
    fn concurrent_deleters_conflict() {
        let (storage, txn_mgr) = setup();
        create_t(&storage);
        run_insert(&storage, &txn_mgr, "insert into t values (1, 'a')");

        let transformer = PlanTransformer::new(storage.clone());
        let stmts = parse("delete from t").unwrap();
        let PlanNode::Delete(node1) = transformer.transform(&stmts[0]).unwrap() else {
            panic!("expected delete plan")
        };
        let PlanNode::Delete(node2) = transformer.transform(&stmts[0]).unwrap() else {
            panic!("expected delete plan")
        };

        let mut t1 = txn_mgr.begin();
        let mut t2 = txn_mgr.begin();
        assert_eq!(DeleteExecutor { node: node1 }.execute(&mut t1).unwrap(), 1);
        assert!(matches!(
            DeleteExecutor { node: node2 }.execute(&mut t2),
            Err(ExecutorError::WriteConflict(_))
        ));
        txn_mgr.abort(t2);
        txn_mgr.commit(t1).unwrap();
    }
}
