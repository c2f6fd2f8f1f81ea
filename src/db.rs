// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use tracing::debug;

use crate::executor::{DeleteExecutor, ExecutorError, InsertExecutor, SeqScanExecutor};
use crate::parser::{parse, ParserError};
use crate::planner::{PlanError, PlanNode, PlanTransformer};
use crate::storage::{StorageEngine, StorageError, StorageOptions, StorageRef};
use crate::transaction::{TransactionManager, TransactionManagerRef};
use crate::types::{Row, INVALID_TXN_ID};

/// The auto-committing SQL surface over the storage core: each
/// statement is parsed, bridged to a plan node, and executed in its
/// own transaction.
pub struct Database {
    storage: StorageRef,
    txn_mgr: TransactionManagerRef,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// Create a new in-memory Database instance.
    pub fn new() -> Self {
        Self::with_storage(Arc::new(StorageEngine::in_memory()))
    }

    pub fn with_options(backend: crate::storage::BackendRef, options: StorageOptions) -> Self {
        Self::with_storage(Arc::new(StorageEngine::new(backend, options)))
    }

    fn with_storage(storage: StorageRef) -> Self {
        let txn_mgr = Arc::new(TransactionManager::new(storage.manager().clone()));
        Database { storage, txn_mgr }
    }

    pub fn storage(&self) -> &StorageRef {
        &self.storage
    }

    pub fn transaction_manager(&self) -> &TransactionManagerRef {
        &self.txn_mgr
    }

    /// Run SQL statements and return the rows the scans produced.
    pub fn run(&self, sql: &str) -> Result<Vec<Row>, Error> {
        let stmts = parse(sql)?;
        let transformer = PlanTransformer::new(self.storage.clone());
        let mut outputs = vec![];
        for stmt in stmts {
            let plan = transformer.transform(&stmt)?;
            debug!(?plan, "executing");
            match plan {
                PlanNode::CreateTable(node) => {
                    self.storage.create_table(&node.name, node.columns, None)?;
                }
                PlanNode::DropTable(node) => self.storage.drop_table(&node.name)?,
                PlanNode::Insert(node) => {
                    let mut txn = self.txn_mgr.begin();
                    match (InsertExecutor { node }.execute(&mut txn)) {
                        Ok(_) => {
                            self.txn_mgr.commit(txn)?;
                        }
                        Err(e) => {
                            self.txn_mgr.abort(txn);
                            return Err(e.into());
                        }
                    }
                }
                PlanNode::Delete(node) => {
                    let mut txn = self.txn_mgr.begin();
                    match (DeleteExecutor { node }.execute(&mut txn)) {
                        Ok(_) => {
                            self.txn_mgr.commit(txn)?;
                        }
                        Err(e) => {
                            self.txn_mgr.abort(txn);
                            return Err(e.into());
                        }
                    }
                }
                PlanNode::SeqScan(node) => {
                    let snapshot = self.txn_mgr.last_committed_cid();
                    outputs.extend(
                        SeqScanExecutor { node }.execute(snapshot, INVALID_TXN_ID)?,
                    );
                }
            }
        }
        Ok(outputs)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParserError),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("execute error: {0}")]
    Execute(#[from] ExecutorError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
