// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! Plan nodes and the bridge from parsed SQL to plans.

use std::sync::Arc;

pub use self::transformer::PlanTransformer;
use crate::catalog::ColumnCatalog;
use crate::storage::{StorageError, TableRef};
use crate::types::{ColumnId, ConvertError, Row};

mod transformer;

/// Row predicate over the full logical tuple. Supplied by the caller;
/// the plan bridge itself never builds one (expression evaluation
/// lives outside this crate).
pub type Predicate = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

#[derive(Debug)]
pub enum PlanNode {
    CreateTable(CreateTableNode),
    Insert(InsertNode),
    SeqScan(SeqScanNode),
    Delete(DeleteNode),
    DropTable(DropTableNode),
}

#[derive(Debug)]
pub struct CreateTableNode {
    pub name: String,
    pub columns: Vec<ColumnCatalog>,
}

/// Insert `rows` into `table`. Rows are already coerced to the table's
/// declared column types, in declared column order.
#[derive(Debug)]
pub struct InsertNode {
    pub table: TableRef,
    pub rows: Vec<Row>,
}

/// Full scan of `table`, projecting `column_ids` from the tuples that
/// pass visibility and the optional predicate.
pub struct SeqScanNode {
    pub table: TableRef,
    pub predicate: Option<Predicate>,
    pub column_ids: Vec<ColumnId>,
}

impl std::fmt::Debug for SeqScanNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeqScanNode")
            .field("table", &self.table.name())
            .field("predicate", &self.predicate.as_ref().map(|_| ".."))
            .field("column_ids", &self.column_ids)
            .finish()
    }
}

/// Delete every tuple of `table` visible to the deleting transaction.
#[derive(Debug)]
pub struct DeleteNode {
    pub table: TableRef,
}

#[derive(Debug)]
pub struct DropTableNode {
    pub name: String,
}

#[derive(thiserror::Error, Debug)]
pub enum PlanError {
    #[error("unsupported statement: {0}")]
    Unsupported(String),
    #[error("unsupported column type: {0}")]
    UnsupportedType(String),
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("duplicated column: {0}")]
    DuplicatedColumn(String),
    #[error("not nullable column: {0}")]
    NotNullableColumn(String),
    #[error("values length mismatch: expected {expected}, got {actual}")]
    ValueLengthMismatch { expected: usize, actual: usize },
    #[error("invalid expression: {0}")]
    InvalidExpression(String),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
