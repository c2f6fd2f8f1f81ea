// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! Column descriptors, physical tile schemas, and the process-wide
//! object directory.

use serde::{Deserialize, Serialize};

pub use self::column::*;
pub use self::manager::*;
pub use self::schema::*;
use crate::types::{DatabaseId, TableId};

mod column;
mod manager;
mod schema;

/// The reference ID of a table.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Serialize, Deserialize)]
pub struct TableRefId {
    pub database_id: DatabaseId,
    pub table_id: TableId,
}

impl std::fmt::Debug for TableRefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}.{}", self.database_id, self.table_id)
    }
}

impl std::fmt::Display for TableRefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl TableRefId {
    pub const fn new(database_id: DatabaseId, table_id: TableId) -> Self {
        TableRefId {
            database_id,
            table_id,
        }
    }
}

/// The error type of catalog operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("invalid tile layout: {0}")]
    InvalidLayout(String),
}
