// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

use serde::{Deserialize, Serialize};

use crate::types::{ColumnId, DataType, DataTypeKind};

/// The catalog of a column: its id within the table, its name, and its
/// logical type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCatalog {
    id: ColumnId,
    name: String,
    datatype: DataType,
}

impl ColumnCatalog {
    pub fn new(id: ColumnId, name: impl Into<String>, datatype: DataType) -> ColumnCatalog {
        ColumnCatalog {
            id,
            name: name.into(),
            datatype,
        }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    pub fn kind(&self) -> DataTypeKind {
        self.datatype.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.datatype.nullable
    }

    /// Byte width of this column's cell inside a tile row.
    pub fn inline_width(&self) -> usize {
        self.datatype.kind.inline_width()
    }

    /// Whether the value payload lives inside the cell, as opposed to
    /// the tile's variable-length pool.
    pub fn is_inlined(&self) -> bool {
        self.datatype.kind.is_inlined()
    }
}

impl DataType {
    /// Shorthand for building a [`ColumnCatalog`] in tests and DDL.
    pub fn to_column(self, id: ColumnId, name: impl Into<String>) -> ColumnCatalog {
        ColumnCatalog::new(id, name, self)
    }
}
