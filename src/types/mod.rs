// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! Logical data types, values, and the id types shared across the crate.

use serde::{Deserialize, Serialize};

pub type DatabaseId = u32;
pub type SchemaId = u32;
pub type TableId = u32;
pub type ColumnId = u32;

/// Object id of a tile group, unique process-wide.
pub type TileGroupId = u32;
/// Object id of a tile, unique process-wide.
pub type TileId = u32;
/// Index of a tuple slot within a tile group.
pub type SlotId = u32;

/// Transaction identifier. Doubles as the slot-owner marker in tile
/// group headers.
pub type TxnId = u64;
/// Commit identifier: a monotonically increasing timestamp assigned at
/// commit time, ordering visibility.
pub type Cid = u64;

/// A slot nobody owns.
pub const INVALID_TXN_ID: TxnId = 0;
/// The owner marker of a committed slot.
pub const INITIAL_TXN_ID: TxnId = 1;
/// First id handed out to a live transaction.
pub const START_TXN_ID: TxnId = 2;

/// "Not yet committed."
pub const INVALID_CID: Cid = 0;
/// "Not yet ended."
pub const MAX_CID: Cid = Cid::MAX;

/// Physical address of one tuple: which tile group, which slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemPointer {
    pub tile_group_id: TileGroupId,
    pub slot_id: SlotId,
}

impl ItemPointer {
    pub const fn new(tile_group_id: TileGroupId, slot_id: SlotId) -> Self {
        ItemPointer {
            tile_group_id,
            slot_id,
        }
    }

    /// Pack into one word so the tile group header can hold a version
    /// chain link in a single atomic.
    pub const fn pack(self) -> u64 {
        ((self.tile_group_id as u64) << 32) | self.slot_id as u64
    }

    pub const fn unpack(raw: u64) -> Self {
        ItemPointer {
            tile_group_id: (raw >> 32) as TileGroupId,
            slot_id: raw as SlotId,
        }
    }
}

/// Packed form of "no item pointer".
pub const INVALID_ITEM_POINTER: u64 = u64::MAX;

/// Type of a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeKind {
    Bool,
    Int32,
    Int64,
    Float64,
    /// Variable-length string with an optional declared maximum length.
    Varchar(Option<u64>),
}

impl DataTypeKind {
    /// Byte width of the in-tile cell for this type. Out-of-line types
    /// store a pool handle instead of the payload.
    pub const fn inline_width(&self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Int32 => 4,
            Self::Int64 | Self::Float64 => 8,
            // pool handle
            Self::Varchar(_) => 8,
        }
    }

    /// Whether values of this type live fully inside the tile cell.
    pub const fn is_inlined(&self) -> bool {
        !matches!(self, Self::Varchar(_))
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "BOOLEAN",
            Self::Int32 => "INT",
            Self::Int64 => "BIGINT",
            Self::Float64 => "DOUBLE",
            Self::Varchar(_) => "VARCHAR",
        }
    }
}

impl std::fmt::Display for DataTypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Varchar(Some(n)) => write!(f, "VARCHAR({n})"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Data type with nullable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType {
    pub kind: DataTypeKind,
    pub nullable: bool,
}

impl std::fmt::Debug for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if self.nullable {
            write!(f, " (null)")?;
        }
        Ok(())
    }
}

impl DataType {
    pub const fn new(kind: DataTypeKind, nullable: bool) -> DataType {
        DataType { kind, nullable }
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn kind(&self) -> DataTypeKind {
        self.kind
    }
}

/// The extension methods for [`DataType`].
pub trait DataTypeExt {
    fn nullable(self) -> DataType;
    fn not_null(self) -> DataType;
}

impl DataTypeExt for DataTypeKind {
    fn nullable(self) -> DataType {
        DataType::new(self, true)
    }

    fn not_null(self) -> DataType {
        DataType::new(self, false)
    }
}

/// Primitive SQL value.
#[derive(Debug, Clone, PartialOrd, Default)]
pub enum DataValue {
    // NOTE: Null comes first.
    // => NULL is less than any non-NULL values
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
}

impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Int32(left), Self::Int32(right)) => left == right,
            (Self::Int64(left), Self::Int64(right)) => left == right,
            (Self::Float64(left), Self::Float64(right)) => left == right,
            (Self::String(left), Self::String(right)) => left == right,
            _ => false,
        }
    }
}

impl DataValue {
    /// Get the type of value. `None` means NULL.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Bool(_) => Some(DataTypeKind::Bool.not_null()),
            Self::Int32(_) => Some(DataTypeKind::Int32.not_null()),
            Self::Int64(_) => Some(DataTypeKind::Int64.not_null()),
            Self::Float64(_) => Some(DataTypeKind::Float64.not_null()),
            Self::String(_) => Some(DataTypeKind::Varchar(None).not_null()),
            Self::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Coerce the value to `kind` where the conversion is lossless.
    pub fn coerce_to(&self, kind: DataTypeKind) -> Result<DataValue, ConvertError> {
        Ok(match (self, kind) {
            (Self::Null, _) => Self::Null,
            (Self::Bool(b), DataTypeKind::Bool) => Self::Bool(*b),
            (Self::Int32(v), DataTypeKind::Int32) => Self::Int32(*v),
            (Self::Int32(v), DataTypeKind::Int64) => Self::Int64(*v as i64),
            (Self::Int32(v), DataTypeKind::Float64) => Self::Float64(*v as f64),
            (Self::Int64(v), DataTypeKind::Int32) => Self::Int32(
                (*v).try_into()
                    .map_err(|_| ConvertError::Cast(v.to_string(), "INT"))?,
            ),
            (Self::Int64(v), DataTypeKind::Int64) => Self::Int64(*v),
            (Self::Int64(v), DataTypeKind::Float64) => Self::Float64(*v as f64),
            (Self::Float64(v), DataTypeKind::Float64) => Self::Float64(*v),
            (Self::String(s), DataTypeKind::Varchar(_)) => Self::String(s.clone()),
            (v, kind) => return Err(ConvertError::Cast(format!("{v:?}"), kind.name())),
        })
    }
}

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// The error type of value type convention.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("failed to convert string {0:?} to int: {1:?}")]
    ParseInt(String, std::num::ParseIntError),
    #[error("failed to convert string {0:?} to float: {1:?}")]
    ParseFloat(String, std::num::ParseFloatError),
    #[error("failed to cast {0} to type {1}")]
    Cast(String, &'static str),
}

/// A materialized tuple.
pub type Row = Vec<DataValue>;
