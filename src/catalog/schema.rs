// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! Physical tuple layout: a [`Schema`] fixes the byte offsets of a
//! tile's columns, and [`partition`] splits a table schema into the
//! per-tile schemas plus the column locator map.

use itertools::Itertools;
use smallvec::SmallVec;

use super::{CatalogError, ColumnCatalog};
use crate::types::ColumnId;

/// Immutable physical layout of one tile: an ordered list of columns
/// with precomputed cell offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnCatalog>,
    /// Byte offset of each column's cell within a row.
    offsets: Vec<usize>,
    /// Total byte width of one row.
    tuple_width: usize,
}

impl Schema {
    pub fn new(columns: Vec<ColumnCatalog>) -> Schema {
        let mut offsets = Vec::with_capacity(columns.len());
        let mut width = 0;
        for col in &columns {
            offsets.push(width);
            width += col.inline_width();
        }
        Schema {
            columns,
            offsets,
            tuple_width: width,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> &ColumnCatalog {
        &self.columns[idx]
    }

    pub fn columns(&self) -> &[ColumnCatalog] {
        &self.columns
    }

    /// Byte offset of column `idx` within a row.
    pub fn offset(&self, idx: usize) -> usize {
        self.offsets[idx]
    }

    pub fn tuple_width(&self) -> usize {
        self.tuple_width
    }
}

/// Where a logical column lives: which tile of the group, and which
/// column within that tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLocation {
    pub tile_offset: usize,
    pub tile_column_id: usize,
}

/// Precomputed logical-column → (tile, intra-tile column) locator,
/// indexed by column id. Built once at tile group construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap(SmallVec<[ColumnLocation; 8]>);

impl ColumnMap {
    pub fn locate(&self, column_id: ColumnId) -> ColumnLocation {
        self.0[column_id as usize]
    }

    pub fn column_count(&self) -> usize {
        self.0.len()
    }
}

/// Split `columns` into tile schemas following `layout`, a list of
/// column-id groups. The layout must be a total, disjoint cover of the
/// table schema.
///
/// Returns the per-tile schemas (parallel to `layout`) and the locator
/// map fixing `(tile, intra)` for every logical column.
pub fn partition(
    columns: &[ColumnCatalog],
    layout: &[Vec<ColumnId>],
) -> Result<(Vec<Schema>, ColumnMap), CatalogError> {
    let mut locations: Vec<Option<ColumnLocation>> = vec![None; columns.len()];
    let mut schemas = Vec::with_capacity(layout.len());

    for (tile_offset, group) in layout.iter().enumerate() {
        if group.is_empty() {
            return Err(CatalogError::InvalidLayout(format!(
                "tile {tile_offset} has no columns"
            )));
        }
        let mut tile_columns = Vec::with_capacity(group.len());
        for (tile_column_id, &column_id) in group.iter().enumerate() {
            let column = columns.get(column_id as usize).ok_or_else(|| {
                CatalogError::InvalidLayout(format!("unknown column id {column_id}"))
            })?;
            let slot = &mut locations[column_id as usize];
            if slot.is_some() {
                return Err(CatalogError::InvalidLayout(format!(
                    "column {column_id} mapped twice"
                )));
            }
            *slot = Some(ColumnLocation {
                tile_offset,
                tile_column_id,
            });
            tile_columns.push(column.clone());
        }
        schemas.push(Schema::new(tile_columns));
    }

    let locations = locations
        .into_iter()
        .enumerate()
        .map(|(id, loc)| {
            loc.ok_or_else(|| CatalogError::InvalidLayout(format!("column {id} unmapped")))
        })
        .try_collect()?;

    Ok((schemas, ColumnMap(locations)))
}

/// The trivial layout: every column in one tile.
pub fn single_tile_layout(columns: &[ColumnCatalog]) -> Vec<Vec<ColumnId>> {
    vec![(0..columns.len() as ColumnId).collect()]
}
