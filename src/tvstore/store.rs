//! The aligned TV-Store itself (§4.1).
//!
//! Column-major, single-writer (§5 "single-writer per instance; readers
//! that want concurrent access must clone first"), grounded on the
//! teacher's `storage::columnar` column/value split, simplified to the
//! plain typed-column-plus-bitmap shape this spec calls for (no
//! dictionary/run-length/delta encoding — that machinery belongs to the
//! tablet/file-format layer this spec puts out of scope).

use super::column::Column;
use super::types::{Cell, ColumnType, RenderedRow};
use crate::error::{DbError, Result};

#[derive(Debug, Clone)]
pub struct TvStore {
    timestamps: Vec<i64>,
    columns: Vec<Column>,
}

impl TvStore {
    pub fn new(column_types: Vec<ColumnType>) -> Self {
        Self {
            timestamps: Vec::new(),
            columns: column_types.into_iter().map(Column::new).collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.timestamps.len() {
            Err(DbError::IndexOutOfRange {
                index,
                len: self.timestamps.len(),
            })
        } else {
            Ok(())
        }
    }

    fn check_column(&self, col: usize) -> Result<()> {
        if col >= self.columns.len() {
            Err(DbError::IndexOutOfRange {
                index: col,
                len: self.columns.len(),
            })
        } else {
            Ok(())
        }
    }

    /// `columnOrder[j] = k`: logical input position j carries the value
    /// for physical column k (§4.1 "Column-order remapping").
    pub fn put_aligned(&mut self, ts: i64, values: &[Cell], column_order: &[usize]) -> Result<()> {
        self.put_aligned_with_nulls(ts, values, None, column_order)
    }

    pub fn put_aligned_with_nulls(
        &mut self,
        ts: i64,
        values: &[Cell],
        null_mask: Option<&[bool]>,
        column_order: &[usize],
    ) -> Result<()> {
        if values.len() != column_order.len() {
            return Err(DbError::InvalidArgument(format!(
                "values len {} != columnOrder len {}",
                values.len(),
                column_order.len()
            )));
        }
        for (j, &physical) in column_order.iter().enumerate() {
            self.check_column(physical)?;
            let is_null = null_mask.map_or(false, |m| m[j]);
            self.columns[physical].push(&values[j], is_null)?;
        }
        self.timestamps.push(ts);
        Ok(())
    }

    /// Append `len` rows starting at `start` from parallel arrays
    /// (§4.1 putAlignedBatch). `null_bitmaps[j]`, if present, is the
    /// per-row null flag for logical column j across the whole batch.
    pub fn put_aligned_batch(
        &mut self,
        ts: &[i64],
        values: &[Vec<Cell>],
        null_bitmaps: Option<&[Vec<bool>]>,
        column_order: &[usize],
        start: usize,
        len: usize,
    ) -> Result<()> {
        if ts.len() < start + len || values.len() < start + len {
            return Err(DbError::InvalidArgument(
                "batch arrays shorter than start+len".into(),
            ));
        }
        if let Some(bitmaps) = null_bitmaps {
            if bitmaps.len() != column_order.len() {
                return Err(DbError::InvalidArgument(
                    "null_bitmaps length must match columnOrder length".into(),
                ));
            }
        }

        for row in start..start + len {
            let mask: Option<Vec<bool>> = null_bitmaps
                .map(|bitmaps| bitmaps.iter().map(|col_mask| col_mask[row]).collect());
            self.put_aligned_with_nulls(
                ts[row],
                &values[row],
                mask.as_deref(),
                column_order,
            )?;
        }
        Ok(())
    }

    pub fn get_time(&self, index: usize) -> Result<i64> {
        self.check_index(index)?;
        Ok(self.timestamps[index])
    }

    pub fn is_null(&self, index: usize, col: usize) -> Result<bool> {
        self.check_index(index)?;
        self.check_column(col)?;
        Ok(self.columns[col].is_null(index))
    }

    /// Render row `index` as a typed tuple, columns masked to null per
    /// bitmap (§4.1 "Rendering policy").
    pub fn get_aligned(&self, index: usize) -> Result<RenderedRow> {
        self.check_index(index)?;
        let values = self
            .columns
            .iter()
            .map(|col| {
                if col.is_null(index) {
                    None
                } else {
                    Some(col.render(index))
                }
            })
            .collect();
        Ok(RenderedRow {
            timestamp: self.timestamps[index],
            values,
        })
    }

    /// Stable ascending sort by timestamp; a no-op on an empty store
    /// (§8 boundary behaviors). Bitmaps permute congruently (§4.1).
    pub fn sort(&mut self) {
        if self.timestamps.is_empty() {
            return;
        }
        let mut order: Vec<usize> = (0..self.timestamps.len()).collect();
        order.sort_by_key(|&i| self.timestamps[i]);

        self.timestamps = order.iter().map(|&i| self.timestamps[i]).collect();
        for column in &mut self.columns {
            column.reorder(&order);
        }
    }

    /// All row indices whose timestamp falls in `[start, end)`,
    /// assuming the store is already sorted (binary-search bounded).
    pub fn time_range(&self, start: i64, end: i64) -> Vec<usize> {
        let lo = self.timestamps.partition_point(|&t| t < start);
        let hi = self.timestamps.partition_point(|&t| t < end);
        (lo..hi).collect()
    }

    /// Binary search for `ts` in an already-sorted store: `Ok(i)` if an
    /// exact match exists at row i, `Err(i)` for the insertion point
    /// that keeps ascending order.
    pub fn binary_search_time(&self, ts: i64) -> std::result::Result<usize, usize> {
        self.timestamps.binary_search(&ts)
    }
}
