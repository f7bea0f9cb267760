//! Declared column types and rendered cell values (§3, §4.1).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    Int32,
    Int64,
    Float,
    Double,
    Text,
}

/// A single typed cell, independent of whether it is currently masked
/// null by the column's bitmap (§4.1 "Rendering policy").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    /// Text renders as bytes (UTF-8 preferred); kept as `String` here
    /// since every caller in this codebase constructs valid UTF-8.
    Text(String),
}

impl Cell {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Cell::Bool(_) => ColumnType::Bool,
            Cell::Int32(_) => ColumnType::Int32,
            Cell::Int64(_) => ColumnType::Int64,
            Cell::Float(_) => ColumnType::Float,
            Cell::Double(_) => ColumnType::Double,
            Cell::Text(_) => ColumnType::Text,
        }
    }
}

/// A rendered row: each column either its typed value or null,
/// masked against the row's bitmap entry (§4.1 "Rendering policy").
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRow {
    pub timestamp: i64,
    pub values: Vec<Option<Cell>>,
}
