//! Schema ids and column units.

use crate::ast::operators::{AggOp, UnitOp};

/// Index of a table in the externally owned schema table list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub usize);

/// Index of a column in the externally owned schema column list.
///
/// Column 0 is conventionally the wildcard `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId(pub usize);

/// Index into the externally owned candidate-value list of one example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub usize);

/// A column expression: one column with optional aggregation, or an
/// arithmetic combination of two column units.
///
/// This is the merged form of the Spider `val_unit`/`col_unit` pair: the
/// outer aggregate of a select item and the per-column aggregate both live
/// on the unit itself, so one tree shape covers select items, group-by keys,
/// order-by keys, and condition operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnUnit {
    /// A single column reference.
    Unary {
        agg: AggOp,
        distinct: bool,
        column: ColumnId,
    },

    /// Two column units combined with an arithmetic operator, optionally
    /// aggregated as a whole (e.g. `SUM(a - b)`).
    Binary {
        agg: AggOp,
        op: UnitOp,
        left: Box<ColumnUnit>,
        right: Box<ColumnUnit>,
    },
}

impl ColumnUnit {
    /// Plain column reference with no aggregate and no DISTINCT.
    pub fn column(column: ColumnId) -> ColumnUnit {
        ColumnUnit::Unary {
            agg: AggOp::None,
            distinct: false,
            column,
        }
    }

    /// Aggregated column reference, e.g. `COUNT(c)`.
    pub fn aggregated(agg: AggOp, column: ColumnId) -> ColumnUnit {
        ColumnUnit::Unary {
            agg,
            distinct: false,
            column,
        }
    }
}
