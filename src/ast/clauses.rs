//! Clause subtrees of a query block.
//!
//! Each enum corresponds to one non-terminal of the grammar and each variant
//! to one of its productions, so encode/decode sites match exhaustively.

use crate::ast::operators::{CmpOp, OrderDir};
use crate::ast::query::SqlQuery;
use crate::ast::units::{ColumnId, ColumnUnit, TableId, ValueId};

/// The `SELECT` clause: an ordered, non-empty list of column units.
///
/// List order is semantically meaningful and preserved exactly through
/// encode/decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectClause {
    /// Clause-level `SELECT DISTINCT`
    pub distinct: bool,
    pub columns: Vec<ColumnUnit>,
}

/// The `FROM` clause: a list of joined tables with join conditions, or a
/// single subquery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FromClause {
    /// `FROM t1 JOIN t2 ... ON <condition>`
    ///
    /// The same table may not appear twice (self-joins are outside the
    /// grammar).
    Tables {
        tables: Vec<TableId>,
        condition: Condition,
    },

    /// `FROM (SELECT ...)`
    Subquery(Box<SqlQuery>),
}

/// A condition tree (`WHERE`, `HAVING`, or join conditions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Conjunction of two to four subconditions
    And(Vec<Condition>),

    /// Disjunction of two to four subconditions
    Or(Vec<Condition>),

    /// `<column unit> <op> <value>`
    Cmp {
        left: ColumnUnit,
        op: CmpOp,
        value: Value,
    },

    /// `<column unit> BETWEEN <low> AND <high>`
    Between {
        left: ColumnUnit,
        low: Value,
        high: Value,
    },

    /// Empty condition slot (no WHERE clause, no join conditions)
    None,
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A nested subquery, e.g. `c IN (SELECT ...)`
    Sql(Box<SqlQuery>),

    /// A literal grounded as an index into the candidate-value list
    Literal(ValueId),

    /// A column reference (column-to-column comparison)
    Column(ColumnId),
}

/// The `GROUP BY` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupByClause {
    /// No GROUP BY
    None,

    /// `GROUP BY c1, c2, ...`
    Columns(Vec<ColumnUnit>),

    /// `GROUP BY c1, ... HAVING <condition>`
    Having {
        columns: Vec<ColumnUnit>,
        condition: Condition,
    },
}

/// The `ORDER BY` clause.
///
/// LIMIT is only representable together with ORDER BY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderByClause {
    /// No ORDER BY
    None,

    /// `ORDER BY c1, ... ASC|DESC`
    Columns {
        columns: Vec<ColumnUnit>,
        dir: OrderDir,
    },

    /// `ORDER BY c1, ... ASC|DESC LIMIT n`
    Limit {
        columns: Vec<ColumnUnit>,
        dir: OrderDir,
        limit: ValueId,
    },
}
