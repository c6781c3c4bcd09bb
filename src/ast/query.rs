//! Root query composition.

use crate::ast::clauses::{Condition, FromClause, GroupByClause, OrderByClause, SelectClause};

/// A complete SQL query: a single block or a set-operator composition.
///
/// The grammar admits one set operator per composition; the arms of a set
/// operator must be plain [`SqlQuery::Query`] blocks. Subqueries reached
/// through `FROM (...)` or value positions are full [`SqlQuery`]s again and
/// may themselves be compound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlQuery {
    /// `<left> INTERSECT <right>`
    Intersect(Box<SqlQuery>, Box<SqlQuery>),

    /// `<left> UNION <right>`
    Union(Box<SqlQuery>, Box<SqlQuery>),

    /// `<left> EXCEPT <right>`
    Except(Box<SqlQuery>, Box<SqlQuery>),

    /// A plain `SELECT` block
    Query(QueryCore),
}

impl SqlQuery {
    /// Whether the root of this query is a set-operator composition.
    pub fn is_compound(&self) -> bool {
        !matches!(self, SqlQuery::Query(_))
    }
}

/// One `SELECT` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCore {
    pub select: SelectClause,
    pub from: FromClause,
    pub where_clause: Condition,
    pub group_by: GroupByClause,
    pub order_by: OrderByClause,
}
