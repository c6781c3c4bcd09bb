//! Terminal operator catalogues.
//!
//! These enums are the leaf vocabularies of the grammar: each one is encoded
//! as its own token kind in the action stream rather than through the main
//! rule vocabulary. The `index`/`from_index` maps follow the Spider operator
//! tables so ingested ids round-trip unchanged.

/// Aggregate function applied to a column unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggOp {
    /// No aggregation
    None,
    /// `MAX(...)`
    Max,
    /// `MIN(...)`
    Min,
    /// `COUNT(...)`
    Count,
    /// `SUM(...)`
    Sum,
    /// `AVG(...)`
    Avg,
}

impl AggOp {
    pub const ALL: [AggOp; 6] = [
        AggOp::None,
        AggOp::Max,
        AggOp::Min,
        AggOp::Count,
        AggOp::Sum,
        AggOp::Avg,
    ];

    /// Index into the Spider `AGG_OPS` table.
    pub fn index(self) -> usize {
        match self {
            AggOp::None => 0,
            AggOp::Max => 1,
            AggOp::Min => 2,
            AggOp::Count => 3,
            AggOp::Sum => 4,
            AggOp::Avg => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<AggOp> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AggOp::None => "none",
            AggOp::Max => "max",
            AggOp::Min => "min",
            AggOp::Count => "count",
            AggOp::Sum => "sum",
            AggOp::Avg => "avg",
        }
    }
}

/// Arithmetic operator combining two column units.
///
/// The Spider `UNIT_OPS` table also carries a "none" entry at index 0; that
/// case is represented structurally by [`super::ColumnUnit::Unary`], so it
/// has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOp {
    /// Subtraction (`-`)
    Minus,
    /// Addition (`+`)
    Plus,
    /// Multiplication (`*`)
    Times,
    /// Division (`/`)
    Divide,
}

impl UnitOp {
    pub const ALL: [UnitOp; 4] = [UnitOp::Minus, UnitOp::Plus, UnitOp::Times, UnitOp::Divide];

    /// Index into the Spider `UNIT_OPS` table (1-based; 0 is "none").
    pub fn index(self) -> usize {
        match self {
            UnitOp::Minus => 1,
            UnitOp::Plus => 2,
            UnitOp::Times => 3,
            UnitOp::Divide => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<UnitOp> {
        match index {
            1 => Some(UnitOp::Minus),
            2 => Some(UnitOp::Plus),
            3 => Some(UnitOp::Times),
            4 => Some(UnitOp::Divide),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitOp::Minus => "-",
            UnitOp::Plus => "+",
            UnitOp::Times => "*",
            UnitOp::Divide => "/",
        }
    }
}

/// Comparison operator of a `CmpCondition`.
///
/// Eleven members: the Spider `WHERE_OPS` table with the `not` flag folded
/// into `NotIn`/`NotLike`, and `between` lifted out into its own production
/// (`BetweenCondition`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessEqual,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
    /// `IS`
    Is,
}

impl CmpOp {
    pub const ALL: [CmpOp; 11] = [
        CmpOp::Equal,
        CmpOp::NotEqual,
        CmpOp::GreaterThan,
        CmpOp::GreaterEqual,
        CmpOp::LessThan,
        CmpOp::LessEqual,
        CmpOp::Like,
        CmpOp::NotLike,
        CmpOp::In,
        CmpOp::NotIn,
        CmpOp::Is,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Equal => "=",
            CmpOp::NotEqual => "!=",
            CmpOp::GreaterThan => ">",
            CmpOp::GreaterEqual => ">=",
            CmpOp::LessThan => "<",
            CmpOp::LessEqual => "<=",
            CmpOp::Like => "like",
            CmpOp::NotLike => "not like",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
        }
    }

    /// Map a Spider `(op_id, not_op)` pair from a condition unit.
    ///
    /// `between` (op_id 1) is not a comparison operator here and `exists`
    /// (op_id 11) is outside the grammar; both return `None`.
    pub fn from_spider(op_id: usize, negated: bool) -> Option<CmpOp> {
        let op = match op_id {
            2 => CmpOp::Equal,
            3 => CmpOp::GreaterThan,
            4 => CmpOp::LessThan,
            5 => CmpOp::GreaterEqual,
            6 => CmpOp::LessEqual,
            7 => CmpOp::NotEqual,
            8 => CmpOp::In,
            9 => CmpOp::Like,
            10 => CmpOp::Is,
            _ => return None,
        };
        match (op, negated) {
            (CmpOp::In, true) => Some(CmpOp::NotIn),
            (CmpOp::Like, true) => Some(CmpOp::NotLike),
            (_, true) => None,
            (op, false) => Some(op),
        }
    }

    /// Inverse of [`CmpOp::from_spider`]: `(op_id, not_op)`.
    pub fn to_spider(self) -> (usize, bool) {
        match self {
            CmpOp::Equal => (2, false),
            CmpOp::GreaterThan => (3, false),
            CmpOp::LessThan => (4, false),
            CmpOp::GreaterEqual => (5, false),
            CmpOp::LessEqual => (6, false),
            CmpOp::NotEqual => (7, false),
            CmpOp::In => (8, false),
            CmpOp::NotIn => (8, true),
            CmpOp::Like => (9, false),
            CmpOp::NotLike => (9, true),
            CmpOp::Is => (10, false),
        }
    }
}

/// Sort direction of an `ORDER BY` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderDir {
    Asc,
    Desc,
}

impl OrderDir {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderDir::Asc => "asc",
            OrderDir::Desc => "desc",
        }
    }

    pub fn from_str(s: &str) -> Option<OrderDir> {
        match s {
            "asc" => Some(OrderDir::Asc),
            "desc" => Some(OrderDir::Desc),
            _ => None,
        }
    }
}
