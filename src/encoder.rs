//! AST encoder: SQL object tree → ordered action sequence.
//!
//! The encoder walks the tree with an explicit work deque rather than the
//! call stack, so it shares one traversal policy with the decoder and the
//! two stay mirror images: the rule action for a node is emitted before its
//! children, children in declared field order, enumerable children
//! left-to-right in their original list order.

use std::collections::VecDeque;
use std::fmt;

use crate::ast::{
    AggOp, CmpOp, ColumnId, ColumnUnit, Condition, FromClause, GroupByClause, OrderByClause,
    OrderDir, SelectClause, SqlQuery, TableId, UnitOp, Value, ValueId,
};
use crate::grammar::RuleName;
use crate::vocabulary::{Action, ActionVocabulary};

/// Order in which open slots are expanded, shared by encoder and decoder.
///
/// Both are left-to-right over a node's fields; they differ in whether a
/// node's subtree is finished before its right siblings (depth-first) or
/// whole tree levels are emitted at a time (breadth-first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    #[default]
    DepthFirst,
    BreadthFirst,
}

/// The input tree violates a stated grammar limitation. Reported per
/// example; the caller logs and skips, the process continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedStructureError {
    /// Enumerable field count outside the declared `[min,max]` range
    CountOutOfRange {
        rule: RuleName,
        count: usize,
        min: usize,
        max: usize,
    },

    /// A set-operator arm that is itself a set-operator composition
    NestedSetOperator,

    /// More than one of intersect/union/except populated at one level
    MultipleSetOperators,

    /// The same table referenced twice in one FROM clause
    DuplicateTable { table: TableId },

    /// LIMIT without ORDER BY (not expressible in the grammar)
    LimitWithoutOrderBy,
}

impl fmt::Display for UnsupportedStructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedStructureError::CountOutOfRange {
                rule,
                count,
                min,
                max,
            } => write!(
                f,
                "{} with {} children is outside the declared range [{},{}]",
                rule, count, min, max
            ),
            UnsupportedStructureError::NestedSetOperator => {
                write!(f, "set-operator arm is itself a set-operator composition")
            }
            UnsupportedStructureError::MultipleSetOperators => {
                write!(f, "more than one of intersect/union/except is populated")
            }
            UnsupportedStructureError::DuplicateTable { table } => {
                write!(f, "table {} appears twice in FROM (self-joins unsupported)", table.0)
            }
            UnsupportedStructureError::LimitWithoutOrderBy => {
                write!(f, "LIMIT without ORDER BY is not expressible in the grammar")
            }
        }
    }
}

impl std::error::Error for UnsupportedStructureError {}

/// Borrowed work item of the encoding walk.
enum Task<'t> {
    Query(&'t SqlQuery, bool),
    Select(&'t SelectClause),
    From(&'t FromClause),
    Cond(&'t Condition),
    GroupBy(&'t GroupByClause),
    OrderBy(&'t OrderByClause),
    ColUnit(&'t ColumnUnit),
    Value(&'t Value),
    Table(TableId),
    Column(ColumnId),
    Val(ValueId),
    Agg(AggOp),
    Unit(UnitOp),
    Cmp(CmpOp),
    Order(OrderDir),
    Distinct(bool),
}

/// Encodes SQL object trees into action sequences against one vocabulary.
pub struct Encoder<'v> {
    vocab: &'v ActionVocabulary,
    order: TraversalOrder,
}

impl<'v> Encoder<'v> {
    pub fn new(vocab: &'v ActionVocabulary) -> Encoder<'v> {
        Encoder {
            vocab,
            order: TraversalOrder::default(),
        }
    }

    pub fn with_order(vocab: &'v ActionVocabulary, order: TraversalOrder) -> Encoder<'v> {
        Encoder { vocab, order }
    }

    pub fn order(&self) -> TraversalOrder {
        self.order
    }

    /// Encode a tree into the action sequence that replays to an equal tree
    /// under the same traversal order.
    pub fn encode(&self, query: &SqlQuery) -> Result<Vec<Action>, UnsupportedStructureError> {
        let mut actions = Vec::new();
        let mut tasks: VecDeque<Task<'_>> = VecDeque::new();
        tasks.push_back(Task::Query(query, true));

        while let Some(task) = tasks.pop_front() {
            match task {
                Task::Query(query, compound_allowed) => {
                    self.encode_query(query, compound_allowed, &mut actions, &mut tasks)?
                }
                Task::Select(select) => self.encode_select(select, &mut actions, &mut tasks)?,
                Task::From(from) => self.encode_from(from, &mut actions, &mut tasks)?,
                Task::Cond(cond) => self.encode_condition(cond, &mut actions, &mut tasks)?,
                Task::GroupBy(groupby) => self.encode_groupby(groupby, &mut actions, &mut tasks)?,
                Task::OrderBy(orderby) => self.encode_orderby(orderby, &mut actions, &mut tasks)?,
                Task::ColUnit(unit) => self.encode_col_unit(unit, &mut actions, &mut tasks)?,
                Task::Value(value) => self.encode_value(value, &mut actions, &mut tasks)?,
                Task::Table(id) => actions.push(Action::Table(id)),
                Task::Column(id) => actions.push(Action::Column(id)),
                Task::Val(id) => actions.push(Action::Value(id)),
                Task::Agg(op) => actions.push(Action::Agg(op)),
                Task::Unit(op) => actions.push(Action::Unit(op)),
                Task::Cmp(op) => actions.push(Action::Cmp(op)),
                Task::Order(dir) => actions.push(Action::Order(dir)),
                Task::Distinct(b) => actions.push(Action::Distinct(b)),
            }
        }
        Ok(actions)
    }

    /// Emit the rule action for `(name, count)` and schedule its children.
    fn apply<'t>(
        &self,
        name: RuleName,
        count: usize,
        children: Vec<Task<'t>>,
        actions: &mut Vec<Action>,
        tasks: &mut VecDeque<Task<'t>>,
    ) -> Result<(), UnsupportedStructureError> {
        let id = self.vocab.id_of(name, count).map_err(|_| {
            // Count outside the resolved catalogue; report the declared
            // range for the caller's log line.
            let (min, max) = self.vocab.grammar().repeat_range(name).unwrap_or((0, 0));
            UnsupportedStructureError::CountOutOfRange {
                rule: name,
                count,
                min,
                max,
            }
        })?;
        actions.push(Action::Apply(id));
        match self.order {
            TraversalOrder::DepthFirst => {
                for child in children.into_iter().rev() {
                    tasks.push_front(child);
                }
            }
            TraversalOrder::BreadthFirst => {
                for child in children {
                    tasks.push_back(child);
                }
            }
        }
        Ok(())
    }

    fn encode_query<'t>(
        &self,
        query: &'t SqlQuery,
        compound_allowed: bool,
        actions: &mut Vec<Action>,
        tasks: &mut VecDeque<Task<'t>>,
    ) -> Result<(), UnsupportedStructureError> {
        if query.is_compound() && !compound_allowed {
            return Err(UnsupportedStructureError::NestedSetOperator);
        }
        let (name, children) = match query {
            SqlQuery::Intersect(left, right) => (
                RuleName::Intersect,
                vec![Task::Query(left, false), Task::Query(right, false)],
            ),
            SqlQuery::Union(left, right) => (
                RuleName::Union,
                vec![Task::Query(left, false), Task::Query(right, false)],
            ),
            SqlQuery::Except(left, right) => (
                RuleName::Except,
                vec![Task::Query(left, false), Task::Query(right, false)],
            ),
            SqlQuery::Query(core) => (
                RuleName::Sql,
                vec![
                    Task::Select(&core.select),
                    Task::From(&core.from),
                    Task::Cond(&core.where_clause),
                    Task::GroupBy(&core.group_by),
                    Task::OrderBy(&core.order_by),
                ],
            ),
        };
        self.apply(name, 0, children, actions, tasks)
    }

    fn encode_select<'t>(
        &self,
        select: &'t SelectClause,
        actions: &mut Vec<Action>,
        tasks: &mut VecDeque<Task<'t>>,
    ) -> Result<(), UnsupportedStructureError> {
        let mut children = vec![Task::Distinct(select.distinct)];
        children.extend(select.columns.iter().map(Task::ColUnit));
        self.apply(
            RuleName::SelectColumn,
            select.columns.len(),
            children,
            actions,
            tasks,
        )
    }

    fn encode_from<'t>(
        &self,
        from: &'t FromClause,
        actions: &mut Vec<Action>,
        tasks: &mut VecDeque<Task<'t>>,
    ) -> Result<(), UnsupportedStructureError> {
        match from {
            FromClause::Tables { tables, condition } => {
                for (i, table) in tables.iter().enumerate() {
                    if tables[..i].contains(table) {
                        return Err(UnsupportedStructureError::DuplicateTable { table: *table });
                    }
                }
                let mut children: Vec<Task<'_>> =
                    tables.iter().map(|t| Task::Table(*t)).collect();
                children.push(Task::Cond(condition));
                self.apply(RuleName::FromTable, tables.len(), children, actions, tasks)
            }
            FromClause::Subquery(query) => self.apply(
                RuleName::FromSql,
                0,
                vec![Task::Query(query, true)],
                actions,
                tasks,
            ),
        }
    }

    fn encode_condition<'t>(
        &self,
        cond: &'t Condition,
        actions: &mut Vec<Action>,
        tasks: &mut VecDeque<Task<'t>>,
    ) -> Result<(), UnsupportedStructureError> {
        match cond {
            Condition::And(parts) => self.apply(
                RuleName::AndCondition,
                parts.len(),
                parts.iter().map(Task::Cond).collect(),
                actions,
                tasks,
            ),
            Condition::Or(parts) => self.apply(
                RuleName::OrCondition,
                parts.len(),
                parts.iter().map(Task::Cond).collect(),
                actions,
                tasks,
            ),
            Condition::Cmp { left, op, value } => self.apply(
                RuleName::CmpCondition,
                0,
                vec![Task::ColUnit(left), Task::Cmp(*op), Task::Value(value)],
                actions,
                tasks,
            ),
            Condition::Between { left, low, high } => self.apply(
                RuleName::BetweenCondition,
                0,
                vec![Task::ColUnit(left), Task::Value(low), Task::Value(high)],
                actions,
                tasks,
            ),
            Condition::None => self.apply(RuleName::NoCondition, 0, vec![], actions, tasks),
        }
    }

    fn encode_groupby<'t>(
        &self,
        groupby: &'t GroupByClause,
        actions: &mut Vec<Action>,
        tasks: &mut VecDeque<Task<'t>>,
    ) -> Result<(), UnsupportedStructureError> {
        match groupby {
            GroupByClause::None => self.apply(RuleName::NoGroupBy, 0, vec![], actions, tasks),
            GroupByClause::Columns(columns) => self.apply(
                RuleName::GroupByColumn,
                columns.len(),
                columns.iter().map(Task::ColUnit).collect(),
                actions,
                tasks,
            ),
            GroupByClause::Having { columns, condition } => {
                let mut children: Vec<Task<'_>> = columns.iter().map(Task::ColUnit).collect();
                children.push(Task::Cond(condition));
                self.apply(
                    RuleName::GroupByHavingColumn,
                    columns.len(),
                    children,
                    actions,
                    tasks,
                )
            }
        }
    }

    fn encode_orderby<'t>(
        &self,
        orderby: &'t OrderByClause,
        actions: &mut Vec<Action>,
        tasks: &mut VecDeque<Task<'t>>,
    ) -> Result<(), UnsupportedStructureError> {
        match orderby {
            OrderByClause::None => self.apply(RuleName::NoOrderBy, 0, vec![], actions, tasks),
            OrderByClause::Columns { columns, dir } => {
                let mut children: Vec<Task<'_>> = columns.iter().map(Task::ColUnit).collect();
                children.push(Task::Order(*dir));
                self.apply(
                    RuleName::OrderByColumn,
                    columns.len(),
                    children,
                    actions,
                    tasks,
                )
            }
            OrderByClause::Limit {
                columns,
                dir,
                limit,
            } => {
                let mut children: Vec<Task<'_>> = columns.iter().map(Task::ColUnit).collect();
                children.push(Task::Order(*dir));
                children.push(Task::Val(*limit));
                self.apply(
                    RuleName::OrderByLimitColumn,
                    columns.len(),
                    children,
                    actions,
                    tasks,
                )
            }
        }
    }

    fn encode_col_unit<'t>(
        &self,
        unit: &'t ColumnUnit,
        actions: &mut Vec<Action>,
        tasks: &mut VecDeque<Task<'t>>,
    ) -> Result<(), UnsupportedStructureError> {
        match unit {
            ColumnUnit::Unary {
                agg,
                distinct,
                column,
            } => self.apply(
                RuleName::UnaryColumnUnit,
                0,
                vec![
                    Task::Agg(*agg),
                    Task::Distinct(*distinct),
                    Task::Column(*column),
                ],
                actions,
                tasks,
            ),
            ColumnUnit::Binary {
                agg,
                op,
                left,
                right,
            } => self.apply(
                RuleName::BinaryColumnUnit,
                0,
                vec![
                    Task::Agg(*agg),
                    Task::Unit(*op),
                    Task::ColUnit(left),
                    Task::ColUnit(right),
                ],
                actions,
                tasks,
            ),
        }
    }

    fn encode_value<'t>(
        &self,
        value: &'t Value,
        actions: &mut Vec<Action>,
        tasks: &mut VecDeque<Task<'t>>,
    ) -> Result<(), UnsupportedStructureError> {
        match value {
            Value::Sql(query) => self.apply(
                RuleName::SqlValue,
                0,
                vec![Task::Query(query, true)],
                actions,
                tasks,
            ),
            Value::Literal(id) => {
                self.apply(RuleName::LiteralValue, 0, vec![Task::Val(*id)], actions, tasks)
            }
            Value::Column(id) => self.apply(
                RuleName::ColumnValue,
                0,
                vec![Task::Column(*id)],
                actions,
                tasks,
            ),
        }
    }
}
