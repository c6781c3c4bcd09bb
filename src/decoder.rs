//! AST decoder: action sequence → SQL object tree.
//!
//! Decoding maintains an explicit [`DerivationState`]: a frontier of open
//! slots plus an arena of partially filled nodes. Every applied action must
//! target the current frontier slot's declared type; mismatches are
//! [`GrammarViolationError`]s, the primary consistency check shared by
//! training-time validation and inference-time masking. A sequence that ends
//! before the frontier empties yields an explicit incomplete outcome, not an
//! error — the caller decides what a truncated derivation means.

use std::collections::VecDeque;
use std::fmt;

use crate::ast::{
    AggOp, CmpOp, ColumnId, ColumnUnit, Condition, FromClause, GroupByClause, OrderByClause,
    OrderDir, QueryCore, SelectClause, SqlQuery, TableId, UnitOp, Value, ValueId,
};
use crate::encoder::TraversalOrder;
use crate::grammar::{FieldType, NonTerminal, RuleName, TerminalKind};
use crate::vocabulary::{Action, ActionVocabulary, UnknownActionError};

/// An applied action did not fit the frontier slot it targeted.
///
/// At inference this is unreachable when sampling from the legal-action
/// mask; seeing it there indicates a corrupted action stream or a masking
/// bug. At training-time validation it is a reportable per-example error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarViolationError {
    /// The action's type does not match the slot's declared type
    TypeMismatch {
        step: usize,
        expected: FieldType,
        action: Action,
    },

    /// A set-operator rule applied at a slot where compounds are suppressed
    /// (the arm of another set operator)
    CompoundNotAllowed { step: usize, action: Action },
}

impl fmt::Display for GrammarViolationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarViolationError::TypeMismatch {
                step,
                expected,
                action,
            } => write!(
                f,
                "step {}: slot expects {}, got action {:?}",
                step, expected, action
            ),
            GrammarViolationError::CompoundNotAllowed { step, action } => write!(
                f,
                "step {}: set-operator action {:?} inside a set-operator arm",
                step, action
            ),
        }
    }
}

impl std::error::Error for GrammarViolationError {}

/// Errors terminating a decode run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Action/slot mismatch
    Violation(GrammarViolationError),

    /// Rule id outside the vocabulary
    UnknownAction(UnknownActionError),

    /// An action arrived after the derivation completed
    TrailingAction { step: usize },

    /// `finish` called on an incomplete derivation
    IncompleteDerivation { remaining: usize },

    /// Internal arena shape mismatch; indicates a construction bug
    Corrupted { detail: &'static str },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Violation(e) => e.fmt(f),
            DecodeError::UnknownAction(e) => e.fmt(f),
            DecodeError::TrailingAction { step } => {
                write!(f, "step {}: action after the derivation completed", step)
            }
            DecodeError::IncompleteDerivation { remaining } => {
                write!(f, "derivation incomplete: {} open slots", remaining)
            }
            DecodeError::Corrupted { detail } => write!(f, "corrupted derivation: {}", detail),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Violation(e) => Some(e),
            DecodeError::UnknownAction(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GrammarViolationError> for DecodeError {
    fn from(e: GrammarViolationError) -> Self {
        DecodeError::Violation(e)
    }
}

impl From<UnknownActionError> for DecodeError {
    fn from(e: UnknownActionError) -> Self {
        DecodeError::UnknownAction(e)
    }
}

/// One open, not-yet-filled slot of the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Declared type the filling action must match
    pub field: FieldType,
    /// Whether a set-operator rule may fill this slot (false inside
    /// set-operator arms)
    pub compound_allowed: bool,
    /// Arena position this slot writes into
    target: (usize, usize),
}

/// A filled field in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filled {
    Node(usize),
    Table(TableId),
    Column(ColumnId),
    Value(ValueId),
    Agg(AggOp),
    Unit(UnitOp),
    Cmp(CmpOp),
    Order(OrderDir),
    Distinct(bool),
}

/// A node under construction: its chosen rule plus per-field fills.
#[derive(Debug, Clone)]
struct PendingNode {
    /// `None` only for the synthetic root holding the top-level sql slot
    rule: Option<RuleName>,
    children: Vec<Option<Filled>>,
}

/// The explicit decode-time state: frontier of open slots plus the pending
/// node arena. Created per decode run, discarded at completion or failure.
///
/// Exposing this as a plain value makes the legal-action oracle a pure
/// function of state and allows partial derivations to be inspected or
/// resumed.
#[derive(Debug, Clone)]
pub struct DerivationState {
    order: TraversalOrder,
    frontier: VecDeque<Slot>,
    nodes: Vec<PendingNode>,
    steps: usize,
}

impl DerivationState {
    /// Fresh state with a single open `sql` slot.
    pub fn new(order: TraversalOrder) -> DerivationState {
        let root = PendingNode {
            rule: None,
            children: vec![None],
        };
        let mut frontier = VecDeque::new();
        frontier.push_back(Slot {
            field: FieldType::NonTerminal(NonTerminal::Sql),
            compound_allowed: true,
            target: (0, 0),
        });
        DerivationState {
            order,
            frontier,
            nodes: vec![root],
            steps: 0,
        }
    }

    /// The slot the next action must fill, or `None` when complete.
    pub fn current_slot(&self) -> Option<&Slot> {
        self.frontier.front()
    }

    /// Number of open slots.
    pub fn remaining(&self) -> usize {
        self.frontier.len()
    }

    /// Number of actions applied so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_complete(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Apply one action to the current frontier slot.
    pub fn apply(&mut self, action: Action, vocab: &ActionVocabulary) -> Result<(), DecodeError> {
        let step = self.steps;
        let slot = match self.frontier.pop_front() {
            Some(slot) => slot,
            None => return Err(DecodeError::TrailingAction { step }),
        };

        let filled = match slot.field {
            FieldType::Terminal(kind) => match (kind, action) {
                (TerminalKind::TableId, Action::Table(id)) => Filled::Table(id),
                (TerminalKind::ColumnId, Action::Column(id)) => Filled::Column(id),
                (TerminalKind::ValueId, Action::Value(id)) => Filled::Value(id),
                (TerminalKind::AggOp, Action::Agg(op)) => Filled::Agg(op),
                (TerminalKind::UnitOp, Action::Unit(op)) => Filled::Unit(op),
                (TerminalKind::CmpOp, Action::Cmp(op)) => Filled::Cmp(op),
                (TerminalKind::OrderDir, Action::Order(dir)) => Filled::Order(dir),
                (TerminalKind::Distinct, Action::Distinct(b)) => Filled::Distinct(b),
                _ => {
                    self.frontier.push_front(slot);
                    return Err(GrammarViolationError::TypeMismatch {
                        step,
                        expected: slot.field,
                        action,
                    }
                    .into());
                }
            },
            FieldType::NonTerminal(nt) => {
                let id = match action {
                    Action::Apply(id) => id,
                    _ => {
                        self.frontier.push_front(slot);
                        return Err(GrammarViolationError::TypeMismatch {
                            step,
                            expected: slot.field,
                            action,
                        }
                        .into());
                    }
                };
                let rule = match vocab.rule_of(id) {
                    Ok(rule) => rule,
                    Err(e) => {
                        self.frontier.push_front(slot);
                        return Err(e.into());
                    }
                };
                if rule.lhs != nt {
                    self.frontier.push_front(slot);
                    return Err(GrammarViolationError::TypeMismatch {
                        step,
                        expected: slot.field,
                        action,
                    }
                    .into());
                }
                if rule.name.is_compound() && !slot.compound_allowed {
                    self.frontier.push_front(slot);
                    return Err(GrammarViolationError::CompoundNotAllowed { step, action }.into());
                }

                let node_idx = self.nodes.len();
                self.nodes.push(PendingNode {
                    rule: Some(rule.name),
                    children: vec![None; rule.fields.len()],
                });

                // Set-operator arms may not themselves be compound; any
                // other nested sql slot (subqueries) may.
                let child_compound_allowed = !rule.name.is_compound();
                let slots: Vec<Slot> = rule
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(i, field)| Slot {
                        field: *field,
                        compound_allowed: child_compound_allowed,
                        target: (node_idx, i),
                    })
                    .collect();
                match self.order {
                    TraversalOrder::DepthFirst => {
                        for slot in slots.into_iter().rev() {
                            self.frontier.push_front(slot);
                        }
                    }
                    TraversalOrder::BreadthFirst => {
                        for slot in slots {
                            self.frontier.push_back(slot);
                        }
                    }
                }
                Filled::Node(node_idx)
            }
        };

        let (node, field_idx) = slot.target;
        self.nodes[node].children[field_idx] = Some(filled);
        self.steps += 1;
        Ok(())
    }

    /// Extract the finished tree. Fails with an explicit error when open
    /// slots remain.
    pub fn finish(self) -> Result<SqlQuery, DecodeError> {
        if !self.is_complete() {
            return Err(DecodeError::IncompleteDerivation {
                remaining: self.remaining(),
            });
        }
        let root = self.child(0, 0)?;
        self.build_query(root)
    }

    fn child(&self, node: usize, field: usize) -> Result<Filled, DecodeError> {
        self.nodes
            .get(node)
            .and_then(|n| n.children.get(field))
            .copied()
            .flatten()
            .ok_or(DecodeError::Corrupted {
                detail: "missing child in completed derivation",
            })
    }

    fn node_rule(&self, filled: Filled) -> Result<(usize, RuleName), DecodeError> {
        match filled {
            Filled::Node(idx) => {
                let rule = self.nodes[idx].rule.ok_or(DecodeError::Corrupted {
                    detail: "interior node without a rule",
                })?;
                Ok((idx, rule))
            }
            _ => Err(DecodeError::Corrupted {
                detail: "expected a node, found a terminal",
            }),
        }
    }

    fn arity(&self, node: usize) -> usize {
        self.nodes[node].children.len()
    }

    fn build_query(&self, filled: Filled) -> Result<SqlQuery, DecodeError> {
        let (idx, rule) = self.node_rule(filled)?;
        match rule {
            RuleName::Intersect | RuleName::Union | RuleName::Except => {
                let left = Box::new(self.build_query(self.child(idx, 0)?)?);
                let right = Box::new(self.build_query(self.child(idx, 1)?)?);
                Ok(match rule {
                    RuleName::Intersect => SqlQuery::Intersect(left, right),
                    RuleName::Union => SqlQuery::Union(left, right),
                    _ => SqlQuery::Except(left, right),
                })
            }
            RuleName::Sql => {
                let select = self.build_select(self.child(idx, 0)?)?;
                let from = self.build_from(self.child(idx, 1)?)?;
                let where_clause = self.build_condition(self.child(idx, 2)?)?;
                let group_by = self.build_groupby(self.child(idx, 3)?)?;
                let order_by = self.build_orderby(self.child(idx, 4)?)?;
                Ok(SqlQuery::Query(QueryCore {
                    select,
                    from,
                    where_clause,
                    group_by,
                    order_by,
                }))
            }
            _ => Err(DecodeError::Corrupted {
                detail: "non-sql rule in a sql slot",
            }),
        }
    }

    fn build_select(&self, filled: Filled) -> Result<SelectClause, DecodeError> {
        let (idx, rule) = self.node_rule(filled)?;
        if rule != RuleName::SelectColumn {
            return Err(DecodeError::Corrupted {
                detail: "non-select rule in a select slot",
            });
        }
        let distinct = self.take_distinct(idx, 0)?;
        let mut columns = Vec::new();
        for field in 1..self.arity(idx) {
            columns.push(self.build_col_unit(self.child(idx, field)?)?);
        }
        Ok(SelectClause { distinct, columns })
    }

    fn build_from(&self, filled: Filled) -> Result<FromClause, DecodeError> {
        let (idx, rule) = self.node_rule(filled)?;
        match rule {
            RuleName::FromTable => {
                let arity = self.arity(idx);
                let mut tables = Vec::new();
                for field in 0..arity - 1 {
                    match self.child(idx, field)? {
                        Filled::Table(id) => tables.push(id),
                        _ => {
                            return Err(DecodeError::Corrupted {
                                detail: "non-table fill in a FromTable table slot",
                            });
                        }
                    }
                }
                let condition = self.build_condition(self.child(idx, arity - 1)?)?;
                Ok(FromClause::Tables { tables, condition })
            }
            RuleName::FromSql => Ok(FromClause::Subquery(Box::new(
                self.build_query(self.child(idx, 0)?)?,
            ))),
            _ => Err(DecodeError::Corrupted {
                detail: "non-from rule in a from slot",
            }),
        }
    }

    fn build_condition(&self, filled: Filled) -> Result<Condition, DecodeError> {
        let (idx, rule) = self.node_rule(filled)?;
        match rule {
            RuleName::AndCondition | RuleName::OrCondition => {
                let mut parts = Vec::new();
                for field in 0..self.arity(idx) {
                    parts.push(self.build_condition(self.child(idx, field)?)?);
                }
                Ok(if rule == RuleName::AndCondition {
                    Condition::And(parts)
                } else {
                    Condition::Or(parts)
                })
            }
            RuleName::CmpCondition => {
                let left = self.build_col_unit(self.child(idx, 0)?)?;
                let op = match self.child(idx, 1)? {
                    Filled::Cmp(op) => op,
                    _ => {
                        return Err(DecodeError::Corrupted {
                            detail: "non-operator fill in a cmp_op slot",
                        });
                    }
                };
                let value = self.build_value(self.child(idx, 2)?)?;
                Ok(Condition::Cmp { left, op, value })
            }
            RuleName::BetweenCondition => {
                let left = self.build_col_unit(self.child(idx, 0)?)?;
                let low = self.build_value(self.child(idx, 1)?)?;
                let high = self.build_value(self.child(idx, 2)?)?;
                Ok(Condition::Between { left, low, high })
            }
            RuleName::NoCondition => Ok(Condition::None),
            _ => Err(DecodeError::Corrupted {
                detail: "non-condition rule in a condition slot",
            }),
        }
    }

    fn build_groupby(&self, filled: Filled) -> Result<GroupByClause, DecodeError> {
        let (idx, rule) = self.node_rule(filled)?;
        match rule {
            RuleName::NoGroupBy => Ok(GroupByClause::None),
            RuleName::GroupByColumn => {
                let mut columns = Vec::new();
                for field in 0..self.arity(idx) {
                    columns.push(self.build_col_unit(self.child(idx, field)?)?);
                }
                Ok(GroupByClause::Columns(columns))
            }
            RuleName::GroupByHavingColumn => {
                let arity = self.arity(idx);
                let mut columns = Vec::new();
                for field in 0..arity - 1 {
                    columns.push(self.build_col_unit(self.child(idx, field)?)?);
                }
                let condition = self.build_condition(self.child(idx, arity - 1)?)?;
                Ok(GroupByClause::Having { columns, condition })
            }
            _ => Err(DecodeError::Corrupted {
                detail: "non-groupby rule in a groupby slot",
            }),
        }
    }

    fn build_orderby(&self, filled: Filled) -> Result<OrderByClause, DecodeError> {
        let (idx, rule) = self.node_rule(filled)?;
        match rule {
            RuleName::NoOrderBy => Ok(OrderByClause::None),
            RuleName::OrderByColumn | RuleName::OrderByLimitColumn => {
                let arity = self.arity(idx);
                let trailing = if rule == RuleName::OrderByColumn { 1 } else { 2 };
                let mut columns = Vec::new();
                for field in 0..arity - trailing {
                    columns.push(self.build_col_unit(self.child(idx, field)?)?);
                }
                let dir = match self.child(idx, arity - trailing)? {
                    Filled::Order(dir) => dir,
                    _ => {
                        return Err(DecodeError::Corrupted {
                            detail: "non-direction fill in an order slot",
                        });
                    }
                };
                if rule == RuleName::OrderByColumn {
                    Ok(OrderByClause::Columns { columns, dir })
                } else {
                    let limit = match self.child(idx, arity - 1)? {
                        Filled::Value(id) => id,
                        _ => {
                            return Err(DecodeError::Corrupted {
                                detail: "non-value fill in a limit slot",
                            });
                        }
                    };
                    Ok(OrderByClause::Limit {
                        columns,
                        dir,
                        limit,
                    })
                }
            }
            _ => Err(DecodeError::Corrupted {
                detail: "non-orderby rule in an orderby slot",
            }),
        }
    }

    fn build_col_unit(&self, filled: Filled) -> Result<ColumnUnit, DecodeError> {
        let (idx, rule) = self.node_rule(filled)?;
        match rule {
            RuleName::UnaryColumnUnit => {
                let agg = match self.child(idx, 0)? {
                    Filled::Agg(op) => op,
                    _ => {
                        return Err(DecodeError::Corrupted {
                            detail: "non-aggregate fill in an agg_op slot",
                        });
                    }
                };
                let distinct = self.take_distinct(idx, 1)?;
                let column = match self.child(idx, 2)? {
                    Filled::Column(id) => id,
                    _ => {
                        return Err(DecodeError::Corrupted {
                            detail: "non-column fill in a col_id slot",
                        });
                    }
                };
                Ok(ColumnUnit::Unary {
                    agg,
                    distinct,
                    column,
                })
            }
            RuleName::BinaryColumnUnit => {
                let agg = match self.child(idx, 0)? {
                    Filled::Agg(op) => op,
                    _ => {
                        return Err(DecodeError::Corrupted {
                            detail: "non-aggregate fill in an agg_op slot",
                        });
                    }
                };
                let op = match self.child(idx, 1)? {
                    Filled::Unit(op) => op,
                    _ => {
                        return Err(DecodeError::Corrupted {
                            detail: "non-operator fill in a unit_op slot",
                        });
                    }
                };
                let left = Box::new(self.build_col_unit(self.child(idx, 2)?)?);
                let right = Box::new(self.build_col_unit(self.child(idx, 3)?)?);
                Ok(ColumnUnit::Binary {
                    agg,
                    op,
                    left,
                    right,
                })
            }
            _ => Err(DecodeError::Corrupted {
                detail: "non-col_unit rule in a col_unit slot",
            }),
        }
    }

    fn build_value(&self, filled: Filled) -> Result<Value, DecodeError> {
        let (idx, rule) = self.node_rule(filled)?;
        match rule {
            RuleName::SqlValue => Ok(Value::Sql(Box::new(
                self.build_query(self.child(idx, 0)?)?,
            ))),
            RuleName::LiteralValue => match self.child(idx, 0)? {
                Filled::Value(id) => Ok(Value::Literal(id)),
                _ => Err(DecodeError::Corrupted {
                    detail: "non-value fill in a val_id slot",
                }),
            },
            RuleName::ColumnValue => match self.child(idx, 0)? {
                Filled::Column(id) => Ok(Value::Column(id)),
                _ => Err(DecodeError::Corrupted {
                    detail: "non-column fill in a col_id slot",
                }),
            },
            _ => Err(DecodeError::Corrupted {
                detail: "non-value rule in a value slot",
            }),
        }
    }

    fn take_distinct(&self, idx: usize, field: usize) -> Result<bool, DecodeError> {
        match self.child(idx, field)? {
            Filled::Distinct(b) => Ok(b),
            _ => Err(DecodeError::Corrupted {
                detail: "non-boolean fill in a distinct slot",
            }),
        }
    }
}

/// Outcome of replaying a full action sequence.
#[derive(Debug, Clone)]
pub enum DecodeOutcome {
    /// Every slot was filled; the finished tree
    Complete(SqlQuery),

    /// The sequence ended with open slots; the live state for inspection
    /// or resumption
    Incomplete(DerivationState),
}

/// Replays action sequences into trees against one vocabulary.
pub struct Decoder<'v> {
    vocab: &'v ActionVocabulary,
    order: TraversalOrder,
}

impl<'v> Decoder<'v> {
    pub fn new(vocab: &'v ActionVocabulary) -> Decoder<'v> {
        Decoder {
            vocab,
            order: TraversalOrder::default(),
        }
    }

    pub fn with_order(vocab: &'v ActionVocabulary, order: TraversalOrder) -> Decoder<'v> {
        Decoder { vocab, order }
    }

    pub fn order(&self) -> TraversalOrder {
        self.order
    }

    /// Fresh derivation state under this decoder's traversal order.
    pub fn start(&self) -> DerivationState {
        DerivationState::new(self.order)
    }

    /// Replay a full action sequence.
    pub fn decode(&self, actions: &[Action]) -> Result<DecodeOutcome, DecodeError> {
        let mut state = self.start();
        for action in actions {
            state.apply(*action, self.vocab)?;
        }
        if state.is_complete() {
            Ok(DecodeOutcome::Complete(state.finish()?))
        } else {
            Ok(DecodeOutcome::Incomplete(state))
        }
    }
}
