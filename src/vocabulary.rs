//! Action vocabulary: the bijection between concrete rule instances and
//! dense integer action ids.
//!
//! Built once from a loaded [`Grammar`] in declaration order (enumerable
//! counts ascending), so ids are reproducible across runs given the same
//! grammar text. Immutable after construction; lookups are O(1) through
//! precomputed indexes.

use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::ast::{AggOp, CmpOp, ColumnId, OrderDir, TableId, UnitOp, ValueId};
use crate::grammar::{Grammar, NonTerminal, RuleInstance, RuleName};

/// Dense identifier of one rule instance in `[0, size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub usize);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// One step of an encoded derivation.
///
/// Rule applications draw from the main action vocabulary; every other
/// variant is a leaf-terminal token keyed by its own small vocabulary
/// (operator enums, boolean, schema/value ids).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Apply a production rule to the current non-terminal slot
    Apply(ActionId),
    /// Table id terminal
    Table(TableId),
    /// Column id terminal
    Column(ColumnId),
    /// Value id terminal
    Value(ValueId),
    /// Aggregate operator terminal
    Agg(AggOp),
    /// Arithmetic unit operator terminal
    Unit(UnitOp),
    /// Comparison operator terminal
    Cmp(CmpOp),
    /// Sort direction terminal
    Order(OrderDir),
    /// DISTINCT flag terminal
    Distinct(bool),
}

/// Lookup of an action id or rule instance outside the catalogue. Always a
/// programmer or configuration error, never a data error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownActionError {
    /// Action id outside `[0, size)`
    IdOutOfRange { id: usize, size: usize },

    /// `(constructor, count)` pair not in the catalogue, e.g. an 8-ary
    /// `SelectColumn` when the declared maximum is 7
    UnknownRule { name: RuleName, count: usize },
}

impl fmt::Display for UnknownActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownActionError::IdOutOfRange { id, size } => {
                write!(f, "action id {} out of range (vocabulary size {})", id, size)
            }
            UnknownActionError::UnknownRule { name, count } => {
                write!(f, "rule instance {}({}) is not in the vocabulary", name, count)
            }
        }
    }
}

impl std::error::Error for UnknownActionError {}

/// The immutable action vocabulary.
#[derive(Debug, Clone)]
pub struct ActionVocabulary {
    grammar: Grammar,
    ids: HashMap<(RuleName, usize), ActionId>,
    by_nonterminal: HashMap<NonTerminal, Vec<ActionId>>,
    compound: Vec<ActionId>,
}

impl ActionVocabulary {
    /// Build the vocabulary from a loaded grammar.
    pub fn build(grammar: Grammar) -> ActionVocabulary {
        let mut ids = HashMap::new();
        let mut by_nonterminal: HashMap<NonTerminal, Vec<ActionId>> = HashMap::new();
        let mut compound = Vec::new();

        for (idx, inst) in grammar.instances().iter().enumerate() {
            let id = ActionId(idx);
            ids.insert(inst.key(), id);
            by_nonterminal.entry(inst.lhs).or_default().push(id);
            if inst.name.is_compound() {
                compound.push(id);
            }
        }

        debug!(size = grammar.instances().len(), "action vocabulary built");
        ActionVocabulary {
            grammar,
            ids,
            by_nonterminal,
            compound,
        }
    }

    /// Vocabulary built from the built-in SQL grammar.
    pub fn sql() -> ActionVocabulary {
        ActionVocabulary::build(Grammar::sql())
    }

    /// Number of actions in the vocabulary.
    pub fn size(&self) -> usize {
        self.grammar.instances().len()
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Reverse lookup: action id → rule instance.
    pub fn rule_of(&self, id: ActionId) -> Result<&RuleInstance, UnknownActionError> {
        self.grammar
            .instances()
            .get(id.0)
            .ok_or(UnknownActionError::IdOutOfRange {
                id: id.0,
                size: self.size(),
            })
    }

    /// Forward lookup: `(constructor, count)` → action id. `count` is the
    /// resolved repetition count, 0 for non-enumerable rules.
    pub fn id_of(&self, name: RuleName, count: usize) -> Result<ActionId, UnknownActionError> {
        self.ids
            .get(&(name, count))
            .copied()
            .ok_or(UnknownActionError::UnknownRule { name, count })
    }

    /// All action ids whose rule expands the given non-terminal, in
    /// vocabulary order. Precomputed at build time.
    pub fn actions_for(&self, nt: NonTerminal) -> &[ActionId] {
        self.by_nonterminal.get(&nt).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Action ids of the set-operator rules (Intersect/Union/Except).
    pub fn compound_ids(&self) -> &[ActionId] {
        &self.compound
    }
}
