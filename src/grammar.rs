//! Grammar definition and loading.
//!
//! The abstract grammar is written as declarative text: one non-terminal per
//! production group, alternatives separated by `|`, constructor fields in
//! declaration order, and enumerable fields annotated `field[min,max]`. At
//! load time every enumerable range is resolved into one concrete
//! [`RuleInstance`] per count, so the downstream action vocabulary is a
//! closed, dense set.
//!
//! The catalogue is built once at startup and immutable afterwards; all
//! lookups borrow shared state and are safe for concurrent readers.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// The built-in grammar over SQL query structure.
///
/// Lowercase symbols are non-terminals or terminal leaf kinds; capitalized
/// names are constructors.
pub const SQL_GRAMMAR: &str = r#"
# SQL query structure. One set operator per composition; set-operator arms
# must be plain SQL blocks. LIMIT is only expressible with ORDER BY.

sql       := Intersect(sql, sql)
           | Union(sql, sql)
           | Except(sql, sql)
           | SQL(select, from, condition, groupby, orderby)

select    := SelectColumn(distinct, col_unit[1,7])

from      := FromTable(tab_id[1,6], condition)
           | FromSQL(sql)

condition := AndCondition(condition[2,4])
           | OrCondition(condition[2,4])
           | CmpCondition(col_unit, cmp_op, value)
           | BetweenCondition(col_unit, value, value)
           | NoCondition

groupby   := NoGroupBy
           | GroupByColumn(col_unit[1,3])
           | GroupByHavingColumn(col_unit[1,3], condition)

orderby   := NoOrderBy
           | OrderByColumn(col_unit[1,3], order)
           | OrderByLimitColumn(col_unit[1,3], order, val_id)

col_unit  := UnaryColumnUnit(agg_op, distinct, col_id)
           | BinaryColumnUnit(agg_op, unit_op, col_unit, col_unit)

value     := SQLValue(sql)
           | LiteralValue(val_id)
           | ColumnValue(col_id)
"#;

/// Non-terminal symbols of the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonTerminal {
    Sql,
    Select,
    From,
    Condition,
    GroupBy,
    OrderBy,
    ColUnit,
    Value,
}

impl NonTerminal {
    pub const ALL: [NonTerminal; 8] = [
        NonTerminal::Sql,
        NonTerminal::Select,
        NonTerminal::From,
        NonTerminal::Condition,
        NonTerminal::GroupBy,
        NonTerminal::OrderBy,
        NonTerminal::ColUnit,
        NonTerminal::Value,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NonTerminal::Sql => "sql",
            NonTerminal::Select => "select",
            NonTerminal::From => "from",
            NonTerminal::Condition => "condition",
            NonTerminal::GroupBy => "groupby",
            NonTerminal::OrderBy => "orderby",
            NonTerminal::ColUnit => "col_unit",
            NonTerminal::Value => "value",
        }
    }

    pub fn parse(name: &str) -> Option<NonTerminal> {
        Self::ALL.iter().copied().find(|nt| nt.as_str() == name)
    }
}

impl fmt::Display for NonTerminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal leaf kinds.
///
/// Terminals are filled by leaf tokens with their own small vocabularies,
/// never by rules from the main action vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    TableId,
    ColumnId,
    ValueId,
    AggOp,
    UnitOp,
    CmpOp,
    OrderDir,
    Distinct,
}

impl TerminalKind {
    pub const ALL: [TerminalKind; 8] = [
        TerminalKind::TableId,
        TerminalKind::ColumnId,
        TerminalKind::ValueId,
        TerminalKind::AggOp,
        TerminalKind::UnitOp,
        TerminalKind::CmpOp,
        TerminalKind::OrderDir,
        TerminalKind::Distinct,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TerminalKind::TableId => "tab_id",
            TerminalKind::ColumnId => "col_id",
            TerminalKind::ValueId => "val_id",
            TerminalKind::AggOp => "agg_op",
            TerminalKind::UnitOp => "unit_op",
            TerminalKind::CmpOp => "cmp_op",
            TerminalKind::OrderDir => "order",
            TerminalKind::Distinct => "distinct",
        }
    }

    pub fn parse(name: &str) -> Option<TerminalKind> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of one constructor field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    NonTerminal(NonTerminal),
    Terminal(TerminalKind),
}

impl FieldType {
    pub fn parse(name: &str) -> Option<FieldType> {
        NonTerminal::parse(name)
            .map(FieldType::NonTerminal)
            .or_else(|| TerminalKind::parse(name).map(FieldType::Terminal))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::NonTerminal(nt) => nt.fmt(f),
            FieldType::Terminal(t) => t.fmt(f),
        }
    }
}

/// Split a constructor body on top-level commas; commas inside an
/// enumerable `[min,max]` annotation do not separate fields.
fn split_fields(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = body[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

/// Constructor names of the grammar.
///
/// The engine's encoder and decoder attach semantics to these names, so the
/// set is closed; a grammar text using an unknown constructor fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleName {
    Intersect,
    Union,
    Except,
    Sql,
    SelectColumn,
    FromTable,
    FromSql,
    AndCondition,
    OrCondition,
    CmpCondition,
    BetweenCondition,
    NoCondition,
    NoGroupBy,
    GroupByColumn,
    GroupByHavingColumn,
    NoOrderBy,
    OrderByColumn,
    OrderByLimitColumn,
    UnaryColumnUnit,
    BinaryColumnUnit,
    SqlValue,
    LiteralValue,
    ColumnValue,
}

impl RuleName {
    pub const ALL: [RuleName; 23] = [
        RuleName::Intersect,
        RuleName::Union,
        RuleName::Except,
        RuleName::Sql,
        RuleName::SelectColumn,
        RuleName::FromTable,
        RuleName::FromSql,
        RuleName::AndCondition,
        RuleName::OrCondition,
        RuleName::CmpCondition,
        RuleName::BetweenCondition,
        RuleName::NoCondition,
        RuleName::NoGroupBy,
        RuleName::GroupByColumn,
        RuleName::GroupByHavingColumn,
        RuleName::NoOrderBy,
        RuleName::OrderByColumn,
        RuleName::OrderByLimitColumn,
        RuleName::UnaryColumnUnit,
        RuleName::BinaryColumnUnit,
        RuleName::SqlValue,
        RuleName::LiteralValue,
        RuleName::ColumnValue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleName::Intersect => "Intersect",
            RuleName::Union => "Union",
            RuleName::Except => "Except",
            RuleName::Sql => "SQL",
            RuleName::SelectColumn => "SelectColumn",
            RuleName::FromTable => "FromTable",
            RuleName::FromSql => "FromSQL",
            RuleName::AndCondition => "AndCondition",
            RuleName::OrCondition => "OrCondition",
            RuleName::CmpCondition => "CmpCondition",
            RuleName::BetweenCondition => "BetweenCondition",
            RuleName::NoCondition => "NoCondition",
            RuleName::NoGroupBy => "NoGroupBy",
            RuleName::GroupByColumn => "GroupByColumn",
            RuleName::GroupByHavingColumn => "GroupByHavingColumn",
            RuleName::NoOrderBy => "NoOrderBy",
            RuleName::OrderByColumn => "OrderByColumn",
            RuleName::OrderByLimitColumn => "OrderByLimitColumn",
            RuleName::UnaryColumnUnit => "UnaryColumnUnit",
            RuleName::BinaryColumnUnit => "BinaryColumnUnit",
            RuleName::SqlValue => "SQLValue",
            RuleName::LiteralValue => "LiteralValue",
            RuleName::ColumnValue => "ColumnValue",
        }
    }

    pub fn parse(name: &str) -> Option<RuleName> {
        Self::ALL.iter().copied().find(|r| r.as_str() == name)
    }

    /// Whether this rule is a set-operator composition.
    pub fn is_compound(self) -> bool {
        matches!(self, RuleName::Intersect | RuleName::Union | RuleName::Except)
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared field of a production, possibly enumerable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub ty: FieldType,
    /// `Some((min, max))` for an enumerable field
    pub repeat: Option<(usize, usize)>,
}

/// A production template as written in the grammar text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub lhs: NonTerminal,
    pub name: RuleName,
    pub fields: Vec<FieldSpec>,
}

impl Production {
    /// Declared enumerable range, if any field is enumerable.
    pub fn repeat_range(&self) -> Option<(usize, usize)> {
        self.fields.iter().find_map(|f| f.repeat)
    }
}

/// A concrete rule: a production with its enumerable field resolved to a
/// fixed count. The unit of the action vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInstance {
    pub lhs: NonTerminal,
    pub name: RuleName,
    /// Resolved repetition count; 0 for non-enumerable rules
    pub count: usize,
    /// Field types with the enumerable field expanded in place
    pub fields: Vec<FieldType>,
    enumerable: bool,
}

impl RuleInstance {
    /// Key identifying this instance in the vocabulary.
    pub fn key(&self) -> (RuleName, usize) {
        (self.name, self.count)
    }
}

impl fmt::Display for RuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enumerable {
            write!(f, "{}({})", self.name, self.count)
        } else {
            f.write_str(self.name.as_str())
        }
    }
}

/// Errors raised while loading a grammar text. All of them are fatal to
/// startup; there is no partial grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarLoadError {
    /// A line that is neither a production, a continuation, nor a comment
    Malformed { line_no: usize, line: String },

    /// A production head that is not a known non-terminal
    UnknownNonTerminal { line_no: usize, name: String },

    /// A constructor name outside the engine's closed set
    UnknownConstructor { line_no: usize, name: String },

    /// A field symbol that is neither a defined non-terminal nor a terminal
    /// kind
    UndefinedSymbol { rule: String, symbol: String },

    /// An enumerable range with min > max or a negative bound
    InvalidRange { rule: String, min: i64, max: i64 },

    /// More than one enumerable field in a single production
    MultipleEnumerableFields { rule: String },

    /// The same constructor declared twice
    DuplicateRule { name: String },

    /// A referenced non-terminal with no productions of its own
    MissingProductions { name: String },
}

impl fmt::Display for GrammarLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarLoadError::Malformed { line_no, line } => {
                write!(f, "malformed grammar line {}: '{}'", line_no, line)
            }
            GrammarLoadError::UnknownNonTerminal { line_no, name } => {
                write!(f, "unknown non-terminal '{}' at line {}", name, line_no)
            }
            GrammarLoadError::UnknownConstructor { line_no, name } => {
                write!(f, "unknown constructor '{}' at line {}", name, line_no)
            }
            GrammarLoadError::UndefinedSymbol { rule, symbol } => {
                write!(f, "rule {} references undefined symbol '{}'", rule, symbol)
            }
            GrammarLoadError::InvalidRange { rule, min, max } => {
                write!(f, "rule {} has invalid enumerable range [{},{}]", rule, min, max)
            }
            GrammarLoadError::MultipleEnumerableFields { rule } => {
                write!(f, "rule {} declares more than one enumerable field", rule)
            }
            GrammarLoadError::DuplicateRule { name } => {
                write!(f, "constructor '{}' declared twice", name)
            }
            GrammarLoadError::MissingProductions { name } => {
                write!(f, "non-terminal '{}' is referenced but has no productions", name)
            }
        }
    }
}

impl std::error::Error for GrammarLoadError {}

/// The loaded grammar: production templates plus the resolved, ordered rule
/// instance catalogue.
#[derive(Debug, Clone)]
pub struct Grammar {
    productions: Vec<Production>,
    instances: Vec<RuleInstance>,
    by_name: HashMap<RuleName, usize>,
}

impl Grammar {
    /// Parse a grammar text into a resolved catalogue.
    pub fn load(text: &str) -> Result<Grammar, GrammarLoadError> {
        let head_re = Regex::new(r"^([a-z_][a-z0-9_]*)\s*:=\s*(.*)$").unwrap();
        let alt_re = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*(?:\((.*)\))?$").unwrap();
        let field_re =
            Regex::new(r"^([a-z_][a-z0-9_]*)\s*(?:\[\s*(-?\d+)\s*,\s*(-?\d+)\s*\])?$").unwrap();

        // Gather (lhs, alternative text, line_no) triples, handling `|`
        // continuation lines.
        let mut alts: Vec<(NonTerminal, String, usize)> = Vec::new();
        let mut current: Option<NonTerminal> = None;
        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = match raw.find('#') {
                Some(pos) => raw[..pos].trim(),
                None => raw.trim(),
            };
            if line.is_empty() {
                continue;
            }
            if let Some(caps) = head_re.captures(line) {
                let name = &caps[1];
                let lhs = NonTerminal::parse(name).ok_or_else(|| {
                    GrammarLoadError::UnknownNonTerminal {
                        line_no,
                        name: name.to_string(),
                    }
                })?;
                current = Some(lhs);
                for alt in caps[2].split('|') {
                    let alt = alt.trim();
                    if !alt.is_empty() {
                        alts.push((lhs, alt.to_string(), line_no));
                    }
                }
            } else if let Some(rest) = line.strip_prefix('|') {
                let lhs = current.ok_or_else(|| GrammarLoadError::Malformed {
                    line_no,
                    line: line.to_string(),
                })?;
                for alt in rest.split('|') {
                    let alt = alt.trim();
                    if !alt.is_empty() {
                        alts.push((lhs, alt.to_string(), line_no));
                    }
                }
            } else {
                return Err(GrammarLoadError::Malformed {
                    line_no,
                    line: line.to_string(),
                });
            }
        }

        let defined: Vec<NonTerminal> = {
            let mut seen = Vec::new();
            for (lhs, _, _) in &alts {
                if !seen.contains(lhs) {
                    seen.push(*lhs);
                }
            }
            seen
        };

        // Parse alternatives into production templates.
        let mut productions: Vec<Production> = Vec::new();
        for (lhs, alt, line_no) in &alts {
            let caps = alt_re
                .captures(alt)
                .ok_or_else(|| GrammarLoadError::Malformed {
                    line_no: *line_no,
                    line: alt.clone(),
                })?;
            let name = RuleName::parse(&caps[1]).ok_or_else(|| {
                GrammarLoadError::UnknownConstructor {
                    line_no: *line_no,
                    name: caps[1].to_string(),
                }
            })?;
            if productions.iter().any(|p| p.name == name) {
                return Err(GrammarLoadError::DuplicateRule {
                    name: name.as_str().to_string(),
                });
            }

            let mut fields = Vec::new();
            if let Some(body) = caps.get(2) {
                for part in split_fields(body.as_str()) {
                    let fcaps =
                        field_re
                            .captures(part)
                            .ok_or_else(|| GrammarLoadError::Malformed {
                                line_no: *line_no,
                                line: alt.clone(),
                            })?;
                    let symbol = &fcaps[1];
                    let ty = FieldType::parse(symbol).ok_or_else(|| {
                        GrammarLoadError::UndefinedSymbol {
                            rule: name.as_str().to_string(),
                            symbol: symbol.to_string(),
                        }
                    })?;
                    if let FieldType::NonTerminal(nt) = ty {
                        if !defined.contains(&nt) {
                            return Err(GrammarLoadError::MissingProductions {
                                name: nt.as_str().to_string(),
                            });
                        }
                    }
                    let repeat = match (fcaps.get(2), fcaps.get(3)) {
                        (Some(min), Some(max)) => {
                            // Parsed from the regex digit groups, so always
                            // numeric; range sanity still has to hold.
                            let min: i64 = min.as_str().parse().unwrap_or(-1);
                            let max: i64 = max.as_str().parse().unwrap_or(-1);
                            if min < 0 || max < 0 || min > max {
                                return Err(GrammarLoadError::InvalidRange {
                                    rule: name.as_str().to_string(),
                                    min,
                                    max,
                                });
                            }
                            Some((min as usize, max as usize))
                        }
                        _ => None,
                    };
                    fields.push(FieldSpec { ty, repeat });
                }
            }
            if fields.iter().filter(|f| f.repeat.is_some()).count() > 1 {
                return Err(GrammarLoadError::MultipleEnumerableFields {
                    rule: name.as_str().to_string(),
                });
            }
            productions.push(Production {
                lhs: *lhs,
                name,
                fields,
            });
        }

        // Resolve enumerable productions into concrete instances, counts
        // ascending, in declaration order.
        let mut instances = Vec::new();
        let mut by_name = HashMap::new();
        for (pidx, prod) in productions.iter().enumerate() {
            by_name.insert(prod.name, pidx);
            match prod.repeat_range() {
                Some((min, max)) => {
                    for count in min..=max {
                        let mut fields = Vec::new();
                        for f in &prod.fields {
                            if f.repeat.is_some() {
                                fields.extend(std::iter::repeat_n(f.ty, count));
                            } else {
                                fields.push(f.ty);
                            }
                        }
                        instances.push(RuleInstance {
                            lhs: prod.lhs,
                            name: prod.name,
                            count,
                            fields,
                            enumerable: true,
                        });
                    }
                }
                None => instances.push(RuleInstance {
                    lhs: prod.lhs,
                    name: prod.name,
                    count: 0,
                    fields: prod.fields.iter().map(|f| f.ty).collect(),
                    enumerable: false,
                }),
            }
        }

        debug!(
            productions = productions.len(),
            instances = instances.len(),
            "grammar loaded"
        );
        Ok(Grammar {
            productions,
            instances,
            by_name,
        })
    }

    /// The built-in SQL grammar.
    ///
    /// The text is a compile-time constant validated by this crate's tests,
    /// so a load failure here is a construction bug and aborts per the
    /// error-handling contract.
    pub fn sql() -> Grammar {
        match Grammar::load(SQL_GRAMMAR) {
            Ok(g) => g,
            Err(e) => panic!("built-in SQL grammar failed to load: {e}"),
        }
    }

    /// Production templates in declaration order.
    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    /// Resolved rule instances in stable vocabulary order.
    pub fn instances(&self) -> &[RuleInstance] {
        &self.instances
    }

    /// Candidate rule instances for a non-terminal, in vocabulary order.
    pub fn instances_of(&self, nt: NonTerminal) -> impl Iterator<Item = &RuleInstance> {
        self.instances.iter().filter(move |inst| inst.lhs == nt)
    }

    /// Declared enumerable range of a constructor, if it has one.
    pub fn repeat_range(&self, name: RuleName) -> Option<(usize, usize)> {
        self.by_name
            .get(&name)
            .and_then(|&idx| self.productions[idx].repeat_range())
    }

    /// The production template for a constructor.
    pub fn production(&self, name: RuleName) -> Option<&Production> {
        self.by_name.get(&name).map(|&idx| &self.productions[idx])
    }
}

#[test]
fn test_builtin_grammar_loads() {
    let grammar = Grammar::sql();
    assert_eq!(grammar.productions().len(), 23);
    // 4 sql + 7 select + (6 + 1) from + (3 + 3 + 1 + 1 + 1) condition
    // + (1 + 3 + 3) groupby + (1 + 3 + 3) orderby + 2 col_unit + 3 value
    assert_eq!(grammar.instances().len(), 46);
    assert_eq!(grammar.repeat_range(RuleName::SelectColumn), Some((1, 7)));
    assert_eq!(grammar.repeat_range(RuleName::NoCondition), None);
}

#[test]
fn test_enumerable_expansion_order() {
    let grammar = Grammar::sql();
    let counts: Vec<usize> = grammar
        .instances_of(NonTerminal::Select)
        .map(|inst| inst.count)
        .collect();
    assert_eq!(counts, vec![1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_unknown_constructor_rejected() {
    let err = Grammar::load("sql := Frobnicate(select)").unwrap_err();
    assert!(matches!(err, GrammarLoadError::UnknownConstructor { .. }));
}

#[test]
fn test_undefined_symbol_rejected() {
    // `select` is referenced but never defined.
    let err = Grammar::load("sql := SQL(select, from, condition, groupby, orderby)").unwrap_err();
    assert!(matches!(err, GrammarLoadError::MissingProductions { .. }));
}

#[test]
fn test_inverted_range_rejected() {
    let err = Grammar::load("select := SelectColumn(distinct, col_unit[7,1])").unwrap_err();
    assert_eq!(
        err,
        GrammarLoadError::InvalidRange {
            rule: "SelectColumn".to_string(),
            min: 7,
            max: 1,
        }
    );
}

#[test]
fn test_negative_range_rejected() {
    let err = Grammar::load("select := SelectColumn(distinct, col_unit[-1,3])").unwrap_err();
    assert!(matches!(err, GrammarLoadError::InvalidRange { .. }));
}

#[test]
fn test_malformed_line_rejected() {
    let err = Grammar::load("this is not a production").unwrap_err();
    assert!(matches!(err, GrammarLoadError::Malformed { line_no: 1, .. }));
}
