pub mod ast;
pub mod decoder;
pub mod encoder;
pub mod grammar;
pub mod ingest;
pub mod oracle;
pub mod vocabulary;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{Condition, FromClause, GroupByClause, OrderByClause, QueryCore, SqlQuery};
pub use decoder::{DecodeError, DecodeOutcome, Decoder, DerivationState, GrammarViolationError};
pub use encoder::{Encoder, TraversalOrder, UnsupportedStructureError};
pub use grammar::{Grammar, GrammarLoadError, NonTerminal, RuleInstance, RuleName, TerminalKind};
pub use ingest::{sql_from_json, sql_to_json, IngestError, ValueTable};
pub use oracle::{ActionMask, LegalActionOracle, LegalActions, NoLegalActionError};
pub use vocabulary::{Action, ActionId, ActionVocabulary, UnknownActionError};
