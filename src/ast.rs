//! # SQL object trees
//!
//! This module defines the typed tree representation of SQL queries that the
//! grammar engine encodes into action sequences and reconstructs from them.
//! The shape mirrors the Spider-style SQL object format: a root query that is
//! either a plain `SELECT` block or a set-operator composition of two plain
//! blocks, with `select`/`from`/`where`/`groupby`/`orderby` subtrees.
//!
//! Every alternative in the grammar maps onto a sum-type variant here, so the
//! encoder and decoder match exhaustively and a new production cannot be
//! added without every consumer handling it.
//!
//! Submodules:
//!
//! - **[operators]** - terminal operator catalogues (aggregate, arithmetic,
//!   comparison, ordering)
//! - **[units]** - schema id newtypes and column units
//! - **[clauses]** - the five clause subtrees and condition/value expressions
//! - **[query]** - the root query composition

pub mod clauses;
pub mod operators;
pub mod query;
pub mod units;

pub use clauses::{Condition, FromClause, GroupByClause, OrderByClause, SelectClause, Value};
pub use operators::{AggOp, CmpOp, OrderDir, UnitOp};
pub use query::{QueryCore, SqlQuery};
pub use units::{ColumnId, ColumnUnit, TableId, ValueId};
