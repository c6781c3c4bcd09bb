//! Round-trip dataset SQL objects through the action vocabulary.

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use super::CliError;
use crate::decoder::{DecodeOutcome, Decoder};
use crate::encoder::{Encoder, TraversalOrder};
use crate::ingest::{self, IngestError};
use crate::oracle::{LegalActionOracle, LegalActions};
use crate::vocabulary::{Action, ActionVocabulary};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// JSON input string: a single SQL object, a dataset entry with a
    /// top-level `sql` key, or a list of either
    pub input: Option<String>,
    /// Traversal order for encoding
    pub order: TraversalOrder,
}

/// Tally of a check run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub total: usize,
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum EntryOutcome {
    Skipped(String),
    Failed(String),
}

/// Verify every entry of the input survives encode → decode unchanged,
/// with each emitted action admissible under the oracle at its step.
pub fn execute_check(options: &CheckOptions) -> Result<CheckSummary, CliError> {
    let text = options.input.as_ref().ok_or(CliError::NoInput)?;
    let json: JsonValue = serde_json::from_str(text).map_err(CliError::Json)?;

    let entries: Vec<&JsonValue> = match &json {
        JsonValue::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let vocab = ActionVocabulary::sql();
    let encoder = Encoder::with_order(&vocab, options.order);
    let decoder = Decoder::with_order(&vocab, options.order);

    let mut summary = CheckSummary::default();
    for (index, entry) in entries.into_iter().enumerate() {
        summary.total += 1;
        // Dataset entries nest the SQL object under a "sql" key.
        let sql = entry.get("sql").unwrap_or(entry);
        match check_entry(sql, &vocab, &encoder, &decoder) {
            Ok(steps) => {
                debug!(index, steps, "round trip ok");
                summary.ok += 1;
            }
            Err(EntryOutcome::Skipped(reason)) => {
                warn!(index, %reason, "skipped unsupported query");
                summary.skipped += 1;
            }
            Err(EntryOutcome::Failed(reason)) => {
                warn!(index, %reason, "round trip failed");
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

fn check_entry(
    sql: &JsonValue,
    vocab: &ActionVocabulary,
    encoder: &Encoder<'_>,
    decoder: &Decoder<'_>,
) -> Result<usize, EntryOutcome> {
    let (tree, _values) = match ingest::sql_from_json(sql) {
        Ok(parts) => parts,
        Err(IngestError::Unsupported(e)) => return Err(EntryOutcome::Skipped(e.to_string())),
        Err(e) => return Err(EntryOutcome::Failed(e.to_string())),
    };

    let actions = match encoder.encode(&tree) {
        Ok(actions) => actions,
        Err(e) => return Err(EntryOutcome::Skipped(e.to_string())),
    };

    // Replay the sequence and confirm the oracle admits every step.
    let oracle = LegalActionOracle::new(vocab);
    let mut state = decoder.start();
    for action in &actions {
        let legal = oracle
            .legal_actions(&state)
            .map_err(|e| EntryOutcome::Failed(e.to_string()))?;
        if !admits(&legal, action) {
            return Err(EntryOutcome::Failed(format!(
                "oracle rejects emitted action at step {}",
                state.steps()
            )));
        }
        state
            .apply(*action, vocab)
            .map_err(|e| EntryOutcome::Failed(e.to_string()))?;
    }

    let rebuilt = match decoder.decode(&actions) {
        Ok(DecodeOutcome::Complete(query)) => query,
        Ok(DecodeOutcome::Incomplete(state)) => {
            return Err(EntryOutcome::Failed(format!(
                "derivation incomplete with {} open slots",
                state.remaining()
            )));
        }
        Err(e) => return Err(EntryOutcome::Failed(e.to_string())),
    };

    if rebuilt != tree {
        return Err(EntryOutcome::Failed(
            "decoded tree differs from the original".to_string(),
        ));
    }
    Ok(actions.len())
}

fn admits(legal: &LegalActions, action: &Action) -> bool {
    match (legal, action) {
        (LegalActions::Rules(ids), Action::Apply(id)) => ids.contains(id),
        (LegalActions::Rules(_), _) => false,
        (LegalActions::Terminal(kind), action) => {
            use crate::grammar::TerminalKind;
            matches!(
                (kind, action),
                (TerminalKind::TableId, Action::Table(_))
                    | (TerminalKind::ColumnId, Action::Column(_))
                    | (TerminalKind::ValueId, Action::Value(_))
                    | (TerminalKind::AggOp, Action::Agg(_))
                    | (TerminalKind::UnitOp, Action::Unit(_))
                    | (TerminalKind::CmpOp, Action::Cmp(_))
                    | (TerminalKind::OrderDir, Action::Order(_))
                    | (TerminalKind::Distinct, Action::Distinct(_))
            )
        }
    }
}
