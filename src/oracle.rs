//! Legal-action oracle: the admissible action set at a derivation step.
//!
//! A pure function of the [`DerivationState`]: the current frontier slot's
//! declared type selects the candidate actions from the vocabulary's
//! precomputed per-non-terminal index; the only non-local constraint is the
//! suppression of set-operator rules inside set-operator arms. Terminal
//! slots report their leaf vocabulary kind — leaf tokens are never drawn
//! from the main rule vocabulary.

use std::fmt;

use crate::decoder::DerivationState;
use crate::grammar::{FieldType, NonTerminal, TerminalKind};
use crate::vocabulary::{ActionId, ActionVocabulary};

/// The admissible actions at one decoding step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegalActions {
    /// The slot expects a rule application; these ids are admissible
    Rules(Vec<ActionId>),

    /// The slot expects a leaf token of this kind (own vocabulary)
    Terminal(TerminalKind),
}

/// Fixed-size mask over the rule vocabulary for one decoding step, the form
/// an external decoder network consumes before sampling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMask {
    /// `rules[i]` is true iff action id `i` is admissible
    pub rules: Vec<bool>,

    /// Set when the step expects a leaf token instead of a rule; `rules` is
    /// then all false
    pub terminal: Option<TerminalKind>,
}

/// The oracle found no admissible action.
///
/// By construction every reachable, unfinished derivation state admits at
/// least one action; an empty set indicates a grammar/vocabulary
/// construction bug and is fatal, not retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoLegalActionError {
    /// The derivation has no open slots left to fill
    DerivationComplete,

    /// No vocabulary entry expands the slot's non-terminal
    EmptySet { nonterminal: NonTerminal },
}

impl fmt::Display for NoLegalActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoLegalActionError::DerivationComplete => {
                write!(f, "derivation already complete; no slot to fill")
            }
            NoLegalActionError::EmptySet { nonterminal } => write!(
                f,
                "no legal action for non-terminal '{}': grammar/vocabulary construction bug",
                nonterminal
            ),
        }
    }
}

impl std::error::Error for NoLegalActionError {}

/// Computes legal-action sets and masks against one vocabulary.
pub struct LegalActionOracle<'v> {
    vocab: &'v ActionVocabulary,
}

impl<'v> LegalActionOracle<'v> {
    pub fn new(vocab: &'v ActionVocabulary) -> LegalActionOracle<'v> {
        LegalActionOracle { vocab }
    }

    /// The exact admissible action set at the state's current slot.
    pub fn legal_actions(
        &self,
        state: &DerivationState,
    ) -> Result<LegalActions, NoLegalActionError> {
        let slot = state
            .current_slot()
            .ok_or(NoLegalActionError::DerivationComplete)?;
        match slot.field {
            FieldType::Terminal(kind) => Ok(LegalActions::Terminal(kind)),
            FieldType::NonTerminal(nt) => {
                let candidates = self.vocab.actions_for(nt);
                let ids: Vec<ActionId> = if slot.compound_allowed {
                    candidates.to_vec()
                } else {
                    candidates
                        .iter()
                        .copied()
                        .filter(|id| !self.vocab.compound_ids().contains(id))
                        .collect()
                };
                if ids.is_empty() {
                    return Err(NoLegalActionError::EmptySet { nonterminal: nt });
                }
                Ok(LegalActions::Rules(ids))
            }
        }
    }

    /// The legal-action set as a fixed-size boolean mask over the rule
    /// vocabulary.
    pub fn action_mask(&self, state: &DerivationState) -> Result<ActionMask, NoLegalActionError> {
        let mut mask = ActionMask {
            rules: vec![false; self.vocab.size()],
            terminal: None,
        };
        match self.legal_actions(state)? {
            LegalActions::Rules(ids) => {
                for id in ids {
                    mask.rules[id.0] = true;
                }
            }
            LegalActions::Terminal(kind) => mask.terminal = Some(kind),
        }
        Ok(mask)
    }
}
