use astsql::grammar::{Grammar, NonTerminal, RuleName};
use astsql::vocabulary::{ActionId, ActionVocabulary, UnknownActionError};

#[test]
fn builtin_vocabulary_size() {
    let vocab = ActionVocabulary::sql();
    assert_eq!(vocab.size(), 46);
}

#[test]
fn ids_are_dense_and_bijective() {
    let vocab = ActionVocabulary::sql();
    for idx in 0..vocab.size() {
        let inst = vocab.rule_of(ActionId(idx)).unwrap();
        let id = vocab.id_of(inst.name, inst.count).unwrap();
        assert_eq!(id, ActionId(idx));
    }
}

#[test]
fn ids_are_deterministic_across_builds() {
    let a = ActionVocabulary::build(Grammar::sql());
    let b = ActionVocabulary::build(Grammar::sql());
    assert_eq!(a.size(), b.size());
    for idx in 0..a.size() {
        let inst = a.rule_of(ActionId(idx)).unwrap();
        assert_eq!(b.id_of(inst.name, inst.count).unwrap(), ActionId(idx));
    }
}

#[test]
fn enumerable_counts_are_separate_actions() {
    let vocab = ActionVocabulary::sql();
    let mut select_ids = Vec::new();
    for count in 1..=7 {
        select_ids.push(vocab.id_of(RuleName::SelectColumn, count).unwrap());
    }
    select_ids.sort();
    select_ids.dedup();
    assert_eq!(select_ids.len(), 7);
}

#[test]
fn count_outside_declared_range_is_unknown() {
    let vocab = ActionVocabulary::sql();
    assert_eq!(
        vocab.id_of(RuleName::SelectColumn, 8),
        Err(UnknownActionError::UnknownRule {
            name: RuleName::SelectColumn,
            count: 8,
        })
    );
    assert_eq!(
        vocab.id_of(RuleName::SelectColumn, 0),
        Err(UnknownActionError::UnknownRule {
            name: RuleName::SelectColumn,
            count: 0,
        })
    );
    assert_eq!(
        vocab.id_of(RuleName::AndCondition, 5),
        Err(UnknownActionError::UnknownRule {
            name: RuleName::AndCondition,
            count: 5,
        })
    );
}

#[test]
fn id_out_of_range_is_reported() {
    let vocab = ActionVocabulary::sql();
    assert_eq!(
        vocab.rule_of(ActionId(999)),
        Err(UnknownActionError::IdOutOfRange { id: 999, size: 46 })
    );
}

#[test]
fn actions_for_groups_by_left_hand_side() {
    let vocab = ActionVocabulary::sql();
    // 4 sql rules, 7 select arities, 6 from arities + subquery form.
    assert_eq!(vocab.actions_for(NonTerminal::Sql).len(), 4);
    assert_eq!(vocab.actions_for(NonTerminal::Select).len(), 7);
    assert_eq!(vocab.actions_for(NonTerminal::From).len(), 7);
    assert_eq!(vocab.actions_for(NonTerminal::Condition).len(), 9);
    assert_eq!(vocab.actions_for(NonTerminal::GroupBy).len(), 7);
    assert_eq!(vocab.actions_for(NonTerminal::OrderBy).len(), 7);
    assert_eq!(vocab.actions_for(NonTerminal::ColUnit).len(), 2);
    assert_eq!(vocab.actions_for(NonTerminal::Value).len(), 3);

    for nt in NonTerminal::ALL {
        for id in vocab.actions_for(nt) {
            assert_eq!(vocab.rule_of(*id).unwrap().lhs, nt);
        }
    }
}

#[test]
fn compound_ids_are_the_set_operators() {
    let vocab = ActionVocabulary::sql();
    let names: Vec<RuleName> = vocab
        .compound_ids()
        .iter()
        .map(|id| vocab.rule_of(*id).unwrap().name)
        .collect();
    assert_eq!(
        names,
        vec![RuleName::Intersect, RuleName::Union, RuleName::Except]
    );
}
