use astsql::ast::{
    AggOp, CmpOp, ColumnId, ColumnUnit, Condition, FromClause, GroupByClause, OrderByClause,
    OrderDir, QueryCore, SelectClause, SqlQuery, TableId, Value, ValueId,
};
use astsql::decoder::Decoder;
use astsql::encoder::{Encoder, TraversalOrder};
use astsql::grammar::{RuleName, TerminalKind};
use astsql::oracle::{LegalActionOracle, LegalActions, NoLegalActionError};
use astsql::vocabulary::{Action, ActionVocabulary};

fn col(id: usize) -> ColumnUnit {
    ColumnUnit::Unary {
        agg: AggOp::None,
        distinct: false,
        column: ColumnId(id),
    }
}

fn simple_query(tables: Vec<usize>) -> SqlQuery {
    SqlQuery::Query(QueryCore {
        select: SelectClause {
            distinct: false,
            columns: vec![col(0)],
        },
        from: FromClause::Tables {
            tables: tables.into_iter().map(TableId).collect(),
            condition: Condition::None,
        },
        where_clause: Condition::None,
        group_by: GroupByClause::None,
        order_by: OrderByClause::None,
    })
}

fn admits(legal: &LegalActions, action: &Action) -> bool {
    match (legal, action) {
        (LegalActions::Rules(ids), Action::Apply(id)) => ids.contains(id),
        (LegalActions::Rules(_), _) => false,
        (LegalActions::Terminal(kind), action) => matches!(
            (kind, action),
            (TerminalKind::TableId, Action::Table(_))
                | (TerminalKind::ColumnId, Action::Column(_))
                | (TerminalKind::ValueId, Action::Value(_))
                | (TerminalKind::AggOp, Action::Agg(_))
                | (TerminalKind::UnitOp, Action::Unit(_))
                | (TerminalKind::CmpOp, Action::Cmp(_))
                | (TerminalKind::OrderDir, Action::Order(_))
                | (TerminalKind::Distinct, Action::Distinct(_))
        ),
    }
}

#[test]
fn root_slot_admits_all_sql_rules() {
    let vocab = ActionVocabulary::sql();
    let oracle = LegalActionOracle::new(&vocab);
    let decoder = Decoder::new(&vocab);
    let state = decoder.start();

    match oracle.legal_actions(&state).unwrap() {
        LegalActions::Rules(ids) => {
            let names: Vec<RuleName> = ids
                .iter()
                .map(|id| vocab.rule_of(*id).unwrap().name)
                .collect();
            assert_eq!(ids.len(), 4);
            assert!(names.contains(&RuleName::Intersect));
            assert!(names.contains(&RuleName::Sql));
        }
        other => panic!("expected rule set, got {:?}", other),
    }
}

#[test]
fn set_operator_arms_suppress_compound_rules() {
    let vocab = ActionVocabulary::sql();
    let oracle = LegalActionOracle::new(&vocab);
    let decoder = Decoder::new(&vocab);
    let mut state = decoder.start();
    state
        .apply(
            Action::Apply(vocab.id_of(RuleName::Except, 0).unwrap()),
            &vocab,
        )
        .unwrap();

    match oracle.legal_actions(&state).unwrap() {
        LegalActions::Rules(ids) => {
            assert_eq!(ids.len(), 1);
            assert_eq!(vocab.rule_of(ids[0]).unwrap().name, RuleName::Sql);
        }
        other => panic!("expected rule set, got {:?}", other),
    }
}

#[test]
fn terminal_slot_reports_its_kind() {
    let vocab = ActionVocabulary::sql();
    let oracle = LegalActionOracle::new(&vocab);
    let decoder = Decoder::new(&vocab);
    let mut state = decoder.start();
    state
        .apply(Action::Apply(vocab.id_of(RuleName::Sql, 0).unwrap()), &vocab)
        .unwrap();
    state
        .apply(
            Action::Apply(vocab.id_of(RuleName::SelectColumn, 1).unwrap()),
            &vocab,
        )
        .unwrap();

    // The select clause's first field is the DISTINCT flag.
    assert_eq!(
        oracle.legal_actions(&state).unwrap(),
        LegalActions::Terminal(TerminalKind::Distinct)
    );
}

#[test]
fn complete_derivation_has_no_legal_action() {
    let vocab = ActionVocabulary::sql();
    let oracle = LegalActionOracle::new(&vocab);
    let encoder = Encoder::new(&vocab);
    let decoder = Decoder::new(&vocab);

    let actions = encoder.encode(&simple_query(vec![0])).unwrap();
    let mut state = decoder.start();
    for action in &actions {
        state.apply(*action, &vocab).unwrap();
    }
    assert!(state.is_complete());
    assert_eq!(
        oracle.legal_actions(&state),
        Err(NoLegalActionError::DerivationComplete)
    );
}

#[test]
fn every_emitted_action_is_admissible() {
    // A query touching every clause type; the oracle must admit each
    // encoder-emitted action at its step, in both traversal orders.
    let query = SqlQuery::Union(
        Box::new(SqlQuery::Query(QueryCore {
            select: SelectClause {
                distinct: true,
                columns: vec![col(1), col(2)],
            },
            from: FromClause::Tables {
                tables: vec![TableId(0), TableId(1)],
                condition: Condition::Cmp {
                    left: col(3),
                    op: CmpOp::Equal,
                    value: Value::Column(ColumnId(7)),
                },
            },
            where_clause: Condition::And(vec![
                Condition::Cmp {
                    left: col(4),
                    op: CmpOp::In,
                    value: Value::Sql(Box::new(simple_query(vec![2]))),
                },
                Condition::Between {
                    left: col(5),
                    low: Value::Literal(ValueId(0)),
                    high: Value::Literal(ValueId(1)),
                },
            ]),
            group_by: GroupByClause::Having {
                columns: vec![col(1)],
                condition: Condition::Cmp {
                    left: ColumnUnit::Unary {
                        agg: AggOp::Count,
                        distinct: false,
                        column: ColumnId(0),
                    },
                    op: CmpOp::GreaterThan,
                    value: Value::Literal(ValueId(2)),
                },
            },
            order_by: OrderByClause::Limit {
                columns: vec![col(2)],
                dir: OrderDir::Asc,
                limit: ValueId(3),
            },
        })),
        Box::new(simple_query(vec![3])),
    );

    let vocab = ActionVocabulary::sql();
    let oracle = LegalActionOracle::new(&vocab);
    for order in [TraversalOrder::DepthFirst, TraversalOrder::BreadthFirst] {
        let encoder = Encoder::with_order(&vocab, order);
        let decoder = Decoder::with_order(&vocab, order);
        let actions = encoder.encode(&query).unwrap();

        let mut state = decoder.start();
        for action in &actions {
            let legal = oracle.legal_actions(&state).unwrap();
            assert!(
                admits(&legal, action),
                "oracle rejects {:?} at step {}",
                action,
                state.steps()
            );
            state.apply(*action, &vocab).unwrap();
        }
        assert!(state.is_complete());
    }
}

#[test]
fn mask_agrees_with_legal_set() {
    let vocab = ActionVocabulary::sql();
    let oracle = LegalActionOracle::new(&vocab);
    let decoder = Decoder::new(&vocab);

    let state = decoder.start();
    let mask = oracle.action_mask(&state).unwrap();
    assert_eq!(mask.rules.len(), vocab.size());
    assert_eq!(mask.terminal, None);
    match oracle.legal_actions(&state).unwrap() {
        LegalActions::Rules(ids) => {
            for idx in 0..vocab.size() {
                let legal = ids.iter().any(|id| id.0 == idx);
                assert_eq!(mask.rules[idx], legal, "mask disagrees at action {}", idx);
            }
        }
        other => panic!("expected rule set, got {:?}", other),
    }
}

#[test]
fn mask_for_terminal_slot_is_all_false() {
    let vocab = ActionVocabulary::sql();
    let oracle = LegalActionOracle::new(&vocab);
    let decoder = Decoder::new(&vocab);
    let mut state = decoder.start();
    state
        .apply(Action::Apply(vocab.id_of(RuleName::Sql, 0).unwrap()), &vocab)
        .unwrap();
    state
        .apply(
            Action::Apply(vocab.id_of(RuleName::SelectColumn, 1).unwrap()),
            &vocab,
        )
        .unwrap();

    let mask = oracle.action_mask(&state).unwrap();
    assert_eq!(mask.terminal, Some(TerminalKind::Distinct));
    assert!(mask.rules.iter().all(|b| !b));
}
