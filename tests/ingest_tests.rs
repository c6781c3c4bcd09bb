use astsql::ast::{
    AggOp, CmpOp, ColumnId, ColumnUnit, Condition, FromClause, GroupByClause, OrderByClause,
    OrderDir, QueryCore, SelectClause, SqlQuery, TableId, UnitOp, Value, ValueId,
};
use astsql::encoder::UnsupportedStructureError;
use astsql::ingest::{sql_from_json, sql_to_json, IngestError, ValueTable};
use serde_json::json;

fn empty_sql(select: serde_json::Value, table: usize) -> serde_json::Value {
    json!({
        "select": select,
        "from": {"table_units": [["table_unit", table]], "conds": []},
        "where": [],
        "groupBy": [],
        "having": [],
        "orderBy": [],
        "limit": null,
        "intersect": null,
        "union": null,
        "except": null
    })
}

#[test]
fn simple_query_is_ingested() {
    let sql = json!({
        "select": [false, [[3, [0, [0, 1, false], null]]]],
        "from": {"table_units": [["table_unit", 0]], "conds": []},
        "where": [[false, 2, [0, [0, 2, false], null], "abc", null]],
        "groupBy": [],
        "having": [],
        "orderBy": [],
        "limit": null,
        "intersect": null,
        "union": null,
        "except": null
    });

    let (query, values) = sql_from_json(&sql).unwrap();
    let core = match &query {
        SqlQuery::Query(core) => core,
        other => panic!("expected plain query, got {:?}", other),
    };

    // The pair-level aggregate folds into the column unit.
    assert_eq!(
        core.select.columns,
        vec![ColumnUnit::Unary {
            agg: AggOp::Count,
            distinct: false,
            column: ColumnId(1),
        }]
    );
    assert_eq!(
        core.from,
        FromClause::Tables {
            tables: vec![TableId(0)],
            condition: Condition::None,
        }
    );
    assert_eq!(
        core.where_clause,
        Condition::Cmp {
            left: ColumnUnit::Unary {
                agg: AggOp::None,
                distinct: false,
                column: ColumnId(2),
            },
            op: CmpOp::Equal,
            value: Value::Literal(ValueId(0)),
        }
    );
    assert_eq!(values.get(ValueId(0)), Some(&json!("abc")));
}

#[test]
fn canonical_json_round_trips() {
    let sql = json!({
        "select": [true, [[0, [0, [4, 2, false], null]]]],
        "from": {
            "table_units": [["table_unit", 0], ["table_unit", 1]],
            "conds": [[false, 2, [0, [0, 3, false], null], [0, 7, false], null]]
        },
        "where": [
            [false, 3, [0, [0, 4, false], null], 10, null],
            "and",
            [false, 1, [0, [0, 5, false], null], 1, 9]
        ],
        "groupBy": [[0, 2, false]],
        "having": [[false, 5, [0, [3, 0, false], null], 3, null]],
        "orderBy": ["desc", [[0, [4, 2, false], null]]],
        "limit": 5,
        "intersect": null,
        "union": null,
        "except": null
    });

    let (query, values) = sql_from_json(&sql).unwrap();
    let rendered = sql_to_json(&query, &values).unwrap();
    assert_eq!(rendered, sql);
}

#[test]
fn set_operation_is_ingested() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["union"] = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 1);

    let (query, _) = sql_from_json(&sql).unwrap();
    match query {
        SqlQuery::Union(left, right) => {
            assert!(matches!(*left, SqlQuery::Query(_)));
            assert!(matches!(*right, SqlQuery::Query(_)));
        }
        other => panic!("expected union, got {:?}", other),
    }
}

#[test]
fn multiple_set_operators_are_unsupported() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["union"] = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 1);
    sql["except"] = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 2);

    assert_eq!(
        sql_from_json(&sql),
        Err(IngestError::Unsupported(
            UnsupportedStructureError::MultipleSetOperators
        ))
    );
}

#[test]
fn limit_without_order_by_is_unsupported() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["limit"] = json!(3);

    assert_eq!(
        sql_from_json(&sql),
        Err(IngestError::Unsupported(
            UnsupportedStructureError::LimitWithoutOrderBy
        ))
    );
}

#[test]
fn order_by_with_limit_interns_the_limit() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["orderBy"] = json!(["asc", [[0, [0, 1, false], null]]]);
    sql["limit"] = json!(3);

    let (query, values) = sql_from_json(&sql).unwrap();
    let core = match &query {
        SqlQuery::Query(core) => core,
        other => panic!("expected plain query, got {:?}", other),
    };
    match &core.order_by {
        OrderByClause::Limit { dir, limit, .. } => {
            assert_eq!(*dir, OrderDir::Asc);
            assert_eq!(values.get(*limit), Some(&json!(3)));
        }
        other => panic!("expected limit clause, got {:?}", other),
    }
}

#[test]
fn mixed_connectives_are_malformed() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["where"] = json!([
        [false, 2, [0, [0, 1, false], null], 1, null],
        "and",
        [false, 2, [0, [0, 2, false], null], 2, null],
        "or",
        [false, 2, [0, [0, 3, false], null], 3, null]
    ]);

    assert!(matches!(
        sql_from_json(&sql),
        Err(IngestError::Shape { .. })
    ));
}

#[test]
fn uniform_or_list_becomes_or_condition() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["where"] = json!([
        [false, 2, [0, [0, 1, false], null], 1, null],
        "or",
        [false, 2, [0, [0, 2, false], null], 2, null]
    ]);

    let (query, _) = sql_from_json(&sql).unwrap();
    let core = match &query {
        SqlQuery::Query(core) => core,
        other => panic!("expected plain query, got {:?}", other),
    };
    assert!(matches!(&core.where_clause, Condition::Or(parts) if parts.len() == 2));
}

#[test]
fn negated_in_maps_to_not_in() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["where"] = json!([[true, 8, [0, [0, 2, false], null], 7, null]]);

    let (query, _) = sql_from_json(&sql).unwrap();
    let core = match &query {
        SqlQuery::Query(core) => core,
        other => panic!("expected plain query, got {:?}", other),
    };
    assert!(matches!(
        &core.where_clause,
        Condition::Cmp { op: CmpOp::NotIn, .. }
    ));
}

#[test]
fn arithmetic_val_unit_becomes_binary_unit() {
    let sql = empty_sql(
        json!([false, [[4, [1, [0, 2, false], [0, 3, false]]]]]),
        0,
    );

    let (query, _) = sql_from_json(&sql).unwrap();
    let core = match &query {
        SqlQuery::Query(core) => core,
        other => panic!("expected plain query, got {:?}", other),
    };
    assert_eq!(
        core.select.columns,
        vec![ColumnUnit::Binary {
            agg: AggOp::Sum,
            op: UnitOp::Minus,
            left: Box::new(ColumnUnit::Unary {
                agg: AggOp::None,
                distinct: false,
                column: ColumnId(2),
            }),
            right: Box::new(ColumnUnit::Unary {
                agg: AggOp::None,
                distinct: false,
                column: ColumnId(3),
            }),
        }]
    );
}

#[test]
fn conflicting_aggregates_are_malformed() {
    // Pair aggregate and inner col_unit aggregate both set.
    let sql = empty_sql(json!([false, [[3, [0, [4, 1, false], null]]]]), 0);
    assert!(matches!(
        sql_from_json(&sql),
        Err(IngestError::Shape { .. })
    ));
}

#[test]
fn repeated_literals_intern_once() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["where"] = json!([
        [false, 2, [0, [0, 1, false], null], "x", null],
        "and",
        [false, 7, [0, [0, 2, false], null], "x", null]
    ]);

    let (_, values) = sql_from_json(&sql).unwrap();
    assert_eq!(values.len(), 1);
}

#[test]
fn subquery_from_is_ingested() {
    let inner = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 1);
    let sql = json!({
        "select": [false, [[0, [0, [0, 0, false], null]]]],
        "from": {"table_units": [["sql", inner]], "conds": []},
        "where": [],
        "groupBy": [],
        "having": [],
        "orderBy": [],
        "limit": null,
        "intersect": null,
        "union": null,
        "except": null
    });

    let (query, _) = sql_from_json(&sql).unwrap();
    let core = match &query {
        SqlQuery::Query(core) => core,
        other => panic!("expected plain query, got {:?}", other),
    };
    assert!(matches!(&core.from, FromClause::Subquery(_)));
}

#[test]
fn having_without_group_by_is_malformed() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["having"] = json!([[false, 3, [0, [3, 0, false], null], 2, null]]);

    assert!(matches!(
        sql_from_json(&sql),
        Err(IngestError::Shape { .. })
    ));
}

#[test]
fn unknown_comparison_index_is_reported() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["where"] = json!([[false, 12, [0, [0, 1, false], null], 1, null]]);

    assert!(matches!(
        sql_from_json(&sql),
        Err(IngestError::UnknownOperator { .. })
    ));
}

#[test]
fn aggregated_arithmetic_order_by_does_not_render_silently() {
    // ORDER BY SUM(col2 - col3): the orderBy val_unit tuple cannot carry
    // the aggregate, so rendering must fail instead of dropping it.
    let query = SqlQuery::Query(QueryCore {
        select: SelectClause {
            distinct: false,
            columns: vec![ColumnUnit::Unary {
                agg: AggOp::None,
                distinct: false,
                column: ColumnId(1),
            }],
        },
        from: FromClause::Tables {
            tables: vec![TableId(0)],
            condition: Condition::None,
        },
        where_clause: Condition::None,
        group_by: GroupByClause::None,
        order_by: OrderByClause::Columns {
            columns: vec![ColumnUnit::Binary {
                agg: AggOp::Sum,
                op: UnitOp::Minus,
                left: Box::new(ColumnUnit::Unary {
                    agg: AggOp::None,
                    distinct: false,
                    column: ColumnId(2),
                }),
                right: Box::new(ColumnUnit::Unary {
                    agg: AggOp::None,
                    distinct: false,
                    column: ColumnId(3),
                }),
            }],
            dir: OrderDir::Desc,
        },
    });

    let err = sql_to_json(&query, &ValueTable::new()).unwrap_err();
    assert!(matches!(err, IngestError::Shape { .. }));
}

#[test]
fn unaggregated_arithmetic_order_by_still_renders() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["orderBy"] = json!(["asc", [[1, [0, 2, false], [0, 3, false]]]]);

    let (query, values) = sql_from_json(&sql).unwrap();
    let rendered = sql_to_json(&query, &values).unwrap();
    assert_eq!(rendered, sql);
}

#[test]
fn trailing_connective_is_malformed() {
    let mut sql = empty_sql(json!([false, [[0, [0, [0, 1, false], null]]]]), 0);
    sql["where"] = json!([[false, 2, [0, [0, 1, false], null], 1, null], "and"]);

    assert!(matches!(
        sql_from_json(&sql),
        Err(IngestError::Shape { .. })
    ));
}

#[test]
fn malformed_select_is_reported() {
    let sql = empty_sql(json!("select *"), 0);
    assert!(matches!(
        sql_from_json(&sql),
        Err(IngestError::Shape { .. })
    ));
}
