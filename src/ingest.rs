//! Ingestion boundary: Spider-format SQL object dicts ↔ typed trees.
//!
//! The core never parses raw SQL text; it consumes the nested JSON structure
//! an external parser produces (select tuple, from dict with table_units and
//! conds, where/having condition lists, groupBy/orderBy lists, optional
//! limit and intersect/union/except) and converts it into the typed tree the
//! encoder works on. Literal values are interned into a per-example
//! [`ValueTable`] so the tree carries opaque value ids, mirroring the
//! grounding the decoder network predicts against.

use std::fmt;

use serde_json::Value as JsonValue;

use crate::ast::{
    AggOp, CmpOp, ColumnId, ColumnUnit, Condition, FromClause, GroupByClause, OrderByClause,
    OrderDir, QueryCore, SelectClause, SqlQuery, TableId, UnitOp, Value, ValueId,
};
use crate::encoder::UnsupportedStructureError;

/// Per-example table of grounded literal values.
///
/// Interning deduplicates by JSON equality, so the same literal appearing
/// twice grounds to one id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTable {
    values: Vec<JsonValue>,
}

impl ValueTable {
    pub fn new() -> ValueTable {
        ValueTable::default()
    }

    pub fn intern(&mut self, value: JsonValue) -> ValueId {
        if let Some(pos) = self.values.iter().position(|v| *v == value) {
            return ValueId(pos);
        }
        self.values.push(value);
        ValueId(self.values.len() - 1)
    }

    pub fn get(&self, id: ValueId) -> Option<&JsonValue> {
        self.values.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Errors at the JSON ingestion boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestError {
    /// The JSON does not have the documented SQL object shape
    Shape { context: String },

    /// An operator index outside the known catalogues
    UnknownOperator { what: &'static str, index: usize },

    /// The object is well-formed but violates a grammar limitation
    Unsupported(UnsupportedStructureError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Shape { context } => write!(f, "malformed SQL object: {}", context),
            IngestError::UnknownOperator { what, index } => {
                write!(f, "unknown {} index {}", what, index)
            }
            IngestError::Unsupported(e) => write!(f, "unsupported structure: {}", e),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Unsupported(e) => Some(e),
            _ => None,
        }
    }
}

impl From<UnsupportedStructureError> for IngestError {
    fn from(e: UnsupportedStructureError) -> Self {
        IngestError::Unsupported(e)
    }
}

fn shape(context: impl Into<String>) -> IngestError {
    IngestError::Shape {
        context: context.into(),
    }
}

/// Convert a Spider-format SQL object into a typed tree plus its grounded
/// value table.
pub fn sql_from_json(value: &JsonValue) -> Result<(SqlQuery, ValueTable), IngestError> {
    let mut table = ValueTable::new();
    let query = read_sql(value, &mut table)?;
    Ok((query, table))
}

fn read_sql(value: &JsonValue, table: &mut ValueTable) -> Result<SqlQuery, IngestError> {
    let dict = value.as_object().ok_or_else(|| shape("sql is not an object"))?;

    let set_ops = [
        ("intersect", dict.get("intersect")),
        ("union", dict.get("union")),
        ("except", dict.get("except")),
    ];
    let populated: Vec<(&str, &JsonValue)> = set_ops
        .iter()
        .filter_map(|(name, v)| match v {
            Some(v) if !v.is_null() => Some((*name, *v)),
            _ => None,
        })
        .collect();
    if populated.len() > 1 {
        return Err(UnsupportedStructureError::MultipleSetOperators.into());
    }

    let core = read_core(dict, table)?;
    match populated.first() {
        None => Ok(SqlQuery::Query(core)),
        Some((name, nested)) => {
            let left = Box::new(SqlQuery::Query(core));
            let right = Box::new(read_sql(nested, table)?);
            Ok(match *name {
                "intersect" => SqlQuery::Intersect(left, right),
                "union" => SqlQuery::Union(left, right),
                _ => SqlQuery::Except(left, right),
            })
        }
    }
}

fn read_core(
    dict: &serde_json::Map<String, JsonValue>,
    table: &mut ValueTable,
) -> Result<QueryCore, IngestError> {
    let select = read_select(dict.get("select").unwrap_or(&JsonValue::Null))?;
    let from = read_from(dict.get("from").unwrap_or(&JsonValue::Null), table)?;
    let where_clause = read_condition(dict.get("where").unwrap_or(&JsonValue::Null), table)?;

    let group_cols = match dict.get("groupBy") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(read_col_unit)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(shape("groupBy is not a list")),
    };
    let having = read_condition(dict.get("having").unwrap_or(&JsonValue::Null), table)?;
    let group_by = match (group_cols.is_empty(), &having) {
        (true, Condition::None) => GroupByClause::None,
        (true, _) => return Err(shape("HAVING without GROUP BY")),
        (false, Condition::None) => GroupByClause::Columns(group_cols),
        (false, _) => GroupByClause::Having {
            columns: group_cols,
            condition: having,
        },
    };

    let order_by = read_orderby(
        dict.get("orderBy").unwrap_or(&JsonValue::Null),
        dict.get("limit").unwrap_or(&JsonValue::Null),
        table,
    )?;

    Ok(QueryCore {
        select,
        from,
        where_clause,
        group_by,
        order_by,
    })
}

fn read_select(value: &JsonValue) -> Result<SelectClause, IngestError> {
    let parts = value
        .as_array()
        .ok_or_else(|| shape("select is not a [distinct, columns] pair"))?;
    let (distinct, pairs) = match parts.as_slice() {
        [JsonValue::Bool(d), JsonValue::Array(pairs)] => (*d, pairs),
        _ => return Err(shape("select is not a [distinct, columns] pair")),
    };
    let mut columns = Vec::new();
    for pair in pairs {
        let pair = pair
            .as_array()
            .filter(|p| p.len() == 2)
            .ok_or_else(|| shape("select item is not an [agg, val_unit] pair"))?;
        let agg_index = pair[0]
            .as_u64()
            .ok_or_else(|| shape("select aggregate is not an index"))?
            as usize;
        let agg = AggOp::from_index(agg_index).ok_or(IngestError::UnknownOperator {
            what: "aggregate",
            index: agg_index,
        })?;
        let unit = read_val_unit(&pair[1])?;
        columns.push(fold_agg(agg, unit)?);
    }
    Ok(SelectClause { distinct, columns })
}

/// Fold the outer aggregate of a select pair into the column unit itself.
fn fold_agg(agg: AggOp, unit: ColumnUnit) -> Result<ColumnUnit, IngestError> {
    if agg == AggOp::None {
        return Ok(unit);
    }
    match unit {
        ColumnUnit::Unary {
            agg: AggOp::None,
            distinct,
            column,
        } => Ok(ColumnUnit::Unary {
            agg,
            distinct,
            column,
        }),
        ColumnUnit::Binary {
            agg: AggOp::None,
            op,
            left,
            right,
        } => Ok(ColumnUnit::Binary {
            agg,
            op,
            left,
            right,
        }),
        _ => Err(shape("conflicting aggregates on one column unit")),
    }
}

fn read_from(value: &JsonValue, table: &mut ValueTable) -> Result<FromClause, IngestError> {
    let dict = value
        .as_object()
        .ok_or_else(|| shape("from is not an object"))?;
    let units = dict
        .get("table_units")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| shape("from.table_units is not a list"))?;
    if units.is_empty() {
        return Err(shape("from.table_units is empty"));
    }

    let conds = read_condition(dict.get("conds").unwrap_or(&JsonValue::Null), table)?;

    let first = units[0]
        .as_array()
        .filter(|u| u.len() == 2)
        .ok_or_else(|| shape("table unit is not a [kind, ref] pair"))?;
    if first[0].as_str() == Some("sql") {
        if units.len() > 1 {
            return Err(shape("subquery FROM with more than one table unit"));
        }
        if conds != Condition::None {
            return Err(shape("subquery FROM with join conditions"));
        }
        let query = read_sql(&first[1], table)?;
        return Ok(FromClause::Subquery(Box::new(query)));
    }

    let mut tables = Vec::new();
    for unit in units {
        let unit = unit
            .as_array()
            .filter(|u| u.len() == 2)
            .ok_or_else(|| shape("table unit is not a [kind, ref] pair"))?;
        if unit[0].as_str() != Some("table_unit") {
            return Err(shape("mixed table and subquery FROM units"));
        }
        let id = unit[1]
            .as_u64()
            .ok_or_else(|| shape("table unit ref is not a table id"))? as usize;
        tables.push(TableId(id));
    }
    Ok(FromClause::Tables {
        tables,
        condition: conds,
    })
}

fn read_condition(value: &JsonValue, table: &mut ValueTable) -> Result<Condition, IngestError> {
    let items = match value {
        JsonValue::Null => return Ok(Condition::None),
        JsonValue::Array(items) if items.is_empty() => return Ok(Condition::None),
        JsonValue::Array(items) => items,
        _ => return Err(shape("condition is not a list")),
    };

    // Flat list: cond_unit ('and'|'or' cond_unit)*, so always odd length.
    if items.len() % 2 == 0 {
        return Err(shape("condition list ends on a connective"));
    }
    let mut parts = Vec::new();
    let mut connective: Option<&str> = None;
    for (i, item) in items.iter().enumerate() {
        if i % 2 == 0 {
            parts.push(read_cond_unit(item, table)?);
        } else {
            let conn = item
                .as_str()
                .filter(|s| *s == "and" || *s == "or")
                .ok_or_else(|| shape("condition connective is not 'and'/'or'"))?;
            match connective {
                None => connective = Some(conn),
                Some(prev) if prev == conn => {}
                Some(_) => return Err(shape("mixed and/or in one condition list")),
            }
        }
    }

    match (parts.len(), connective) {
        (1, _) => Ok(parts.pop().unwrap_or(Condition::None)),
        (_, Some("and")) => Ok(Condition::And(parts)),
        (_, Some("or")) => Ok(Condition::Or(parts)),
        _ => Err(shape("condition list without connectives")),
    }
}

fn read_cond_unit(value: &JsonValue, table: &mut ValueTable) -> Result<Condition, IngestError> {
    let unit = value
        .as_array()
        .filter(|u| u.len() == 5)
        .ok_or_else(|| shape("condition unit is not a 5-tuple"))?;
    let negated = unit[0]
        .as_bool()
        .ok_or_else(|| shape("condition negation flag is not a boolean"))?;
    let op_id = unit[1]
        .as_u64()
        .ok_or_else(|| shape("condition operator is not an index"))? as usize;
    let left = read_val_unit(&unit[2])?;

    if op_id == 1 {
        // between
        if negated {
            return Err(IngestError::UnknownOperator {
                what: "negated between",
                index: op_id,
            });
        }
        let low = read_value(&unit[3], table)?;
        let high = read_value(&unit[4], table)?;
        return Ok(Condition::Between { left, low, high });
    }

    let op = CmpOp::from_spider(op_id, negated).ok_or(IngestError::UnknownOperator {
        what: "comparison",
        index: op_id,
    })?;
    let value = read_value(&unit[3], table)?;
    Ok(Condition::Cmp { left, op, value })
}

fn read_orderby(
    order: &JsonValue,
    limit: &JsonValue,
    table: &mut ValueTable,
) -> Result<OrderByClause, IngestError> {
    let parts: &[JsonValue] = match order {
        JsonValue::Null => &[],
        JsonValue::Array(parts) => parts,
        _ => return Err(shape("orderBy is not a list")),
    };
    if parts.is_empty() {
        if !limit.is_null() {
            return Err(UnsupportedStructureError::LimitWithoutOrderBy.into());
        }
        return Ok(OrderByClause::None);
    }

    let (dir, units) = match parts {
        [JsonValue::String(dir), JsonValue::Array(units)] => (dir, units),
        _ => return Err(shape("orderBy is not a [direction, val_units] pair")),
    };
    let dir = OrderDir::from_str(dir).ok_or_else(|| shape("orderBy direction"))?;
    let columns = units
        .iter()
        .map(read_val_unit)
        .collect::<Result<Vec<_>, _>>()?;

    if limit.is_null() {
        Ok(OrderByClause::Columns { columns, dir })
    } else {
        let limit = table.intern(limit.clone());
        Ok(OrderByClause::Limit {
            columns,
            dir,
            limit,
        })
    }
}

fn read_val_unit(value: &JsonValue) -> Result<ColumnUnit, IngestError> {
    let unit = value
        .as_array()
        .filter(|u| u.len() == 3)
        .ok_or_else(|| shape("val_unit is not a 3-tuple"))?;
    let op_index = unit[0]
        .as_u64()
        .ok_or_else(|| shape("val_unit operator is not an index"))? as usize;
    if op_index == 0 {
        return read_col_unit(&unit[1]);
    }
    let op = UnitOp::from_index(op_index).ok_or(IngestError::UnknownOperator {
        what: "unit operator",
        index: op_index,
    })?;
    let left = Box::new(read_col_unit(&unit[1])?);
    let right = Box::new(read_col_unit(&unit[2])?);
    Ok(ColumnUnit::Binary {
        agg: AggOp::None,
        op,
        left,
        right,
    })
}

fn read_col_unit(value: &JsonValue) -> Result<ColumnUnit, IngestError> {
    let unit = value
        .as_array()
        .filter(|u| u.len() == 3)
        .ok_or_else(|| shape("col_unit is not a 3-tuple"))?;
    let agg_index = unit[0]
        .as_u64()
        .ok_or_else(|| shape("col_unit aggregate is not an index"))? as usize;
    let agg = AggOp::from_index(agg_index).ok_or(IngestError::UnknownOperator {
        what: "aggregate",
        index: agg_index,
    })?;
    let column = unit[1]
        .as_u64()
        .ok_or_else(|| shape("col_unit column is not a column id"))? as usize;
    let distinct = unit[2]
        .as_bool()
        .ok_or_else(|| shape("col_unit distinct flag is not a boolean"))?;
    Ok(ColumnUnit::Unary {
        agg,
        distinct,
        column: ColumnId(column),
    })
}

fn read_value(value: &JsonValue, table: &mut ValueTable) -> Result<Value, IngestError> {
    match value {
        JsonValue::Object(_) => Ok(Value::Sql(Box::new(read_sql(value, table)?))),
        JsonValue::Array(_) => {
            // A column reference on the right-hand side.
            match read_col_unit(value)? {
                ColumnUnit::Unary { column, .. } => Ok(Value::Column(column)),
                _ => Err(shape("column-valued comparison is not a col_unit")),
            }
        }
        JsonValue::Number(_) | JsonValue::String(_) | JsonValue::Bool(_) => {
            Ok(Value::Literal(table.intern(value.clone())))
        }
        JsonValue::Null => Err(shape("null comparison value")),
    }
}

/// Render a typed tree back into the Spider-format SQL object.
///
/// Canonical form: select pair aggregates are written inside the col_unit
/// for unary units and as the pair aggregate for binary units; round-tripping
/// a canonical object reproduces it byte-identically.
pub fn sql_to_json(query: &SqlQuery, table: &ValueTable) -> Result<JsonValue, IngestError> {
    write_sql(query, table)
}

fn write_sql(query: &SqlQuery, table: &ValueTable) -> Result<JsonValue, IngestError> {
    let (core, op, nested) = match query {
        SqlQuery::Query(core) => (core, None, None),
        SqlQuery::Intersect(left, right) => (compound_core(left)?, Some("intersect"), Some(right)),
        SqlQuery::Union(left, right) => (compound_core(left)?, Some("union"), Some(right)),
        SqlQuery::Except(left, right) => (compound_core(left)?, Some("except"), Some(right)),
    };

    let mut dict = serde_json::Map::new();
    dict.insert("select".to_string(), write_select(&core.select)?);
    dict.insert("from".to_string(), write_from(&core.from, table)?);
    dict.insert(
        "where".to_string(),
        write_condition(&core.where_clause, table)?,
    );
    let (group_by, having) = match &core.group_by {
        GroupByClause::None => (JsonValue::Array(vec![]), JsonValue::Array(vec![])),
        GroupByClause::Columns(columns) => (write_col_units(columns)?, JsonValue::Array(vec![])),
        GroupByClause::Having { columns, condition } => {
            (write_col_units(columns)?, write_condition(condition, table)?)
        }
    };
    dict.insert("groupBy".to_string(), group_by);
    dict.insert("having".to_string(), having);
    let (order_by, limit) = match &core.order_by {
        OrderByClause::None => (JsonValue::Array(vec![]), JsonValue::Null),
        OrderByClause::Columns { columns, dir } => (write_orderby(columns, *dir)?, JsonValue::Null),
        OrderByClause::Limit {
            columns,
            dir,
            limit,
        } => (
            write_orderby(columns, *dir)?,
            lookup_value(table, *limit)?,
        ),
    };
    dict.insert("orderBy".to_string(), order_by);
    dict.insert("limit".to_string(), limit);

    for name in ["intersect", "union", "except"] {
        let value = match (op, nested) {
            (Some(op), Some(nested)) if op == name => write_sql(nested, table)?,
            _ => JsonValue::Null,
        };
        dict.insert(name.to_string(), value);
    }
    Ok(JsonValue::Object(dict))
}

fn compound_core(query: &SqlQuery) -> Result<&QueryCore, IngestError> {
    match query {
        SqlQuery::Query(core) => Ok(core),
        _ => Err(UnsupportedStructureError::NestedSetOperator.into()),
    }
}

fn write_select(select: &SelectClause) -> Result<JsonValue, IngestError> {
    let mut pairs = Vec::new();
    for unit in &select.columns {
        let (agg, val_unit) = write_val_unit(unit)?;
        pairs.push(JsonValue::Array(vec![JsonValue::from(agg), val_unit]));
    }
    Ok(JsonValue::Array(vec![
        JsonValue::Bool(select.distinct),
        JsonValue::Array(pairs),
    ]))
}

fn write_from(from: &FromClause, table: &ValueTable) -> Result<JsonValue, IngestError> {
    let mut dict = serde_json::Map::new();
    match from {
        FromClause::Tables { tables, condition } => {
            let units: Vec<JsonValue> = tables
                .iter()
                .map(|t| {
                    JsonValue::Array(vec![
                        JsonValue::String("table_unit".to_string()),
                        JsonValue::from(t.0),
                    ])
                })
                .collect();
            dict.insert("table_units".to_string(), JsonValue::Array(units));
            dict.insert("conds".to_string(), write_condition(condition, table)?);
        }
        FromClause::Subquery(query) => {
            let unit = JsonValue::Array(vec![
                JsonValue::String("sql".to_string()),
                write_sql(query, table)?,
            ]);
            dict.insert("table_units".to_string(), JsonValue::Array(vec![unit]));
            dict.insert("conds".to_string(), JsonValue::Array(vec![]));
        }
    }
    Ok(JsonValue::Object(dict))
}

fn write_condition(cond: &Condition, table: &ValueTable) -> Result<JsonValue, IngestError> {
    let (parts, connective) = match cond {
        Condition::None => return Ok(JsonValue::Array(vec![])),
        Condition::And(parts) => (parts.as_slice(), "and"),
        Condition::Or(parts) => (parts.as_slice(), "or"),
        unit => (std::slice::from_ref(unit), "and"),
    };
    let mut items = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            items.push(JsonValue::String(connective.to_string()));
        }
        items.push(write_cond_unit(part, table)?);
    }
    Ok(JsonValue::Array(items))
}

fn write_cond_unit(cond: &Condition, table: &ValueTable) -> Result<JsonValue, IngestError> {
    match cond {
        Condition::Cmp { left, op, value } => {
            let (op_id, negated) = op.to_spider();
            let (agg, val_unit) = write_val_unit(left)?;
            if agg != 0 {
                return Err(shape(
                    "aggregate on a condition operand is not expressible",
                ));
            }
            Ok(JsonValue::Array(vec![
                JsonValue::Bool(negated),
                JsonValue::from(op_id),
                val_unit,
                write_value(value, table)?,
                JsonValue::Null,
            ]))
        }
        Condition::Between { left, low, high } => {
            let (agg, val_unit) = write_val_unit(left)?;
            if agg != 0 {
                return Err(shape(
                    "aggregate on a condition operand is not expressible",
                ));
            }
            Ok(JsonValue::Array(vec![
                JsonValue::Bool(false),
                JsonValue::from(1usize),
                val_unit,
                write_value(low, table)?,
                write_value(high, table)?,
            ]))
        }
        _ => Err(shape("nested and/or is not expressible in a flat list")),
    }
}

/// Write a column unit as a Spider val_unit, returning the pair-level
/// aggregate for binary units (the val_unit tuple has no aggregate slot).
fn write_val_unit(unit: &ColumnUnit) -> Result<(usize, JsonValue), IngestError> {
    match unit {
        ColumnUnit::Unary { .. } => Ok((
            0,
            JsonValue::Array(vec![
                JsonValue::from(0usize),
                write_col_unit(unit)?,
                JsonValue::Null,
            ]),
        )),
        ColumnUnit::Binary {
            agg,
            op,
            left,
            right,
        } => Ok((
            agg.index(),
            JsonValue::Array(vec![
                JsonValue::from(op.index()),
                write_col_unit(left)?,
                write_col_unit(right)?,
            ]),
        )),
    }
}

fn write_col_unit(unit: &ColumnUnit) -> Result<JsonValue, IngestError> {
    match unit {
        ColumnUnit::Unary {
            agg,
            distinct,
            column,
        } => Ok(JsonValue::Array(vec![
            JsonValue::from(agg.index()),
            JsonValue::from(column.0),
            JsonValue::Bool(*distinct),
        ])),
        ColumnUnit::Binary { .. } => Err(shape(
            "nested arithmetic column unit is not expressible as a col_unit",
        )),
    }
}

fn write_col_units(units: &[ColumnUnit]) -> Result<JsonValue, IngestError> {
    let items = units
        .iter()
        .map(write_col_unit)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(JsonValue::Array(items))
}

fn write_orderby(columns: &[ColumnUnit], dir: OrderDir) -> Result<JsonValue, IngestError> {
    let mut units = Vec::new();
    for unit in columns {
        // The orderBy val_unit tuple has no aggregate slot.
        let (agg, val_unit) = write_val_unit(unit)?;
        if agg != 0 {
            return Err(shape(
                "aggregate on an ORDER BY operand is not expressible",
            ));
        }
        units.push(val_unit);
    }
    Ok(JsonValue::Array(vec![
        JsonValue::String(dir.as_str().to_string()),
        JsonValue::Array(units),
    ]))
}

fn write_value(value: &Value, table: &ValueTable) -> Result<JsonValue, IngestError> {
    match value {
        Value::Sql(query) => write_sql(query, table),
        Value::Literal(id) => lookup_value(table, *id),
        Value::Column(id) => Ok(JsonValue::Array(vec![
            JsonValue::from(0usize),
            JsonValue::from(id.0),
            JsonValue::Bool(false),
        ])),
    }
}

fn lookup_value(table: &ValueTable, id: ValueId) -> Result<JsonValue, IngestError> {
    table
        .get(id)
        .cloned()
        .ok_or_else(|| shape(format!("value id {} outside the value table", id.0)))
}
