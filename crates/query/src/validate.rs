//! Description validation: every referenced name must resolve, every
//! literal must match its column's declared type, and aggregators must
//! be well-applied — all before the planner runs.

use crate::{
    AggregateFn, DeleteQuery, InsertQuery, Projection, QueryDescription, SelectQuery, UpdateQuery,
};
use common::{DbError, DbResult};
use expr::{ColumnRef, Operand, Predicate};
use schema::{Column, Schema};
use std::collections::BTreeSet;
use types::Value;

/// Validate a query description against the schema.
pub fn validate(query: &QueryDescription, schema: &Schema) -> DbResult<()> {
    match query {
        QueryDescription::Select(q) => validate_select(q, schema),
        QueryDescription::Insert(q) => validate_insert(q, schema),
        QueryDescription::Update(q) => validate_update(q, schema),
        QueryDescription::Delete(q) => validate_delete(q, schema),
    }
}

fn validate_select(q: &SelectQuery, schema: &Schema) -> DbResult<()> {
    if q.from.is_empty() {
        return Err(DbError::Validation("select needs at least one table".into()));
    }

    let mut scope: BTreeSet<&str> = BTreeSet::new();
    for table in q.scope() {
        schema.table(table)?;
        if !scope.insert(table) {
            return Err(DbError::Validation(format!(
                "table '{table}' appears twice in the query scope"
            )));
        }
    }

    if let Some(pred) = &q.predicate {
        check_predicate(pred, &scope, schema)?;
    }
    for join in &q.joins {
        check_predicate(&join.on, &scope, schema)?;
    }

    let distinct_count = q
        .columns
        .iter()
        .filter(|p| {
            matches!(p, Projection::Aggregate(c) if c.func == AggregateFn::Distinct)
        })
        .count();
    if distinct_count > 0 && q.columns.len() > 1 {
        return Err(DbError::Validation(
            "distinct(column) cannot be combined with other projections".into(),
        ));
    }

    for projection in &q.columns {
        match projection {
            Projection::Column(col) => {
                resolve_column(col, &scope, schema)?;
            }
            Projection::Aggregate(call) => {
                if call.func == AggregateFn::Distinct && call.distinct {
                    return Err(DbError::Validation(
                        "distinct(distinct column) is not a thing".into(),
                    ));
                }
                match &call.column {
                    None => {
                        if call.func != AggregateFn::Count {
                            return Err(DbError::Validation(format!(
                                "{} requires a column",
                                call.func.name()
                            )));
                        }
                    }
                    Some(col) => {
                        let meta = resolve_column(col, &scope, schema)?;
                        if call.func.requires_numeric() && !meta.ty.is_numeric() {
                            return Err(DbError::Validation(format!(
                                "{} applies to numeric columns, '{col}' is {:?}",
                                call.func.name(),
                                meta.ty
                            )));
                        }
                    }
                }
            }
        }
    }

    let plain: Vec<&ColumnRef> = q.plain_columns();
    for order in &q.order_by {
        resolve_column(&order.column, &scope, schema)?;
        if !q.columns.is_empty() && !plain.contains(&&order.column) {
            return Err(DbError::Validation(format!(
                "order-by column '{}' is not part of the projection",
                order.column
            )));
        }
    }

    Ok(())
}

fn validate_insert(q: &InsertQuery, schema: &Schema) -> DbResult<()> {
    let table = schema.table(&q.table)?;
    if q.rows.is_empty() {
        return Err(DbError::Validation("insert carries no rows".into()));
    }

    for row in &q.rows {
        for (name, value) in row.values() {
            let column = table.column(name).ok_or_else(|| {
                DbError::Validation(format!(
                    "unknown column '{name}' on table '{}'",
                    q.table
                ))
            })?;
            check_value(&q.table, column, value)?;
        }
        for column in table.columns() {
            let present = row
                .get(&column.name)
                .map(|v| !v.is_null())
                .unwrap_or(false);
            if !column.nullable && !present {
                return Err(DbError::Validation(format!(
                    "column '{}.{}' is not nullable",
                    q.table, column.name
                )));
            }
        }
    }

    Ok(())
}

fn validate_update(q: &UpdateQuery, schema: &Schema) -> DbResult<()> {
    let table = schema.table(&q.table)?;
    if q.assignments.is_empty() {
        return Err(DbError::Validation("update carries no assignments".into()));
    }

    for assignment in &q.assignments {
        let column = table.column(&assignment.column).ok_or_else(|| {
            DbError::Validation(format!(
                "unknown column '{}' on table '{}'",
                assignment.column, q.table
            ))
        })?;
        if assignment.column == table.primary_key() {
            return Err(DbError::Validation(format!(
                "primary key '{}.{}' cannot be assigned",
                q.table, assignment.column
            )));
        }
        check_value(&q.table, column, &assignment.value)?;
        if assignment.value.is_null() && !column.nullable {
            return Err(DbError::Validation(format!(
                "column '{}.{}' is not nullable",
                q.table, assignment.column
            )));
        }
    }

    if let Some(pred) = &q.predicate {
        let scope: BTreeSet<&str> = [q.table.as_str()].into();
        check_predicate(pred, &scope, schema)?;
    }

    Ok(())
}

fn validate_delete(q: &DeleteQuery, schema: &Schema) -> DbResult<()> {
    schema.table(&q.table)?;
    if let Some(pred) = &q.predicate {
        let scope: BTreeSet<&str> = [q.table.as_str()].into();
        check_predicate(pred, &scope, schema)?;
    }
    Ok(())
}

/// Resolve a column reference within the query scope.
fn resolve_column<'a>(
    col: &ColumnRef,
    scope: &BTreeSet<&str>,
    schema: &'a Schema,
) -> DbResult<&'a Column> {
    if !scope.contains(col.table.as_str()) {
        return Err(DbError::Validation(format!(
            "table '{}' is not in the query's from clause",
            col.table
        )));
    }
    schema
        .table(&col.table)?
        .column(&col.column)
        .ok_or_else(|| {
            DbError::Validation(format!(
                "unknown column '{}' on table '{}'",
                col.column, col.table
            ))
        })
}

/// A literal paired with a column must carry the declared type or Null.
fn check_value(table: &str, column: &Column, value: &Value) -> DbResult<()> {
    if !value.matches_type(column.ty) {
        return Err(DbError::Validation(format!(
            "value {value} does not fit column '{table}.{}' of type {:?}",
            column.name, column.ty
        )));
    }
    Ok(())
}

fn check_predicate(
    pred: &Predicate,
    scope: &BTreeSet<&str>,
    schema: &Schema,
) -> DbResult<()> {
    match pred {
        Predicate::Compare {
            column,
            operand,
            ..
        } => {
            let left = resolve_column(column, scope, schema)?;
            match operand {
                Operand::Value(v) => check_value(&column.table, left, v)?,
                Operand::Column(other) => {
                    let right = resolve_column(other, scope, schema)?;
                    if left.ty != right.ty {
                        return Err(DbError::Validation(format!(
                            "comparison {column} / {other} joins mismatched types"
                        )));
                    }
                }
            }
            Ok(())
        }
        Predicate::Between { column, low, high } => {
            let meta = resolve_column(column, scope, schema)?;
            check_value(&column.table, meta, low)?;
            check_value(&column.table, meta, high)
        }
        Predicate::In { column, values } => {
            let meta = resolve_column(column, scope, schema)?;
            for value in values {
                check_value(&column.table, meta, value)?;
            }
            Ok(())
        }
        Predicate::And(children) | Predicate::Or(children) => {
            for child in children {
                check_predicate(child, scope, schema)?;
            }
            Ok(())
        }
        Predicate::Not(inner) => check_predicate(inner, scope, schema),
        Predicate::Literal(_) => Ok(()),
    }
}
