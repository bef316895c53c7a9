//! Write statements: Insert, Update, Delete.
//!
//! Reads flow through the regular operator tree; the mutation itself
//! is a single atomic `put`/`remove` per statement. Partial writes are
//! not rolled back here — that is the external transaction layer's
//! job.

use crate::{build_executor, ExecutionContext};
use common::{DbError, DbResult, Map, Row, RowId};
use planner::PhysicalPlan;
use query::{Assignment, ConflictPolicy};
use std::collections::HashSet;
use store::Table;
use types::Value;

/// Insert a batch of rows, enforcing identity and unique-column
/// constraints per the conflict policy.
pub fn execute_insert(
    table: &str,
    rows: Vec<Row>,
    policy: ConflictPolicy,
    unique_columns: &[String],
    ctx: &mut ExecutionContext,
) -> DbResult<u64> {
    ctx.check_cancelled()?;

    {
        let stored = ctx.storage.table(table)?;

        if policy == ConflictPolicy::Error {
            let ids: Vec<RowId> = rows.iter().map(|r| r.id).collect();
            let existing = stored.get(&ids)?;
            if let Some(hit) = existing.first() {
                return Err(DbError::Constraint(format!(
                    "row {} already exists in '{table}'",
                    hit.id.0
                )));
            }
        }

        if !unique_columns.is_empty() {
            let snapshot = stored.get(&[])?;
            let replaced: HashSet<RowId> = match policy {
                ConflictPolicy::Replace => rows.iter().map(|r| r.id).collect(),
                ConflictPolicy::Error => HashSet::new(),
            };

            for column in unique_columns {
                let mut seen: Map<Value, RowId> = Map::default();
                for existing in &snapshot {
                    if replaced.contains(&existing.id) {
                        continue;
                    }
                    if let Some(v) = existing.get(column) {
                        if !v.is_null() {
                            seen.insert(v.clone(), existing.id);
                        }
                    }
                }
                for row in &rows {
                    if let Some(v) = row.get(column) {
                        if v.is_null() {
                            continue;
                        }
                        if let Some(owner) = seen.get(v) {
                            if *owner != row.id {
                                return Err(DbError::Constraint(format!(
                                    "duplicate value {v} for unique column '{table}.{column}'"
                                )));
                            }
                        }
                        seen.insert(v.clone(), row.id);
                    }
                }
            }
        }
    }

    ctx.check_cancelled()?;
    let count = rows.len() as u64;
    ctx.storage.table_mut(table)?.put(rows)?;
    Ok(count)
}

/// Read the matching rows, apply the assignments to copies, put the
/// copies back.
pub fn execute_update(
    table: &str,
    assignments: &[Assignment],
    input: PhysicalPlan,
    ctx: &mut ExecutionContext,
) -> DbResult<u64> {
    let matches = read_matches(table, input, ctx)?;
    if matches.is_empty() {
        return Ok(0);
    }

    let mut updated = Vec::with_capacity(matches.len());
    for (id, mut values) in matches {
        for assignment in assignments {
            values.insert(assignment.column.clone(), assignment.value.clone());
        }
        updated.push(Row::new(id, values));
    }

    ctx.check_cancelled()?;
    let count = updated.len() as u64;
    ctx.storage.table_mut(table)?.put(updated)?;
    Ok(count)
}

/// Read the matching row ids, then remove them.
pub fn execute_delete(
    table: &str,
    input: PhysicalPlan,
    ctx: &mut ExecutionContext,
) -> DbResult<u64> {
    let matches = read_matches(table, input, ctx)?;
    // remove([]) clears the whole table by convention; a predicate that
    // matched nothing must stay a no-op.
    if matches.is_empty() {
        return Ok(0);
    }

    let ids: Vec<RowId> = matches.into_iter().map(|(id, _)| id).collect();
    ctx.check_cancelled()?;
    let count = ids.len() as u64;
    ctx.storage.table_mut(table)?.remove(&ids)?;
    Ok(count)
}

/// Drive the read side of a write statement and collect the target
/// table's slices.
fn read_matches(
    table: &str,
    input: PhysicalPlan,
    ctx: &mut ExecutionContext,
) -> DbResult<Vec<(RowId, Map<String, Value>)>> {
    let mut executor = build_executor(input)?;
    executor.open(ctx)?;

    let mut matches = Vec::new();
    while let Some(row) = executor.next(ctx)? {
        let slice = row.slice(table).ok_or_else(|| {
            DbError::Exec(format!("write statement lost its '{table}' slice"))
        })?;
        matches.push((slice.row_id, slice.values.clone()));
    }

    executor.close(ctx)?;
    Ok(matches)
}
