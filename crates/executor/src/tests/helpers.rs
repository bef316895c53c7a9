//! Shared helpers for operator tests.

use crate::{ExecutionContext, Executor};
use common::{DbResult, Map, RelationRow, RowId, RowSlice};
use types::Value;

/// Feeds a fixed list of relation rows to the operator under test.
pub struct MockExecutor {
    rows: Vec<RelationRow>,
    cursor: usize,
}

impl MockExecutor {
    pub fn new(rows: Vec<RelationRow>) -> Self {
        Self { rows, cursor: 0 }
    }
}

impl Executor for MockExecutor {
    fn open(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> DbResult<Option<RelationRow>> {
        if self.cursor < self.rows.len() {
            let row = self.rows[self.cursor].clone();
            self.cursor += 1;
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        Ok(())
    }
}

/// Build a single-table relation row from `(column, value)` pairs.
pub fn rel_row(table: &str, id: u64, pairs: &[(&str, Value)]) -> RelationRow {
    let values: Map<String, Value> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    RelationRow::single(table, RowSlice::new(RowId(id), values))
}

/// Drain an operator against an empty storage set.
pub fn run_all(exec: &mut dyn Executor) -> Vec<RelationRow> {
    let mut storage = store::StorageSet::new();
    let mut ctx = ExecutionContext::new(&mut storage);
    exec.open(&mut ctx).unwrap();
    let mut rows = Vec::new();
    while let Some(row) = exec.next(&mut ctx).unwrap() {
        rows.push(row);
    }
    exec.close(&mut ctx).unwrap();
    rows
}

/// Integer column values of one table slice across a result set.
pub fn int_column(rows: &[RelationRow], table: &str, column: &str) -> Vec<i64> {
    rows.iter()
        .map(|r| match r.value(table, column) {
            Some(Value::Int(i)) => *i,
            other => panic!("expected int in {table}.{column}, got {other:?}"),
        })
        .collect()
}
