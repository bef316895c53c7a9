//! Distinct operator: one row per distinct value of a column.

use crate::{ExecutionContext, Executor};
use common::{DbResult, ExecutionStats, RelationRow};
use expr::ColumnRef;
use std::collections::HashSet;
use std::time::Instant;
use types::Value;

/// Streams its input and keeps the first row carrying each distinct
/// value of the column, in input order of first occurrence. Null
/// counts as a value of its own.
pub struct DistinctExec {
    input: Box<dyn Executor>,
    column: ColumnRef,
    seen: HashSet<Value>,
    stats: ExecutionStats,
}

impl DistinctExec {
    pub fn new(input: Box<dyn Executor>, column: ColumnRef) -> Self {
        Self {
            input,
            column,
            seen: HashSet::new(),
            stats: ExecutionStats::default(),
        }
    }
}

impl Executor for DistinctExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.stats = ExecutionStats::default();
        self.seen.clear();
        self.input.open(ctx)?;
        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<RelationRow>> {
        let start = Instant::now();

        loop {
            let row = match self.input.next(ctx)? {
                Some(r) => r,
                None => {
                    self.stats.total_next_time += start.elapsed();
                    return Ok(None);
                }
            };

            let value = row
                .value(&self.column.table, &self.column.column)
                .cloned()
                .unwrap_or(Value::Null);
            if self.seen.insert(value) {
                self.stats.rows_produced += 1;
                self.stats.total_next_time += start.elapsed();
                return Ok(Some(row));
            }
            self.stats.rows_filtered += 1;
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.seen.clear();
        self.input.close(ctx)?;
        self.stats.close_time = start.elapsed();
        Ok(())
    }

    fn stats(&self) -> Option<&ExecutionStats> {
        Some(&self.stats)
    }
}
