//! Filter operator: applies a predicate to its input rows.

use crate::{ExecutionContext, Executor};
use common::{DbResult, ExecutionStats, RelationRow};
use expr::Predicate;
use std::time::Instant;

/// Passes through the rows for which the predicate holds.
pub struct FilterExec {
    input: Box<dyn Executor>,
    predicate: Predicate,
    stats: ExecutionStats,
}

impl FilterExec {
    pub fn new(input: Box<dyn Executor>, predicate: Predicate) -> Self {
        Self {
            input,
            predicate,
            stats: ExecutionStats::default(),
        }
    }
}

impl Executor for FilterExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.stats = ExecutionStats::default();
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

            if self.predicate.evaluate(&row)? {
                self.stats.rows_produced += 1;
                self.stats.total_next_time += start.elapsed();
                return Ok(Some(row));
            } else {
                self.stats.rows_filtered += 1;
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.input.close(ctx)?;
        self.stats.close_time = start.elapsed();
        Ok(())
    }

    fn stats(&self) -> Option<&ExecutionStats> {
        Some(&self.stats)
    }
}
