//! Bounded take: the fused skip/limit operator.

use crate::{ExecutionContext, Executor};
use common::{DbResult, ExecutionStats, RelationRow};
use std::time::Instant;

/// Drops the first `skip` rows, then emits up to `limit` rows.
/// `limit: None` means everything after the skipped prefix.
pub struct LimitExec {
    input: Box<dyn Executor>,
    skip: u64,
    limit: Option<u64>,
    skipped: u64,
    returned: u64,
    stats: ExecutionStats,
}

impl LimitExec {
    pub fn new(input: Box<dyn Executor>, skip: u64, limit: Option<u64>) -> Self {
        Self {
            input,
            skip,
            limit,
            skipped: 0,
            returned: 0,
            stats: ExecutionStats::default(),
        }
    }
}

impl Executor for LimitExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.stats = ExecutionStats::default();
        self.skipped = 0;
        self.returned = 0;
        self.input.open(ctx)?;
        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<RelationRow>> {
        let start = Instant::now();

        if let Some(limit) = self.limit {
            if self.returned >= limit {
                self.stats.total_next_time += start.elapsed();
                return Ok(None);
            }
        }

        while self.skipped < self.skip {
            match self.input.next(ctx)? {
                Some(_) => self.skipped += 1,
                None => {
                    self.stats.total_next_time += start.elapsed();
                    return Ok(None);
                }
            }
        }

        let result = match self.input.next(ctx)? {
            Some(row) => {
                self.returned += 1;
                self.stats.rows_produced += 1;
                Some(row)
            }
            None => None,
        };
        self.stats.total_next_time += start.elapsed();
        Ok(result)
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
