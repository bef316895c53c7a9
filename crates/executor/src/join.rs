//! Join operators: nested loop for general predicates and cross
//! products, hash join for single-equality predicates.

use crate::{ExecutionContext, Executor};
use common::{DbResult, ExecutionStats, Map, RelationRow};
use expr::{ColumnRef, Predicate};
use std::time::Instant;
use types::Value;

/// Nested loop join: for each left row, walk all right rows and keep
/// the combinations the predicate accepts. A `None` predicate keeps
/// everything, which is the cross product.
///
/// Time O(n*m), space O(m): the right side is materialized in `open()`
/// for repeated iteration.
pub struct NestedLoopJoinExec {
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    predicate: Option<Predicate>,

    current_left: Option<RelationRow>,
    right_rows: Vec<RelationRow>,
    right_cursor: usize,
    stats: ExecutionStats,
}

impl NestedLoopJoinExec {
    pub fn new(
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
        predicate: Option<Predicate>,
    ) -> Self {
        Self {
            left,
            right,
            predicate,
            current_left: None,
            right_rows: Vec::new(),
            right_cursor: 0,
            stats: ExecutionStats::default(),
        }
    }
}

impl Executor for NestedLoopJoinExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.stats = ExecutionStats::default();

        self.left.open(ctx)?;
        self.right.open(ctx)?;

        self.right_rows.clear();
        while let Some(row) = self.right.next(ctx)? {
            self.right_rows.push(row);
        }

        self.current_left = self.left.next(ctx)?;
        self.right_cursor = 0;

        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<RelationRow>> {
        let start = Instant::now();

        loop {
            let left_row = match &self.current_left {
                Some(r) => r.clone(),
                None => {
                    self.stats.total_next_time += start.elapsed();
                    return Ok(None);
                }
            };

            while self.right_cursor < self.right_rows.len() {
                let right_row = self.right_rows[self.right_cursor].clone();
                self.right_cursor += 1;

                let combined = left_row.clone().merged(right_row);
                let keep = match &self.predicate {
                    Some(p) => p.evaluate(&combined)?,
                    None => true,
                };
                if keep {
                    self.stats.rows_produced += 1;
                    self.stats.total_next_time += start.elapsed();
                    return Ok(Some(combined));
                }
                self.stats.rows_filtered += 1;
            }

            self.current_left = self.left.next(ctx)?;
            self.right_cursor = 0;
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.right_rows.clear();
        self.current_left = None;
        self.left.close(ctx)?;
        self.right.close(ctx)?;
        self.stats.close_time = start.elapsed();
        Ok(())
    }

    fn stats(&self) -> Option<&ExecutionStats> {
        Some(&self.stats)
    }
}

/// Hash join over a single equality. Both sides are materialized in
/// `open()`; the smaller side builds the hash table and the larger one
/// probes it. Null keys bucket together, so Null joins Null and
/// nothing else — the same strict equality the predicate evaluator
/// applies in a nested loop.
#[derive(bon::Builder)]
pub struct HashJoinExec {
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    left_key: ColumnRef,
    right_key: ColumnRef,

    #[builder(default)]
    build_rows: Vec<RelationRow>,
    #[builder(default)]
    probe_rows: Vec<RelationRow>,
    #[builder(default)]
    table: Map<Value, Vec<usize>>,
    #[builder(default)]
    build_is_left: bool,
    #[builder(default)]
    probe_cursor: usize,
    #[builder(default)]
    match_cursor: usize,
    #[builder(default)]
    stats: ExecutionStats,
}

impl HashJoinExec {
    fn key_of(row: &RelationRow, key: &ColumnRef) -> Value {
        row.value(&key.table, &key.column)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

impl Executor for HashJoinExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.stats = ExecutionStats::default();

        self.left.open(ctx)?;
        self.right.open(ctx)?;

        let mut left_rows = Vec::new();
        while let Some(row) = self.left.next(ctx)? {
            left_rows.push(row);
        }
        let mut right_rows = Vec::new();
        while let Some(row) = self.right.next(ctx)? {
            right_rows.push(row);
        }

        self.build_is_left = left_rows.len() <= right_rows.len();
        let (build_rows, probe_rows) = if self.build_is_left {
            (left_rows, right_rows)
        } else {
            (right_rows, left_rows)
        };
        let build_key = if self.build_is_left {
            self.left_key.clone()
        } else {
            self.right_key.clone()
        };

        self.table = Map::default();
        for (idx, row) in build_rows.iter().enumerate() {
            let key = Self::key_of(row, &build_key);
            self.table.entry(key).or_default().push(idx);
        }

        self.build_rows = build_rows;
        self.probe_rows = probe_rows;
        self.probe_cursor = 0;
        self.match_cursor = 0;

        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> DbResult<Option<RelationRow>> {
        let start = Instant::now();
        let probe_key = if self.build_is_left {
            self.right_key.clone()
        } else {
            self.left_key.clone()
        };

        loop {
            if self.probe_cursor >= self.probe_rows.len() {
                self.stats.total_next_time += start.elapsed();
                return Ok(None);
            }

            let probe_row = &self.probe_rows[self.probe_cursor];
            let key = Self::key_of(probe_row, &probe_key);
            let matches = self.table.get(&key);

            if let Some(matches) = matches {
                if self.match_cursor < matches.len() {
                    let build_row = &self.build_rows[matches[self.match_cursor]];
                    self.match_cursor += 1;

                    // Output scope order is left-then-right no matter
                    // which side built the table.
                    let combined = if self.build_is_left {
                        build_row.clone().merged(probe_row.clone())
                    } else {
                        probe_row.clone().merged(build_row.clone())
                    };
                    self.stats.rows_produced += 1;
                    self.stats.total_next_time += start.elapsed();
                    return Ok(Some(combined));
                }
            }

            self.probe_cursor += 1;
            self.match_cursor = 0;
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.build_rows.clear();
        self.probe_rows.clear();
        self.table = Map::default();
        self.left.close(ctx)?;
        self.right.close(ctx)?;
        self.stats.close_time = start.elapsed();
        Ok(())
    }

    fn stats(&self) -> Option<&ExecutionStats> {
        Some(&self.stats)
    }
}
