//! Table scan operator: the leaf that reads storage.

use crate::{ExecutionContext, Executor};
use common::{DbResult, ExecutionStats, Map, RelationRow, RowSlice};
use std::time::Instant;
use store::Table;

/// Scans every row of one table, wrapping each as a single-table
/// relation row keyed by the table's name.
///
/// The snapshot is taken in `open()` with one `get([])` call, so a
/// running query observes a stable view of the table. A pushed-down
/// projection narrows the copied columns.
pub struct TableScanExec {
    table: String,
    columns: Option<Vec<String>>,
    rows: Vec<RelationRow>,
    cursor: usize,
    stats: ExecutionStats,
}

impl TableScanExec {
    pub fn new(table: String, columns: Option<Vec<String>>) -> Self {
        Self {
            table,
            columns,
            rows: Vec::new(),
            cursor: 0,
            stats: ExecutionStats::default(),
        }
    }
}

impl Executor for TableScanExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.stats = ExecutionStats::default();
        self.cursor = 0;

        ctx.check_cancelled()?;
        let stored = ctx.storage.table(&self.table)?.get(&[])?;
        self.stats.rows_scanned = stored.len() as u64;

        self.rows = stored
            .into_iter()
            .map(|row| {
                let values: Map<String, types::Value> = match &self.columns {
                    None => row.values().clone(),
                    Some(columns) => columns
                        .iter()
                        .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                        .collect(),
                };
                RelationRow::single(self.table.clone(), RowSlice::new(row.id, values))
            })
            .collect();

        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> DbResult<Option<RelationRow>> {
        let start = Instant::now();
        let result = if self.cursor < self.rows.len() {
            let row = self.rows[self.cursor].clone();
            self.cursor += 1;
            self.stats.rows_produced += 1;
            Some(row)
        } else {
            None
        };
        self.stats.total_next_time += start.elapsed();
        Ok(result)
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.rows.clear();
        self.stats.close_time = start.elapsed();
        Ok(())
    }

    fn stats(&self) -> Option<&ExecutionStats> {
        Some(&self.stats)
    }
}
