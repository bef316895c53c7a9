//! Project operator: restricts each relation row to the selected
//! columns, keeping any computed aggregate outputs alongside them.

use crate::{ExecutionContext, Executor};
use common::{DbError, DbResult, ExecutionStats, Map, RelationRow, RowId, RowSlice};
use expr::ColumnRef;
use query::AggregateCall;
use std::time::Instant;
use types::Value;

/// Restricts rows to the projected columns. Every table of the input
/// scope keeps its slice — emptied when none of its columns survive —
/// so a narrow projection over a join still produces composite rows.
pub struct ProjectExec {
    input: Box<dyn Executor>,
    columns: Vec<ColumnRef>,
    aggregates: Vec<AggregateCall>,
    stats: ExecutionStats,
}

impl ProjectExec {
    pub fn new(
        input: Box<dyn Executor>,
        columns: Vec<ColumnRef>,
        aggregates: Vec<AggregateCall>,
    ) -> Self {
        Self {
            input,
            columns,
            aggregates,
            stats: ExecutionStats::default(),
        }
    }

    fn project(&self, row: &RelationRow) -> DbResult<RelationRow> {
        let mut out = RelationRow::default();

        for (table, slice) in row.slices() {
            out.insert_slice(table.clone(), RowSlice::new(slice.row_id, Map::default()));
        }

        for column in &self.columns {
            let slice = row.slice(&column.table).ok_or_else(|| {
                DbError::Exec(format!("table '{}' not in scope", column.table))
            })?;
            let value = slice
                .values
                .get(&column.column)
                .cloned()
                .unwrap_or(Value::Null);
            insert_value(&mut out, &column.table, slice.row_id, &column.column, value);
        }

        // Aggregate outputs were attached by the aggregate operator;
        // carry them over from wherever they live.
        for call in &self.aggregates {
            let name = call.output_name();
            let located = row.slices().iter().find_map(|(table, slice)| {
                slice
                    .values
                    .get(&name)
                    .map(|v| (table.clone(), slice.row_id, v.clone()))
            });
            let (table, row_id, value) = located.ok_or_else(|| {
                DbError::Exec(format!("aggregate output '{name}' missing from input row"))
            })?;
            insert_value(&mut out, &table, row_id, &name, value);
        }

        Ok(out)
    }
}

fn insert_value(out: &mut RelationRow, table: &str, row_id: RowId, name: &str, value: Value) {
    if out.slice(table).is_none() {
        out.insert_slice(table, RowSlice::new(row_id, Map::default()));
    }
    if let Some(slice) = out.slice_mut(table) {
        slice.values.insert(name.to_string(), value);
    }
}

impl Executor for ProjectExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.stats = ExecutionStats::default();
        self.input.open(ctx)?;
        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<RelationRow>> {
        let start = Instant::now();

        let row = match self.input.next(ctx)? {
            Some(r) => r,
            None => {
                self.stats.total_next_time += start.elapsed();
                return Ok(None);
            }
        };

        let projected = self.project(&row)?;
        self.stats.rows_produced += 1;
        self.stats.total_next_time += start.elapsed();
        Ok(Some(projected))
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
