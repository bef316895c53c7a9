//! Aggregate operator: computes scalar reductions over its whole
//! input.
//!
//! With an aggregate-only projection the operator collapses to a
//! single row of scalars. Mixed with plain columns it broadcasts each
//! scalar onto every input row — the aggregate is computed over the
//! entire group, not per row.

use crate::{ExecutionContext, Executor};
use common::{DbError, DbResult, ExecutionStats, Map, RelationRow, RowId, RowSlice};
use query::{AggregateCall, AggregateFn};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Instant;
use types::Value;

/// Blocking operator: buffers the input, computes every call's scalar
/// in one pass, then replays the annotated rows (or the one collapsed
/// row).
pub struct AggregateExec {
    input: Box<dyn Executor>,
    calls: Vec<AggregateCall>,
    collapse: bool,
    anchor: String,
    output: Option<Vec<RelationRow>>,
    cursor: usize,
    stats: ExecutionStats,
}

impl AggregateExec {
    pub fn new(
        input: Box<dyn Executor>,
        calls: Vec<AggregateCall>,
        collapse: bool,
        anchor: String,
    ) -> Self {
        Self {
            input,
            calls,
            collapse,
            anchor,
            output: None,
            cursor: 0,
            stats: ExecutionStats::default(),
        }
    }

    fn materialize(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let mut rows = Vec::new();
        while let Some(row) = self.input.next(ctx)? {
            rows.push(row);
        }

        let mut computed = Vec::with_capacity(self.calls.len());
        for call in &self.calls {
            let table = call
                .column
                .as_ref()
                .map(|c| c.table.clone())
                .unwrap_or_else(|| self.anchor.clone());
            computed.push((table, call.output_name(), compute(call, &rows)?));
        }

        let output = if self.collapse {
            let mut row = RelationRow::default();
            for (table, name, value) in computed {
                attach(&mut row, &table, name, value);
            }
            vec![row]
        } else {
            rows.into_iter()
                .map(|mut row| {
                    for (table, name, value) in &computed {
                        attach(&mut row, table, name.clone(), value.clone());
                    }
                    row
                })
                .collect()
        };

        self.output = Some(output);
        self.cursor = 0;
        Ok(())
    }
}

fn attach(row: &mut RelationRow, table: &str, name: String, value: Value) {
    if row.slice(table).is_none() {
        row.insert_slice(table, RowSlice::new(RowId(0), Map::default()));
    }
    if let Some(slice) = row.slice_mut(table) {
        slice.values.insert(name, value);
    }
}

/// Compute one call's scalar over the buffered rows.
fn compute(call: &AggregateCall, rows: &[RelationRow]) -> DbResult<Value> {
    let column = match &call.column {
        // count(*) counts rows, absent values included.
        None => return Ok(Value::Int(rows.len() as i64)),
        Some(column) => column,
    };

    let mut values: Vec<Value> = rows
        .iter()
        .filter_map(|row| row.value(&column.table, &column.column))
        .filter(|v| !v.is_null())
        .cloned()
        .collect();

    if call.distinct {
        let mut seen = HashSet::new();
        values.retain(|v| seen.insert(v.clone()));
    }

    match call.func {
        AggregateFn::Count => Ok(Value::Int(values.len() as i64)),
        AggregateFn::Min => extremum(&values, Ordering::Less),
        AggregateFn::Max => extremum(&values, Ordering::Greater),
        AggregateFn::Sum => sum(&values),
        AggregateFn::Avg => {
            if values.is_empty() {
                return Ok(Value::Null);
            }
            Ok(Value::Float(mean(&values)?))
        }
        AggregateFn::Stddev => {
            // Sample standard deviation; below two values the n-1
            // divisor vanishes and the result is the absent marker.
            if values.len() < 2 {
                return Ok(Value::Null);
            }
            let m = mean(&values)?;
            let mut acc = 0.0;
            for v in &values {
                let x = numeric(v)?;
                acc += (x - m) * (x - m);
            }
            Ok(Value::Float((acc / (values.len() as f64 - 1.0)).sqrt()))
        }
        AggregateFn::Distinct => Err(DbError::Exec(
            "distinct(column) runs as its own operator".into(),
        )),
    }
}

fn extremum(values: &[Value], keep: Ordering) -> DbResult<Value> {
    let mut best: Option<&Value> = None;
    for v in values {
        best = match best {
            None => Some(v),
            Some(current) => {
                let ord = v.cmp_same_type(current).ok_or_else(|| {
                    DbError::Exec(format!(
                        "cannot compare {v:?} with {current:?} while aggregating"
                    ))
                })?;
                if ord == keep {
                    Some(v)
                } else {
                    Some(current)
                }
            }
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

/// SUM of an empty input is 0. Integer sums wrap per two's complement;
/// a float anywhere promotes the whole sum to float.
fn sum(values: &[Value]) -> DbResult<Value> {
    if values.is_empty() {
        return Ok(Value::Int(0));
    }
    if values.iter().any(|v| matches!(v, Value::Float(_))) {
        let mut acc = 0.0;
        for v in values {
            acc += numeric(v)?;
        }
        return Ok(Value::Float(acc));
    }
    let mut acc: i64 = 0;
    for v in values {
        match v {
            Value::Int(i) => acc = acc.wrapping_add(*i),
            other => {
                return Err(DbError::Exec(format!("sum over non-numeric {other:?}")));
            }
        }
    }
    Ok(Value::Int(acc))
}

fn mean(values: &[Value]) -> DbResult<f64> {
    let mut acc = 0.0;
    for v in values {
        acc += numeric(v)?;
    }
    Ok(acc / values.len() as f64)
}

fn numeric(v: &Value) -> DbResult<f64> {
    v.as_f64()
        .ok_or_else(|| DbError::Exec(format!("non-numeric {v:?} in numeric aggregate")))
}

impl Executor for AggregateExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.stats = ExecutionStats::default();
        self.output = None;
        self.cursor = 0;
        self.input.open(ctx)?;
        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<RelationRow>> {
        let start = Instant::now();

        if self.output.is_none() {
            self.materialize(ctx)?;
        }

        let result = match &self.output {
            Some(rows) if self.cursor < rows.len() => {
                let row = rows[self.cursor].clone();
                self.cursor += 1;
                self.stats.rows_produced += 1;
                Some(row)
            }
            _ => None,
        };
        self.stats.total_next_time += start.elapsed();
        Ok(result)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.output = None;
        self.input.close(ctx)?;
        self.stats.close_time = start.elapsed();
        Ok(())
    }

    fn stats(&self) -> Option<&ExecutionStats> {
        Some(&self.stats)
    }
}
