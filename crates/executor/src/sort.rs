//! Sort operator: orders rows by the order-by keys.

use crate::{ExecutionContext, Executor};
use common::{DbResult, ExecutionStats, RelationRow};
use query::{Direction, OrderBy};
use std::cmp::Ordering;
use std::time::Instant;
use types::Value;

/// Blocking operator: materializes its input, then emits rows in
/// sorted order. The sort is stable and uses one lexicographic
/// comparator over all keys, so ties on earlier keys fall through to
/// later ones and finally to input order.
pub struct SortExec {
    input: Box<dyn Executor>,
    keys: Vec<OrderBy>,
    sorted: Option<Vec<RelationRow>>,
    cursor: usize,
    stats: ExecutionStats,
}

impl SortExec {
    pub fn new(input: Box<dyn Executor>, keys: Vec<OrderBy>) -> Self {
        Self {
            input,
            keys,
            sorted: None,
            cursor: 0,
            stats: ExecutionStats::default(),
        }
    }

    fn materialize_and_sort(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let mut rows = Vec::new();
        while let Some(row) = self.input.next(ctx)? {
            rows.push(row);
        }

        let keys = &self.keys;
        rows.sort_by(|a, b| compare_rows(a, b, keys));

        self.sorted = Some(rows);
        self.cursor = 0;
        Ok(())
    }
}

impl Executor for SortExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.stats = ExecutionStats::default();
        self.sorted = None;
        self.cursor = 0;
        self.input.open(ctx)?;
        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<RelationRow>> {
        let start = Instant::now();

        if self.sorted.is_none() {
            self.materialize_and_sort(ctx)?;
        }

        let result = match &self.sorted {
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
        self.sorted = None;
        self.input.close(ctx)?;
        self.stats.close_time = start.elapsed();
        Ok(())
    }

    fn stats(&self) -> Option<&ExecutionStats> {
        Some(&self.stats)
    }
}

/// Compare two rows over all sort keys.
fn compare_rows(a: &RelationRow, b: &RelationRow, keys: &[OrderBy]) -> Ordering {
    for key in keys {
        let va = a.value(&key.column.table, &key.column.column);
        let vb = b.value(&key.column.table, &key.column.column);

        let ordering = match (va, vb) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => compare_values(x, y),
        };

        let directed = match key.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };

        if directed != Ordering::Equal {
            return directed;
        }
    }
    Ordering::Equal
}

/// Null sorts before any value ascending; cross-type values order by
/// type rank so the comparator stays total.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }
    match a.cmp_same_type(b) {
        Some(ordering) => ordering,
        None => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) => 2,
        Value::Float(_) => 3,
        Value::Timestamp(_) => 4,
        Value::Text(_) => 5,
        Value::Blob(_) => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{int_column, rel_row, run_all, MockExecutor};
    use expr::ColumnRef;
    use pretty_assertions::assert_eq;

    fn salary_rows() -> Vec<RelationRow> {
        [62_500, 40_000, 60_000, 40_000]
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                rel_row(
                    "Jobs",
                    i as u64,
                    &[("minSalary", Value::Int(s)), ("rank", Value::Int(i as i64))],
                )
            })
            .collect()
    }

    #[test]
    fn sorts_ascending_and_descending() {
        let key = ColumnRef::new("Jobs", "minSalary");
        let mut sort = SortExec::new(
            Box::new(MockExecutor::new(salary_rows())),
            vec![OrderBy::asc(key.clone())],
        );
        let out = run_all(&mut sort);
        assert_eq!(
            int_column(&out, "Jobs", "minSalary"),
            vec![40_000, 40_000, 60_000, 62_500]
        );

        let mut sort = SortExec::new(
            Box::new(MockExecutor::new(salary_rows())),
            vec![OrderBy::desc(key)],
        );
        let out = run_all(&mut sort);
        assert_eq!(
            int_column(&out, "Jobs", "minSalary"),
            vec![62_500, 60_000, 40_000, 40_000]
        );
    }

    #[test]
    fn sort_is_stable_for_tied_keys() {
        let mut sort = SortExec::new(
            Box::new(MockExecutor::new(salary_rows())),
            vec![OrderBy::asc(ColumnRef::new("Jobs", "minSalary"))],
        );
        let out = run_all(&mut sort);
        // The two 40_000 rows keep their input order (rank 1 before 3).
        assert_eq!(int_column(&out[..2], "Jobs", "rank"), vec![1, 3]);
    }

    #[test]
    fn multi_key_sort_is_lexicographic() {
        let rows = vec![
            rel_row("J", 0, &[("a", Value::Int(2)), ("b", Value::Int(9))]),
            rel_row("J", 1, &[("a", Value::Int(1)), ("b", Value::Int(5))]),
            rel_row("J", 2, &[("a", Value::Int(2)), ("b", Value::Int(3))]),
            rel_row("J", 3, &[("a", Value::Int(1)), ("b", Value::Int(7))]),
        ];
        let mut sort = SortExec::new(
            Box::new(MockExecutor::new(rows)),
            vec![
                OrderBy::desc(ColumnRef::new("J", "a")),
                OrderBy::asc(ColumnRef::new("J", "b")),
            ],
        );
        let out = run_all(&mut sort);
        assert_eq!(int_column(&out, "J", "a"), vec![2, 2, 1, 1]);
        assert_eq!(int_column(&out, "J", "b"), vec![3, 9, 5, 7]);
    }

    #[test]
    fn null_sorts_first_ascending() {
        let rows = vec![
            rel_row("J", 0, &[("a", Value::Int(1))]),
            rel_row("J", 1, &[("a", Value::Null)]),
            rel_row("J", 2, &[("a", Value::Int(0))]),
        ];
        let mut sort = SortExec::new(
            Box::new(MockExecutor::new(rows)),
            vec![OrderBy::asc(ColumnRef::new("J", "a"))],
        );
        let out = run_all(&mut sort);
        assert_eq!(out[0].value("J", "a"), Some(&Value::Null));
        assert_eq!(out[1].value("J", "a"), Some(&Value::Int(0)));
    }
}
