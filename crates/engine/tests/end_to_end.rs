//! End-to-end scenarios over the seeded HR corpus: 50 Jobs, 300
//! Employees, each employee referencing a job.

use engine::{ExecutionContext, OutputRow, QueryEngine, QueryOutput};
use expr::{CompareOp, Operand, Predicate};
use pretty_assertions::assert_eq;
use query::{
    AggregateCall, AggregateFn, JoinClause, OrderBy, Projection, QueryDescription, SelectQuery,
};
use store::StorageSet;
use testsupport::prelude::*;
use types::Value;

fn hr_engine() -> QueryEngine {
    QueryEngine::new(hr_schema())
}

fn select(from: &[&str]) -> SelectQuery {
    SelectQuery::new(from.iter().map(|s| s.to_string()).collect())
}

fn run(engine: &QueryEngine, storage: &mut StorageSet, q: SelectQuery) -> QueryOutput {
    let plan = engine.plan(&QueryDescription::Select(q)).unwrap();
    let mut ctx = ExecutionContext::new(storage);
    engine.execute(plan, &mut ctx).unwrap()
}

#[test]
fn scenario_1_select_all_jobs() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let output = run(&engine, &mut storage, select(&["Jobs"]));
    let rows = output.rows();
    assert_eq!(rows.len(), 50);
    assert!(rows.iter().all(|r| matches!(r, OutputRow::Flat(_))));
}

#[test]
fn scenario_2_limit_and_skip() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let mut q = select(&["Jobs"]);
    q.limit = Some(16);
    assert_eq!(run(&engine, &mut storage, q).rows().len(), 16);

    let mut q = select(&["Jobs"]);
    q.skip = Some(16);
    assert_eq!(run(&engine, &mut storage, q).rows().len(), 34);
}

#[test]
fn scenario_3_point_lookup_by_id() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let mut q = select(&["Jobs"]);
    q.predicate = Some(Predicate::compare(
        col("Jobs", "id"),
        CompareOp::Eq,
        Value::Text("jobId3".into()),
    ));
    let output = run(&engine, &mut storage, q);
    let rows = output.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(as_text(rows[0].get("id")), "jobId3");
}

#[test]
fn scenario_4_projection_keeps_exactly_the_selected_keys() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let mut q = select(&["Jobs"]);
    q.columns = vec![
        Projection::Column(col("Jobs", "id")),
        Projection::Column(col("Jobs", "title")),
    ];
    let output = run(&engine, &mut storage, q);
    let rows = output.rows();
    assert_eq!(rows.len(), 50);
    for row in rows {
        assert_eq!(row.width(), 2);
        assert!(row.get("id").is_some());
        assert!(row.get("title").is_some());
    }
}

fn implicit_join_query(from: &[&str]) -> SelectQuery {
    let mut q = select(from);
    q.predicate = Some(Predicate::And(vec![
        Predicate::compare(
            col("Employees", "jobId"),
            CompareOp::Eq,
            Value::Text("jobId25".into()),
        ),
        Predicate::compare(
            col("Employees", "jobId"),
            CompareOp::Eq,
            Operand::Column(col("Jobs", "id")),
        ),
    ]));
    q
}

#[test]
fn scenario_5_implicit_join_is_composite_and_order_independent() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let employees_of = |output: &QueryOutput| -> Vec<String> {
        output
            .rows()
            .iter()
            .map(|row| as_text(row.get_in("Employees", "id")))
            .collect()
    };

    let output = run(&engine, &mut storage, implicit_join_query(&["Jobs", "Employees"]));
    let rows = output.rows();
    assert_eq!(rows.len(), 6);
    for row in rows {
        assert!(matches!(row, OutputRow::Composite(_)));
        assert_eq!(as_text(row.get_in("Jobs", "id")), "jobId25");
    }
    let expected: Vec<String> = (0..6).map(|k| format!("empId{}", 25 + 50 * k)).collect();
    assert_same_set(employees_of(&output), expected.clone());

    // Identical result with the from list reversed.
    let reversed = run(&engine, &mut storage, implicit_join_query(&["Employees", "Jobs"]));
    assert_eq!(reversed.rows().len(), 6);
    assert_same_set(employees_of(&reversed), expected);
}

#[test]
fn narrow_projection_over_a_join_stays_composite() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    // Projecting only Jobs columns must not collapse the two-table
    // scope into a flat row.
    let mut q = implicit_join_query(&["Jobs", "Employees"]);
    q.columns = vec![Projection::Column(col("Jobs", "title"))];
    let output = run(&engine, &mut storage, q);
    let rows = output.rows();
    assert_eq!(rows.len(), 6);
    for row in rows {
        assert!(matches!(row, OutputRow::Composite(_)));
        assert_eq!(as_text(row.get_in("Jobs", "title")), "Job 25");
        assert!(row.get("title").is_none());
    }
}

#[test]
fn scenario_6_explicit_join_with_filter_on_the_joined_table() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let mut q = select(&["Employees"]);
    q.joins = vec![JoinClause {
        table: "Jobs".into(),
        on: Predicate::compare(
            col("Jobs", "id"),
            CompareOp::Eq,
            Operand::Column(col("Employees", "jobId")),
        ),
    }];
    q.predicate = Some(Predicate::compare(
        col("Jobs", "minSalary"),
        CompareOp::Gt,
        Value::Int(59_000),
    ));

    let output = run(&engine, &mut storage, q);
    let rows = output.rows();
    // Two of every ten jobs clear 59_000; each job has six employees.
    assert_eq!(rows.len(), 60);
    for row in rows {
        assert!(as_int(row.get_in("Jobs", "minSalary")) > 59_000);
        let emp_id = as_text(row.get_in("Employees", "id"));
        let j: u64 = emp_id.trim_start_matches("empId").parse().unwrap();
        assert!(j % 10 == 8 || j % 10 == 9);
    }
}

#[test]
fn scenario_7_single_key_ordering() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let mut q = select(&["Jobs"]);
    q.columns = vec![Projection::Column(col("Jobs", "minSalary"))];
    q.order_by = vec![OrderBy::asc(col("Jobs", "minSalary"))];
    let output = run(&engine, &mut storage, q);
    let values: Vec<i64> = output
        .rows()
        .iter()
        .map(|r| as_int(r.get("minSalary")))
        .collect();
    assert_eq!(values.len(), 50);
    assert_non_decreasing(&values);

    let mut q = select(&["Jobs"]);
    q.columns = vec![Projection::Column(col("Jobs", "minSalary"))];
    q.order_by = vec![OrderBy::desc(col("Jobs", "minSalary"))];
    let output = run(&engine, &mut storage, q);
    let values: Vec<i64> = output
        .rows()
        .iter()
        .map(|r| as_int(r.get("minSalary")))
        .collect();
    assert_non_increasing(&values);
}

#[test]
fn scenario_8_multi_key_ordering() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let mut q = select(&["Jobs"]);
    q.order_by = vec![
        OrderBy::desc(col("Jobs", "maxSalary")),
        OrderBy::asc(col("Jobs", "minSalary")),
    ];
    let output = run(&engine, &mut storage, q);
    let rows = output.rows();
    assert_eq!(rows.len(), 50);

    let maxes: Vec<i64> = rows.iter().map(|r| as_int(r.get("maxSalary"))).collect();
    assert_non_increasing(&maxes);

    // Within each maxSalary bucket, minSalary is non-decreasing.
    let mut i = 0;
    while i < rows.len() {
        let mut j = i;
        while j < rows.len() && maxes[j] == maxes[i] {
            j += 1;
        }
        let mins: Vec<i64> = rows[i..j]
            .iter()
            .map(|r| as_int(r.get("minSalary")))
            .collect();
        assert_non_decreasing(&mins);
        i = j;
    }
}

#[test]
fn scenario_9_aggregate_broadcasts_over_plain_columns() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let mut q = select(&["Jobs"]);
    q.columns = vec![
        Projection::Column(col("Jobs", "title")),
        Projection::Column(col("Jobs", "maxSalary")),
        Projection::Aggregate(AggregateCall::new(
            AggregateFn::Min,
            col("Jobs", "maxSalary"),
        )),
    ];
    let output = run(&engine, &mut storage, q);
    let rows = output.rows();
    assert_eq!(rows.len(), 50);
    for row in rows {
        assert_eq!(row.width(), 3);
        assert!(row.get("title").is_some());
        assert!(row.get("maxSalary").is_some());
        assert_eq!(as_int(row.get("min(maxSalary)")), 60_000);
    }
}

#[test]
fn scenario_10_aggregate_only_projection_is_one_row() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let mut q = select(&["Jobs"]);
    q.columns = vec![
        Projection::Aggregate(AggregateCall::new(
            AggregateFn::Max,
            col("Jobs", "maxSalary"),
        )),
        Projection::Aggregate(AggregateCall::new(
            AggregateFn::Min,
            col("Jobs", "maxSalary"),
        )),
    ];
    let output = run(&engine, &mut storage, q);
    let rows = output.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(as_int(rows[0].get("max(maxSalary)")), 84_000);
    assert_eq!(as_int(rows[0].get("min(maxSalary)")), 60_000);
}

#[test]
fn scenario_11_distinct_aggregates_match_ground_truth() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    // maxSalary takes 25 distinct values: 60_000 + 1_000 * k, k in
    // 0..25, each appearing twice across the 50 jobs.
    let distinct_values: Vec<i64> = (0..25).map(|k| 60_000 + 1_000 * k).collect();
    let distinct_sum: i64 = distinct_values.iter().sum();
    let distinct_avg = distinct_sum as f64 / 25.0;
    let distinct_stddev = {
        let spread: f64 = distinct_values
            .iter()
            .map(|&v| (v as f64 - distinct_avg) * (v as f64 - distinct_avg))
            .sum();
        (spread / 24.0).sqrt()
    };

    let aggregate = |call: AggregateCall| -> Value {
        let mut q = select(&["Jobs"]);
        let name = call.output_name();
        q.columns = vec![Projection::Aggregate(call)];
        let mut fresh = seeded_storage();
        let output = run(&engine, &mut fresh, q);
        output.rows()[0].get(&name).cloned().unwrap()
    };

    assert_eq!(
        aggregate(AggregateCall::over_distinct(
            AggregateFn::Count,
            col("Jobs", "maxSalary")
        )),
        Value::Int(25)
    );
    assert_eq!(
        aggregate(AggregateCall::over_distinct(
            AggregateFn::Sum,
            col("Jobs", "maxSalary")
        )),
        Value::Int(distinct_sum)
    );
    match aggregate(AggregateCall::over_distinct(
        AggregateFn::Avg,
        col("Jobs", "maxSalary"),
    )) {
        Value::Float(avg) => assert!((avg - distinct_avg).abs() < 1e-9),
        other => panic!("expected float avg, got {other:?}"),
    }
    match aggregate(AggregateCall::over_distinct(
        AggregateFn::Stddev,
        col("Jobs", "maxSalary"),
    )) {
        Value::Float(sd) => assert!((sd - distinct_stddev).abs() < 1e-9),
        other => panic!("expected float stddev, got {other:?}"),
    }

    // The collection form: one row per distinct value.
    let mut q = select(&["Jobs"]);
    q.columns = vec![Projection::Aggregate(AggregateCall::new(
        AggregateFn::Distinct,
        col("Jobs", "maxSalary"),
    ))];
    let output = run(&engine, &mut storage, q);
    let mut values: Vec<i64> = output
        .rows()
        .iter()
        .map(|r| as_int(r.get("maxSalary")))
        .collect();
    values.sort();
    assert_eq!(values, distinct_values);
}
