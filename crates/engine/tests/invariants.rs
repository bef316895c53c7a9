//! Universal invariants and write-path round-trips.

use common::{Row, RowId};
use engine::{CancelToken, Config, ExecutionContext, QueryEngine, QueryOutput};
use expr::{CompareOp, Operand, Predicate};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use query::{
    AggregateCall, AggregateFn, Assignment, ConflictPolicy, DeleteQuery, InsertQuery, Projection,
    QueryDescription, SelectQuery, UpdateQuery,
};
use schema::{Column, Schema};
use store::{StorageSet, Table};
use testsupport::prelude::*;
use types::{Value, ValueType};

fn hr_engine() -> QueryEngine {
    QueryEngine::new(hr_schema())
}

fn select(from: &[&str]) -> SelectQuery {
    SelectQuery::new(from.iter().map(|s| s.to_string()).collect())
}

fn run(engine: &QueryEngine, storage: &mut StorageSet, q: QueryDescription) -> QueryOutput {
    let plan = engine.plan(&q).unwrap();
    let mut ctx = ExecutionContext::new(storage);
    engine.execute(plan, &mut ctx).unwrap()
}

#[test]
fn unfiltered_select_count_equals_table_size() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let jobs = run(&engine, &mut storage, QueryDescription::Select(select(&["Jobs"])));
    assert_eq!(jobs.rows().len(), storage.table("Jobs").unwrap().row_count());

    let emps = run(
        &engine,
        &mut storage,
        QueryDescription::Select(select(&["Employees"])),
    );
    assert_eq!(
        emps.rows().len(),
        storage.table("Employees").unwrap().row_count()
    );
}

#[test]
fn predicate_select_equals_the_manual_filter() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let mut q = select(&["Jobs"]);
    q.predicate = Some(Predicate::compare(
        col("Jobs", "minSalary"),
        CompareOp::Gt,
        Value::Int(50_000),
    ));
    let output = run(&engine, &mut storage, QueryDescription::Select(q));

    let expected = (0..JOB_COUNT).filter(|&i| job_min_salary(i) > 50_000).count();
    assert_eq!(output.rows().len(), expected);
}

#[test]
fn insert_then_select_returns_the_rows_modulo_order() {
    let engine = hr_engine();
    let mut storage = engine.open_storage();

    let insert = QueryDescription::Insert(InsertQuery {
        table: "Jobs".into(),
        rows: job_rows(),
        policy: ConflictPolicy::Error,
    });
    let output = run(&engine, &mut storage, insert);
    assert_eq!(output.affected(), JOB_COUNT);

    let output = run(&engine, &mut storage, QueryDescription::Select(select(&["Jobs"])));
    let got: Vec<String> = output
        .rows()
        .iter()
        .map(|r| as_text(r.get("id")))
        .collect();
    let expected: Vec<String> = (0..JOB_COUNT).map(|i| format!("jobId{i}")).collect();
    assert_same_set(got, expected);
}

#[test]
fn insert_then_delete_all_leaves_nothing() {
    let engine = hr_engine();
    let mut storage = engine.open_storage();

    run(
        &engine,
        &mut storage,
        QueryDescription::Insert(InsertQuery {
            table: "Jobs".into(),
            rows: job_rows(),
            policy: ConflictPolicy::Error,
        }),
    );
    let deleted = run(
        &engine,
        &mut storage,
        QueryDescription::Delete(DeleteQuery {
            table: "Jobs".into(),
            predicate: None,
        }),
    );
    assert_eq!(deleted.affected(), JOB_COUNT);

    let output = run(&engine, &mut storage, QueryDescription::Select(select(&["Jobs"])));
    assert!(output.rows().is_empty());
}

#[test]
fn update_rewrites_matching_rows_only() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let update = QueryDescription::Update(UpdateQuery {
        table: "Employees".into(),
        assignments: vec![Assignment::new("salary", Value::Int(99_000))],
        predicate: Some(Predicate::compare(
            col("Employees", "jobId"),
            CompareOp::Eq,
            Value::Text("jobId25".into()),
        )),
    });
    let output = run(&engine, &mut storage, update);
    assert_eq!(output.affected(), 6);

    let mut q = select(&["Employees"]);
    q.predicate = Some(Predicate::compare(
        col("Employees", "salary"),
        CompareOp::Eq,
        Value::Int(99_000),
    ));
    let output = run(&engine, &mut storage, QueryDescription::Select(q));
    assert_eq!(output.rows().len(), 6);
    for row in output.rows() {
        assert_eq!(as_text(row.get("jobId")), "jobId25");
        // Untouched columns survive the copy-and-put-back.
        assert!(row.get("hireDate").is_some());
    }
    assert_eq!(storage.table("Employees").unwrap().row_count(), 300);
}

#[test]
fn delete_with_predicate_removes_exactly_the_matches() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let delete = QueryDescription::Delete(DeleteQuery {
        table: "Jobs".into(),
        predicate: Some(Predicate::compare(
            col("Jobs", "minSalary"),
            CompareOp::Gt,
            Value::Int(59_000),
        )),
    });
    let output = run(&engine, &mut storage, delete);
    assert_eq!(output.affected(), 10);
    assert_eq!(storage.table("Jobs").unwrap().row_count(), 40);

    // A predicate matching nothing is a no-op, not a table clear.
    let delete = QueryDescription::Delete(DeleteQuery {
        table: "Jobs".into(),
        predicate: Some(Predicate::compare(
            col("Jobs", "minSalary"),
            CompareOp::Gt,
            Value::Int(1_000_000),
        )),
    });
    let output = run(&engine, &mut storage, delete);
    assert_eq!(output.affected(), 0);
    assert_eq!(storage.table("Jobs").unwrap().row_count(), 40);
}

#[test]
fn insert_conflict_policies() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let mut replacement = job_row(3);
    replacement.set("title", Value::Text("Replaced".into()));

    let erroring = QueryDescription::Insert(InsertQuery {
        table: "Jobs".into(),
        rows: vec![replacement.clone()],
        policy: ConflictPolicy::Error,
    });
    let plan = engine.plan(&erroring).unwrap();
    let mut ctx = ExecutionContext::new(&mut storage);
    let err = engine.execute(plan, &mut ctx).unwrap_err();
    assert!(matches!(err, common::DbError::Constraint(_)));

    let replacing = QueryDescription::Insert(InsertQuery {
        table: "Jobs".into(),
        rows: vec![replacement],
        policy: ConflictPolicy::Replace,
    });
    let output = run(&engine, &mut storage, replacing);
    assert_eq!(output.affected(), 1);
    assert_eq!(storage.table("Jobs").unwrap().row_count(), 50);

    let mut q = select(&["Jobs"]);
    q.predicate = Some(Predicate::compare(
        col("Jobs", "id"),
        CompareOp::Eq,
        Value::Text("jobId3".into()),
    ));
    let output = run(&engine, &mut storage, QueryDescription::Select(q));
    assert_eq!(as_text(output.rows()[0].get("title")), "Replaced");
}

#[test]
fn aggregates_over_an_empty_selection() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let mut q = select(&["Jobs"]);
    q.predicate = Some(Predicate::compare(
        col("Jobs", "minSalary"),
        CompareOp::Gt,
        Value::Int(1_000_000),
    ));
    q.columns = vec![
        Projection::Aggregate(AggregateCall::new(AggregateFn::Count, col("Jobs", "maxSalary"))),
        Projection::Aggregate(AggregateCall::new(AggregateFn::Sum, col("Jobs", "maxSalary"))),
        Projection::Aggregate(AggregateCall::new(AggregateFn::Min, col("Jobs", "maxSalary"))),
        Projection::Aggregate(AggregateCall::new(AggregateFn::Avg, col("Jobs", "maxSalary"))),
        Projection::Aggregate(AggregateCall::new(
            AggregateFn::Stddev,
            col("Jobs", "maxSalary"),
        )),
    ];
    let output = run(&engine, &mut storage, QueryDescription::Select(q));
    let row = &output.rows()[0];
    assert_eq!(row.get("count(maxSalary)"), Some(&Value::Int(0)));
    assert_eq!(row.get("sum(maxSalary)"), Some(&Value::Int(0)));
    assert_eq!(row.get("min(maxSalary)"), Some(&Value::Null));
    assert_eq!(row.get("avg(maxSalary)"), Some(&Value::Null));
    assert_eq!(row.get("stddev(maxSalary)"), Some(&Value::Null));
}

#[test]
fn cancellation_aborts_before_storage_is_touched() {
    let engine = hr_engine();
    let mut storage = seeded_storage();

    let cancel = CancelToken::new();
    cancel.cancel();

    let plan = engine
        .plan(&QueryDescription::Select(select(&["Jobs"])))
        .unwrap();
    let mut ctx = ExecutionContext::with_cancel(&mut storage, cancel.clone());
    let err = engine.execute(plan, &mut ctx).unwrap_err();
    assert!(matches!(err, common::DbError::Cancelled));

    let delete = QueryDescription::Delete(DeleteQuery {
        table: "Jobs".into(),
        predicate: None,
    });
    let plan = engine.plan(&delete).unwrap();
    let mut ctx = ExecutionContext::with_cancel(&mut storage, cancel);
    let err = engine.execute(plan, &mut ctx).unwrap_err();
    assert!(matches!(err, common::DbError::Cancelled));
    assert_eq!(storage.table("Jobs").unwrap().row_count(), 50);
}

#[test]
fn rewrites_and_join_strategy_do_not_change_results() {
    let plain = Config::builder()
        .hash_join_enabled(false)
        .predicate_pushdown(false)
        .projection_pushdown(false)
        .constant_folding(false)
        .build();

    let employees_for = |engine: &QueryEngine| -> Vec<String> {
        let mut storage = seeded_storage();
        let mut q = select(&["Jobs", "Employees"]);
        q.predicate = Some(Predicate::And(vec![
            Predicate::compare(
                col("Jobs", "minSalary"),
                CompareOp::Gt,
                Value::Int(59_000),
            ),
            Predicate::compare(
                col("Employees", "jobId"),
                CompareOp::Eq,
                Operand::Column(col("Jobs", "id")),
            ),
        ]));
        let output = run(engine, &mut storage, QueryDescription::Select(q));
        output
            .rows()
            .iter()
            .map(|r| as_text(r.get_in("Employees", "id")))
            .collect()
    };

    let optimized = employees_for(&hr_engine());
    let unoptimized = employees_for(&QueryEngine::with_config(hr_schema(), plain));
    assert_eq!(optimized.len(), 60);
    assert_same_set(optimized, unoptimized);
}

#[test]
fn join_strategies_agree_on_null_join_keys() {
    let mut builder = Schema::builder();
    builder
        .create_table(
            "Jobs",
            vec![
                Column::new("id", ValueType::Text),
                Column::new("code", ValueType::Text).nullable(),
            ],
            "id",
        )
        .unwrap();
    builder
        .create_table(
            "Employees",
            vec![
                Column::new("id", ValueType::Text),
                Column::new("jobCode", ValueType::Text).nullable(),
            ],
            "id",
        )
        .unwrap();
    let schema = builder.finish();

    let pairs_under = |config: Config| -> Vec<(String, String)> {
        let engine = QueryEngine::with_config(schema.clone(), config);
        let mut storage = engine.open_storage();
        storage
            .table_mut("Jobs")
            .unwrap()
            .put(vec![
                Row::from_pairs(
                    RowId(1),
                    [
                        ("id", Value::Text("j1".into())),
                        ("code", Value::Text("A".into())),
                    ],
                ),
                Row::from_pairs(
                    RowId(2),
                    [("id", Value::Text("j2".into())), ("code", Value::Null)],
                ),
            ])
            .unwrap();
        storage
            .table_mut("Employees")
            .unwrap()
            .put(vec![
                Row::from_pairs(
                    RowId(1),
                    [
                        ("id", Value::Text("e1".into())),
                        ("jobCode", Value::Text("A".into())),
                    ],
                ),
                Row::from_pairs(
                    RowId(2),
                    [("id", Value::Text("e2".into())), ("jobCode", Value::Null)],
                ),
                Row::from_pairs(
                    RowId(3),
                    [
                        ("id", Value::Text("e3".into())),
                        ("jobCode", Value::Text("B".into())),
                    ],
                ),
            ])
            .unwrap();

        let mut q = select(&["Jobs", "Employees"]);
        q.predicate = Some(Predicate::compare(
            col("Jobs", "code"),
            CompareOp::Eq,
            Operand::Column(col("Employees", "jobCode")),
        ));
        let output = run(&engine, &mut storage, QueryDescription::Select(q));
        let mut pairs: Vec<(String, String)> = output
            .rows()
            .iter()
            .map(|r| {
                (
                    as_text(r.get_in("Jobs", "id")),
                    as_text(r.get_in("Employees", "id")),
                )
            })
            .collect();
        pairs.sort();
        pairs
    };

    // Null joins Null and nothing else, under either join strategy.
    let expected = vec![
        ("j1".to_string(), "e1".to_string()),
        ("j2".to_string(), "e2".to_string()),
    ];
    assert_eq!(pairs_under(Config::default()), expected);
    assert_eq!(
        pairs_under(Config::builder().hash_join_enabled(false).build()),
        expected
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // |select * from Jobs skip s limit n| is exactly
    // min(n, max(0, 50 - s)).
    #[test]
    fn limit_skip_cardinality(limit in 0u64..60, skip in 0u64..60) {
        let engine = hr_engine();
        let mut storage = seeded_storage();

        let mut q = select(&["Jobs"]);
        q.limit = Some(limit);
        q.skip = Some(skip);
        let output = run(&engine, &mut storage, QueryDescription::Select(q));

        let expected = limit.min(JOB_COUNT.saturating_sub(skip));
        prop_assert_eq!(output.rows().len() as u64, expected);
    }

    // Point lookups return exactly one row for every seeded id.
    #[test]
    fn point_lookup_finds_every_job(i in 0u64..50) {
        let engine = hr_engine();
        let mut storage = seeded_storage();

        let mut q = select(&["Jobs"]);
        q.predicate = Some(Predicate::compare(
            col("Jobs", "id"),
            CompareOp::Eq,
            Value::Text(format!("jobId{i}")),
        ));
        let output = run(&engine, &mut storage, QueryDescription::Select(q));
        prop_assert_eq!(output.rows().len(), 1);
    }
}
