//! The seeded HR corpus used by the end-to-end suite.

use common::{Row, RowId};
use expr::ColumnRef;
use schema::{Column, Schema};
use store::{StorageSet, Table};
use types::{Value, ValueType};

pub const JOB_COUNT: u64 = 50;
pub const EMPLOYEE_COUNT: u64 = 300;

/// First hire date, milliseconds since the epoch.
pub const HIRE_EPOCH_MS: i64 = 1_262_304_000_000;

/// Jobs(id, title, minSalary, maxSalary) and
/// Employees(id, firstName, lastName, jobId -> Jobs.id, salary,
/// hireDate).
pub fn hr_schema() -> Schema {
    let mut builder = Schema::builder();
    builder
        .create_table(
            "Jobs",
            vec![
                Column::new("id", ValueType::Text),
                Column::new("title", ValueType::Text),
                Column::new("minSalary", ValueType::Int),
                Column::new("maxSalary", ValueType::Int),
            ],
            "id",
        )
        .expect("jobs schema");
    builder
        .create_table(
            "Employees",
            vec![
                Column::new("id", ValueType::Text),
                Column::new("firstName", ValueType::Text),
                Column::new("lastName", ValueType::Text),
                Column::new("jobId", ValueType::Text),
                Column::new("salary", ValueType::Int),
                Column::new("hireDate", ValueType::Timestamp).nullable(),
            ],
            "id",
        )
        .expect("employees schema");
    builder
        .add_reference("Employees", "jobId", "Jobs", "id")
        .expect("employee job reference");
    builder.finish()
}

/// Salary floor for job `i`: 40_000 + (i % 10) * 2_500, so exactly two
/// of every ten jobs clear 59_000.
pub fn job_min_salary(i: u64) -> i64 {
    40_000 + (i % 10) as i64 * 2_500
}

/// Salary ceiling for job `i`: 60_000 + (i % 25) * 1_000, giving 25
/// distinct values over 50 jobs.
pub fn job_max_salary(i: u64) -> i64 {
    60_000 + (i % 25) as i64 * 1_000
}

pub fn job_row(i: u64) -> Row {
    Row::from_pairs(
        RowId(i),
        [
            ("id", Value::Text(format!("jobId{i}"))),
            ("title", Value::Text(format!("Job {i}"))),
            ("minSalary", Value::Int(job_min_salary(i))),
            ("maxSalary", Value::Int(job_max_salary(i))),
        ],
    )
}

pub fn job_rows() -> Vec<Row> {
    (0..JOB_COUNT).map(job_row).collect()
}

/// Employee `j` works job `j % 50`, so every job has exactly six
/// employees.
pub fn employee_row(j: u64) -> Row {
    Row::from_pairs(
        RowId(j),
        [
            ("id", Value::Text(format!("empId{j}"))),
            ("firstName", Value::Text(format!("First{j}"))),
            ("lastName", Value::Text(format!("Last{j}"))),
            ("jobId", Value::Text(format!("jobId{}", j % JOB_COUNT))),
            ("salary", Value::Int(30_000 + (j % 100) as i64 * 500)),
            (
                "hireDate",
                Value::Timestamp(HIRE_EPOCH_MS + j as i64 * 86_400_000),
            ),
        ],
    )
}

pub fn employee_rows() -> Vec<Row> {
    (0..EMPLOYEE_COUNT).map(employee_row).collect()
}

/// Registered storage with the full corpus loaded.
pub fn seeded_storage() -> StorageSet {
    let mut storage = StorageSet::new();
    storage.register("Jobs").expect("register Jobs");
    storage.register("Employees").expect("register Employees");
    storage
        .table_mut("Jobs")
        .expect("Jobs storage")
        .put(job_rows())
        .expect("seed Jobs");
    storage
        .table_mut("Employees")
        .expect("Employees storage")
        .put(employee_rows())
        .expect("seed Employees");
    storage
}

pub fn col(table: &str, column: &str) -> ColumnRef {
    ColumnRef::new(table, column)
}
