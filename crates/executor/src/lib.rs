//! Query executor: runs physical plans with a Volcano-style iterator
//! model.
//!
//! Each row-producing operator implements [`Executor`]: initialize in
//! `open()`, pull relation rows through `next()`, release buffers in
//! `close()`. Write statements do not masquerade as iterators; they run
//! through [`execute_dml`], which reads through the operator tree and
//! applies its mutations as one storage call.
//!
//! # Architecture
//!
//! ```text
//! PhysicalPlan
//!     ↓
//! build_executor()          execute_dml()
//!     ↓                         ↓
//! open() → next()* → close()   read matches, then put/remove
//!     ↓
//! Vec<RelationRow>
//! ```
//!
//! Storage calls are the only suspension points of the engine; the
//! cancellation token is checked before each one.

mod aggregate;
mod builder;
mod distinct;
mod dml;
mod filter;
mod join;
mod limit;
mod project;
mod scan;
mod sort;


pub use builder::build_executor;

use common::{CancelToken, DbError, DbResult, ExecutionStats, RelationRow};
use planner::PhysicalPlan;
use store::StorageSet;

/// Volcano-style iterator interface for query execution.
pub trait Executor {
    /// Initialize the operator (take storage snapshots, allocate
    /// buffers).
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()>;

    /// Fetch the next relation row, or None if exhausted.
    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<RelationRow>>;

    /// Release buffers.
    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()>;

    /// Execution statistics, for operators that collect them.
    fn stats(&self) -> Option<&ExecutionStats> {
        None
    }
}

/// Shared execution state passed to all operators: the storage backing
/// the tables and the cooperative cancellation flag.
pub struct ExecutionContext<'a> {
    pub storage: &'a mut StorageSet,
    pub cancel: CancelToken,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(storage: &'a mut StorageSet) -> Self {
        Self {
            storage,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(storage: &'a mut StorageSet, cancel: CancelToken) -> Self {
        Self { storage, cancel }
    }

    /// Checked before every storage operation.
    pub fn check_cancelled(&self) -> DbResult<()> {
        if self.cancel.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        Ok(())
    }
}

/// Execute a row-producing plan and collect every result row.
///
/// # Errors
///
/// `DbError::Exec` when handed a DML plan; whatever the operators
/// raise otherwise.
pub fn execute_query(
    plan: PhysicalPlan,
    ctx: &mut ExecutionContext,
) -> DbResult<Vec<RelationRow>> {
    if plan.is_dml() {
        return Err(DbError::Exec(
            "write statements execute through execute_dml".into(),
        ));
    }

    let mut executor = build_executor(plan)?;

    executor.open(ctx)?;

    let mut results = Vec::new();
    while let Some(row) = executor.next(ctx)? {
        results.push(row);
    }

    executor.close(ctx)?;

    Ok(results)
}

/// Execute an Insert/Update/Delete plan, returning the affected-row
/// count.
pub fn execute_dml(plan: PhysicalPlan, ctx: &mut ExecutionContext) -> DbResult<u64> {
    match plan {
        PhysicalPlan::Insert {
            table,
            rows,
            policy,
            unique_columns,
        } => dml::execute_insert(&table, rows, policy, &unique_columns, ctx),
        PhysicalPlan::Update {
            table,
            assignments,
            input,
        } => dml::execute_update(&table, &assignments, *input, ctx),
        PhysicalPlan::Delete { table, input } => dml::execute_delete(&table, *input, ctx),
        other => Err(DbError::Exec(format!(
            "not a DML plan: {}",
            planner::explain_physical(&other).lines().next().unwrap_or("?")
        ))),
    }
}
