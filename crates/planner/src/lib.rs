//! Query planner: compiles query descriptions into executable plans.
//!
//! The planner is the two-stage compiler at the heart of the engine:
//!
//! 1. **Logical planning** - builds a relational-algebra tree from the
//!    query description, independent of execution strategy
//! 2. **Rewriting** - predicate push-down, join inference, projection
//!    push-down and constant folding, applied to fixpoint
//! 3. **Physical planning** - binds strategy: join algorithm choice,
//!    skip/limit fusion, scan-level column narrowing
//!
//! # Architecture
//!
//! ```text
//! QueryDescription
//!     ↓ validate
//! LogicalPlan (TableAccess, Select, Project, CrossProduct, Join, ...)
//!     ↓ rewrite rules (to fixpoint)
//! LogicalPlan (joins inferred, predicates and projections pushed)
//!     ↓ lower
//! PhysicalPlan (TableScan, Filter, HashJoin, Sort, bounded take, ...)
//!     ↓
//! Executor
//! ```
//!
//! # Example
//!
//! ```no_run
//! use common::Config;
//! use planner::Planner;
//! use query::{QueryDescription, SelectQuery};
//! use schema::Schema;
//!
//! let schema: Schema = Schema::builder().finish();
//! let query = QueryDescription::Select(SelectQuery::new(vec!["Jobs".into()]));
//! let plan = Planner::plan(&query, &schema, &Config::default()).unwrap();
//! ```

mod logical;
mod physical;
mod rewrite;


pub use logical::{LogicalPlan, build_logical};
pub use physical::{PhysicalPlan, lower};
pub use rewrite::rewrite;

use common::{Config, DbResult};
use query::QueryDescription;
use schema::Schema;

/// Main planner entry point.
pub struct Planner;

impl Planner {
    /// Compile a query description into an optimized physical plan.
    ///
    /// Pure: no storage access happens here. Validation failures and
    /// planning failures surface before any execution.
    pub fn plan(
        query: &QueryDescription,
        schema: &Schema,
        config: &Config,
    ) -> DbResult<PhysicalPlan> {
        query::validate(query, schema)?;
        let plan = build_logical(query);
        let plan = rewrite(plan, schema, config);
        lower(plan, schema, config)
    }
}

/// Pretty-print a logical plan for debugging.
pub fn explain_logical(p: &LogicalPlan) -> String {
    match p {
        LogicalPlan::TableAccess { table } => format!("TableAccess table={table}"),
        LogicalPlan::Select { input, predicate } => {
            format!("Select [{predicate}]\n  {}", indent(&explain_logical(input)))
        }
        LogicalPlan::Project {
            input,
            columns,
            aggregates,
        } => {
            let cols: Vec<String> = columns
                .iter()
                .map(|c| c.to_string())
                .chain(aggregates.iter().map(|a| a.to_string()))
                .collect();
            format!(
                "Project cols=[{}]\n  {}",
                cols.join(", "),
                indent(&explain_logical(input))
            )
        }
        LogicalPlan::CrossProduct { left, right } => format!(
            "CrossProduct\n  left: {}\n  right: {}",
            indent(&explain_logical(left)),
            indent(&explain_logical(right))
        ),
        LogicalPlan::Join {
            left,
            right,
            predicate,
        } => format!(
            "Join on={predicate}\n  left: {}\n  right: {}",
            indent(&explain_logical(left)),
            indent(&explain_logical(right))
        ),
        LogicalPlan::OrderBy { input, keys } => {
            let keys: Vec<String> = keys
                .iter()
                .map(|k| format!("{} {:?}", k.column, k.direction))
                .collect();
            format!(
                "OrderBy [{}]\n  {}",
                keys.join(", "),
                indent(&explain_logical(input))
            )
        }
        LogicalPlan::Skip { input, count } => {
            format!("Skip {count}\n  {}", indent(&explain_logical(input)))
        }
        LogicalPlan::Limit { input, count } => {
            format!("Limit {count}\n  {}", indent(&explain_logical(input)))
        }
        LogicalPlan::Aggregate {
            input,
            calls,
            collapse,
        } => {
            let calls: Vec<String> = calls.iter().map(|c| c.to_string()).collect();
            format!(
                "Aggregate [{}] collapse={collapse}\n  {}",
                calls.join(", "),
                indent(&explain_logical(input))
            )
        }
        LogicalPlan::Distinct { input, column } => {
            format!("Distinct {column}\n  {}", indent(&explain_logical(input)))
        }
        LogicalPlan::Insert { table, rows, .. } => {
            format!("Insert table={table} rows={}", rows.len())
        }
        LogicalPlan::Update {
            table,
            assignments,
            input,
        } => format!(
            "Update table={table} assigns={}\n  {}",
            assignments.len(),
            indent(&explain_logical(input))
        ),
        LogicalPlan::Delete { table, input } => {
            format!("Delete table={table}\n  {}", indent(&explain_logical(input)))
        }
    }
}

/// Pretty-print a physical plan for debugging.
pub fn explain_physical(p: &PhysicalPlan) -> String {
    match p {
        PhysicalPlan::TableScan { table, columns } => match columns {
            Some(cols) => format!("TableScan table={table} cols=[{}]", cols.join(", ")),
            None => format!("TableScan table={table}"),
        },
        PhysicalPlan::Filter { input, predicate } => {
            format!("Filter [{predicate}]\n  {}", indent(&explain_physical(input)))
        }
        PhysicalPlan::Project {
            input,
            columns,
            aggregates,
        } => {
            let cols: Vec<String> = columns
                .iter()
                .map(|c| c.to_string())
                .chain(aggregates.iter().map(|a| a.to_string()))
                .collect();
            format!(
                "Project cols=[{}]\n  {}",
                cols.join(", "),
                indent(&explain_physical(input))
            )
        }
        PhysicalPlan::NestedLoopJoin {
            left,
            right,
            predicate,
        } => {
            let on = match predicate {
                Some(p) => format!(" on={p}"),
                None => String::new(),
            };
            format!(
                "NestedLoopJoin{on}\n  left: {}\n  right: {}",
                indent(&explain_physical(left)),
                indent(&explain_physical(right))
            )
        }
        PhysicalPlan::HashJoin {
            left,
            right,
            left_key,
            right_key,
        } => format!(
            "HashJoin {left_key} = {right_key}\n  left: {}\n  right: {}",
            indent(&explain_physical(left)),
            indent(&explain_physical(right))
        ),
        PhysicalPlan::Sort { input, keys } => {
            let keys: Vec<String> = keys
                .iter()
                .map(|k| format!("{} {:?}", k.column, k.direction))
                .collect();
            format!(
                "Sort [{}]\n  {}",
                keys.join(", "),
                indent(&explain_physical(input))
            )
        }
        PhysicalPlan::Limit { input, skip, limit } => format!(
            "Limit skip={skip} limit={limit:?}\n  {}",
            indent(&explain_physical(input))
        ),
        PhysicalPlan::Aggregate {
            input,
            calls,
            collapse,
            ..
        } => {
            let calls: Vec<String> = calls.iter().map(|c| c.to_string()).collect();
            format!(
                "Aggregate [{}] collapse={collapse}\n  {}",
                calls.join(", "),
                indent(&explain_physical(input))
            )
        }
        PhysicalPlan::Distinct { input, column } => {
            format!("Distinct {column}\n  {}", indent(&explain_physical(input)))
        }
        PhysicalPlan::Insert { table, rows, .. } => {
            format!("Insert table={table} rows={}", rows.len())
        }
        PhysicalPlan::Update {
            table,
            assignments,
            input,
        } => format!(
            "Update table={table} assigns={}\n  {}",
            assignments.len(),
            indent(&explain_physical(input))
        ),
        PhysicalPlan::Delete { table, input } => {
            format!("Delete table={table}\n  {}", indent(&explain_physical(input)))
        }
    }
}

fn indent(s: &str) -> String {
    s.lines()
        .map(|l| format!("  {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}
