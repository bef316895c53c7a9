//! Builder: constructs operator trees from physical plans.

use crate::{
    aggregate::AggregateExec,
    distinct::DistinctExec,
    filter::FilterExec,
    join::{HashJoinExec, NestedLoopJoinExec},
    limit::LimitExec,
    project::ProjectExec,
    scan::TableScanExec,
    sort::SortExec,
    Executor,
};
use common::{DbError, DbResult};
use planner::PhysicalPlan;

/// Build an operator tree for a row-producing plan, wiring up child
/// inputs recursively.
///
/// # Errors
///
/// `DbError::Exec` for DML nodes — those run through `execute_dml`.
pub fn build_executor(plan: PhysicalPlan) -> DbResult<Box<dyn Executor>> {
    match plan {
        PhysicalPlan::TableScan { table, columns } => {
            Ok(Box::new(TableScanExec::new(table, columns)))
        }

        PhysicalPlan::Filter { input, predicate } => {
            let child = build_executor(*input)?;
            Ok(Box::new(FilterExec::new(child, predicate)))
        }

        PhysicalPlan::Project {
            input,
            columns,
            aggregates,
        } => {
            let child = build_executor(*input)?;
            Ok(Box::new(ProjectExec::new(child, columns, aggregates)))
        }

        PhysicalPlan::NestedLoopJoin {
            left,
            right,
            predicate,
        } => {
            let left = build_executor(*left)?;
            let right = build_executor(*right)?;
            Ok(Box::new(NestedLoopJoinExec::new(left, right, predicate)))
        }

        PhysicalPlan::HashJoin {
            left,
            right,
            left_key,
            right_key,
        } => Ok(Box::new(
            HashJoinExec::builder()
                .left(build_executor(*left)?)
                .right(build_executor(*right)?)
                .left_key(left_key)
                .right_key(right_key)
                .build(),
        )),

        PhysicalPlan::Sort { input, keys } => {
            let child = build_executor(*input)?;
            Ok(Box::new(SortExec::new(child, keys)))
        }

        PhysicalPlan::Limit { input, skip, limit } => {
            let child = build_executor(*input)?;
            Ok(Box::new(LimitExec::new(child, skip, limit)))
        }

        PhysicalPlan::Aggregate {
            input,
            calls,
            collapse,
            anchor,
        } => {
            let child = build_executor(*input)?;
            Ok(Box::new(AggregateExec::new(child, calls, collapse, anchor)))
        }

        PhysicalPlan::Distinct { input, column } => {
            let child = build_executor(*input)?;
            Ok(Box::new(DistinctExec::new(child, column)))
        }

        PhysicalPlan::Insert { .. } | PhysicalPlan::Update { .. } | PhysicalPlan::Delete { .. } => {
            Err(DbError::Exec(
                "write statements execute through execute_dml".into(),
            ))
        }
    }
}
