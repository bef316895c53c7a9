//! Physical plan: the logical tree with strategy bound — join
//! algorithm choice, skip/limit fusion, scan-level column narrowing.

use crate::LogicalPlan;
use common::{Config, DbError, DbResult, Row};
use expr::{ColumnRef, Predicate};
use query::{AggregateCall, Assignment, ConflictPolicy, OrderBy};
use schema::Schema;
use std::collections::BTreeSet;

/// Physical plan node, one per logical variant. Each row-producing
/// node maps to a Volcano operator in the executor.
#[derive(Clone, Debug, PartialEq)]
pub enum PhysicalPlan {
    TableScan {
        table: String,
        /// `Some` when a pushed-down projection narrowed the scan.
        columns: Option<Vec<String>>,
    },
    Filter {
        input: Box<PhysicalPlan>,
        predicate: Predicate,
    },
    Project {
        input: Box<PhysicalPlan>,
        columns: Vec<ColumnRef>,
        /// Computed aggregate outputs the projection keeps.
        aggregates: Vec<AggregateCall>,
    },
    /// General join; a `None` predicate is a plain cross product.
    NestedLoopJoin {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        predicate: Option<Predicate>,
    },
    /// Single-equality join; the smaller side builds the hash table at
    /// runtime.
    HashJoin {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        left_key: ColumnRef,
        right_key: ColumnRef,
    },
    Sort {
        input: Box<PhysicalPlan>,
        keys: Vec<OrderBy>,
    },
    /// Fused bounded take: drop `skip` rows, then emit up to `limit`.
    Limit {
        input: Box<PhysicalPlan>,
        skip: u64,
        limit: Option<u64>,
    },
    Aggregate {
        input: Box<PhysicalPlan>,
        calls: Vec<AggregateCall>,
        collapse: bool,
        /// Table slice that carries computed values with no column of
        /// their own (`count(*)`).
        anchor: String,
    },
    Distinct {
        input: Box<PhysicalPlan>,
        column: ColumnRef,
    },
    Insert {
        table: String,
        rows: Vec<Row>,
        policy: ConflictPolicy,
        /// Bound from the schema so the operator enforces uniqueness
        /// without a schema handle.
        unique_columns: Vec<String>,
    },
    Update {
        table: String,
        assignments: Vec<Assignment>,
        input: Box<PhysicalPlan>,
    },
    Delete {
        table: String,
        input: Box<PhysicalPlan>,
    },
}

impl PhysicalPlan {
    /// Tables visible in this plan's output. Drives the flat-versus-
    /// composite result shape at the façade.
    pub fn scope(&self) -> BTreeSet<String> {
        match self {
            PhysicalPlan::TableScan { table, .. } => [table.clone()].into(),
            // A projection narrows columns, never the join scope: a
            // query over two tables stays two-table-shaped no matter
            // which columns survive.
            PhysicalPlan::Filter { input, .. }
            | PhysicalPlan::Sort { input, .. }
            | PhysicalPlan::Limit { input, .. }
            | PhysicalPlan::Aggregate { input, .. }
            | PhysicalPlan::Distinct { input, .. }
            | PhysicalPlan::Project { input, .. } => input.scope(),
            PhysicalPlan::NestedLoopJoin { left, right, .. }
            | PhysicalPlan::HashJoin { left, right, .. } => {
                let mut tables = left.scope();
                tables.extend(right.scope());
                tables
            }
            PhysicalPlan::Insert { table, .. }
            | PhysicalPlan::Update { table, .. }
            | PhysicalPlan::Delete { table, .. } => [table.clone()].into(),
        }
    }

    /// True for the write statements executed through the DML path.
    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            PhysicalPlan::Insert { .. }
                | PhysicalPlan::Update { .. }
                | PhysicalPlan::Delete { .. }
        )
    }
}

/// Lower a rewritten logical plan to a physical plan.
pub fn lower(plan: LogicalPlan, schema: &Schema, config: &Config) -> DbResult<PhysicalPlan> {
    match plan {
        LogicalPlan::TableAccess { table } => Ok(PhysicalPlan::TableScan {
            table,
            columns: None,
        }),
        LogicalPlan::Project {
            input,
            columns,
            aggregates,
        } => {
            // A narrowing projection directly above its scan fuses into
            // the scan itself.
            if aggregates.is_empty() {
                if let LogicalPlan::TableAccess { table } = &*input {
                    if columns.iter().all(|c| &c.table == table) {
                        return Ok(PhysicalPlan::TableScan {
                            table: table.clone(),
                            columns: Some(
                                columns.into_iter().map(|c| c.column).collect(),
                            ),
                        });
                    }
                }
            }
            Ok(PhysicalPlan::Project {
                input: Box::new(lower(*input, schema, config)?),
                columns,
                aggregates,
            })
        }
        LogicalPlan::Select { input, predicate } => Ok(PhysicalPlan::Filter {
            input: Box::new(lower(*input, schema, config)?),
            predicate,
        }),
        LogicalPlan::CrossProduct { left, right } => Ok(PhysicalPlan::NestedLoopJoin {
            left: Box::new(lower(*left, schema, config)?),
            right: Box::new(lower(*right, schema, config)?),
            predicate: None,
        }),
        LogicalPlan::Join {
            left,
            right,
            predicate,
        } => {
            let left = lower(*left, schema, config)?;
            let right = lower(*right, schema, config)?;
            if config.hash_join_enabled {
                if let Some((a, b)) = predicate.as_join_pair() {
                    let (left_key, right_key) = if left.scope().contains(&a.table) {
                        (a.clone(), b.clone())
                    } else {
                        (b.clone(), a.clone())
                    };
                    return Ok(PhysicalPlan::HashJoin {
                        left: Box::new(left),
                        right: Box::new(right),
                        left_key,
                        right_key,
                    });
                }
            }
            Ok(PhysicalPlan::NestedLoopJoin {
                left: Box::new(left),
                right: Box::new(right),
                predicate: Some(predicate),
            })
        }
        LogicalPlan::OrderBy { input, keys } => Ok(PhysicalPlan::Sort {
            input: Box::new(lower(*input, schema, config)?),
            keys,
        }),
        LogicalPlan::Limit { input, count } => match *input {
            // Adjacent skip fuses into a single bounded take.
            LogicalPlan::Skip {
                input: inner,
                count: skip,
            } => Ok(PhysicalPlan::Limit {
                input: Box::new(lower(*inner, schema, config)?),
                skip,
                limit: Some(count),
            }),
            other => Ok(PhysicalPlan::Limit {
                input: Box::new(lower(other, schema, config)?),
                skip: 0,
                limit: Some(count),
            }),
        },
        LogicalPlan::Skip { input, count } => Ok(PhysicalPlan::Limit {
            input: Box::new(lower(*input, schema, config)?),
            skip: count,
            limit: None,
        }),
        LogicalPlan::Aggregate {
            input,
            calls,
            collapse,
        } => {
            let anchor = input
                .tables()
                .into_iter()
                .next()
                .ok_or_else(|| DbError::Plan("aggregate over empty scope".into()))?;
            Ok(PhysicalPlan::Aggregate {
                input: Box::new(lower(*input, schema, config)?),
                calls,
                collapse,
                anchor,
            })
        }
        LogicalPlan::Distinct { input, column } => Ok(PhysicalPlan::Distinct {
            input: Box::new(lower(*input, schema, config)?),
            column,
        }),
        LogicalPlan::Insert {
            table,
            rows,
            policy,
        } => {
            let unique_columns = schema
                .table(&table)
                .map_err(|e| DbError::Plan(format!("{e}")))?
                .unique_columns();
            Ok(PhysicalPlan::Insert {
                table,
                rows,
                policy,
                unique_columns,
            })
        }
        LogicalPlan::Update {
            table,
            assignments,
            input,
        } => Ok(PhysicalPlan::Update {
            table,
            assignments,
            input: Box::new(lower(*input, schema, config)?),
        }),
        LogicalPlan::Delete { table, input } => Ok(PhysicalPlan::Delete {
            table,
            input: Box::new(lower(*input, schema, config)?),
        }),
    }
}
