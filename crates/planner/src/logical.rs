//! Logical plan: a relational-algebra tree independent of execution
//! strategy. Built per query kind, then handed to the rewrite rules.

use common::Row;
use expr::{ColumnRef, Predicate};
use query::{
    AggregateCall, Assignment, ConflictPolicy, OrderBy, QueryDescription, SelectQuery,
};
use std::collections::BTreeSet;

/// Logical plan node. A node owns its children (0, 1 or 2); the tree
/// has exactly one root.
#[derive(Clone, Debug, PartialEq)]
pub enum LogicalPlan {
    TableAccess {
        table: String,
    },
    Select {
        input: Box<LogicalPlan>,
        predicate: Predicate,
    },
    Project {
        input: Box<LogicalPlan>,
        columns: Vec<ColumnRef>,
        aggregates: Vec<AggregateCall>,
    },
    CrossProduct {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
    },
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        predicate: Predicate,
    },
    OrderBy {
        input: Box<LogicalPlan>,
        keys: Vec<OrderBy>,
    },
    Skip {
        input: Box<LogicalPlan>,
        count: u64,
    },
    Limit {
        input: Box<LogicalPlan>,
        count: u64,
    },
    Aggregate {
        input: Box<LogicalPlan>,
        calls: Vec<AggregateCall>,
        /// True when the projection is aggregate-only: the operator
        /// emits one row instead of annotating every input row.
        collapse: bool,
    },
    Distinct {
        input: Box<LogicalPlan>,
        column: ColumnRef,
    },
    Insert {
        table: String,
        rows: Vec<Row>,
        policy: ConflictPolicy,
    },
    Update {
        table: String,
        assignments: Vec<Assignment>,
        input: Box<LogicalPlan>,
    },
    Delete {
        table: String,
        input: Box<LogicalPlan>,
    },
}

impl LogicalPlan {
    /// Tables contributing rows to this subtree.
    pub fn tables(&self) -> BTreeSet<String> {
        match self {
            LogicalPlan::TableAccess { table } => [table.clone()].into(),
            LogicalPlan::Select { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::OrderBy { input, .. }
            | LogicalPlan::Skip { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Distinct { input, .. } => input.tables(),
            LogicalPlan::CrossProduct { left, right }
            | LogicalPlan::Join { left, right, .. } => {
                let mut tables = left.tables();
                tables.extend(right.tables());
                tables
            }
            LogicalPlan::Insert { table, .. }
            | LogicalPlan::Update { table, .. }
            | LogicalPlan::Delete { table, .. } => [table.clone()].into(),
        }
    }
}

/// Build the initial logical tree for a validated query description.
pub fn build_logical(query: &QueryDescription) -> LogicalPlan {
    match query {
        QueryDescription::Select(q) => build_select(q),
        QueryDescription::Insert(q) => LogicalPlan::Insert {
            table: q.table.clone(),
            rows: q.rows.clone(),
            policy: q.policy,
        },
        QueryDescription::Update(q) => LogicalPlan::Update {
            table: q.table.clone(),
            assignments: q.assignments.clone(),
            input: Box::new(filtered_access(&q.table, q.predicate.clone())),
        },
        QueryDescription::Delete(q) => LogicalPlan::Delete {
            table: q.table.clone(),
            input: Box::new(filtered_access(&q.table, q.predicate.clone())),
        },
    }
}

/// `Select(pred) ← TableAccess`, degenerating to a bare access when no
/// predicate is given.
fn filtered_access(table: &str, predicate: Option<Predicate>) -> LogicalPlan {
    let access = LogicalPlan::TableAccess {
        table: table.into(),
    };
    match predicate {
        Some(predicate) => LogicalPlan::Select {
            input: Box::new(access),
            predicate,
        },
        None => access,
    }
}

fn build_select(q: &SelectQuery) -> LogicalPlan {
    // Left-deep cross products over the from list.
    let mut plan = LogicalPlan::TableAccess {
        table: q.from[0].clone(),
    };
    for table in &q.from[1..] {
        plan = LogicalPlan::CrossProduct {
            left: Box::new(plan),
            right: Box::new(LogicalPlan::TableAccess {
                table: table.clone(),
            }),
        };
    }

    // Explicit inner joins become Join nodes; their predicate does not
    // reappear in the top-level Select.
    for join in &q.joins {
        plan = LogicalPlan::Join {
            left: Box::new(plan),
            right: Box::new(LogicalPlan::TableAccess {
                table: join.table.clone(),
            }),
            predicate: join.on.clone(),
        };
    }

    if let Some(predicate) = &q.predicate {
        plan = LogicalPlan::Select {
            input: Box::new(plan),
            predicate: predicate.clone(),
        };
    }

    if let Some(distinct) = q.distinct_projection() {
        plan = LogicalPlan::Distinct {
            input: Box::new(plan),
            column: distinct
                .column
                .clone()
                .expect("validated distinct projection carries a column"),
        };
    }

    let aggregates: Vec<AggregateCall> =
        q.aggregate_calls().into_iter().cloned().collect();
    let plain: Vec<ColumnRef> = q.plain_columns().into_iter().cloned().collect();
    if !aggregates.is_empty() {
        plan = LogicalPlan::Aggregate {
            input: Box::new(plan),
            calls: aggregates.clone(),
            collapse: plain.is_empty(),
        };
    }

    // Explicit projection; an empty column list selects everything.
    if !q.columns.is_empty() {
        let columns = if let Some(distinct) = q.distinct_projection() {
            vec![distinct.column.clone().expect("validated")]
        } else {
            plain
        };
        plan = LogicalPlan::Project {
            input: Box::new(plan),
            columns,
            aggregates,
        };
    }

    if !q.order_by.is_empty() {
        plan = LogicalPlan::OrderBy {
            input: Box::new(plan),
            keys: q.order_by.clone(),
        };
    }
    if let Some(skip) = q.skip {
        plan = LogicalPlan::Skip {
            input: Box::new(plan),
            count: skip,
        };
    }
    if let Some(limit) = q.limit {
        plan = LogicalPlan::Limit {
            input: Box::new(plan),
            count: limit,
        };
    }

    plan
}
