//! Rewrite rules over the logical plan, applied to fixpoint:
//!
//! 1. predicate push-down (conjunction splitting + sinking below
//!    cross products and joins)
//! 2. join inference (equi-selects above cross products become joins)
//! 3. projection push-down (narrowing projections above table access)
//! 4. constant folding in predicates
//!
//! Rule 1 runs before rule 2 inside the fixpoint loop so join
//! predicates surface as standalone selects before being lifted.
//! Rule 3 runs once over the stabilized tree; re-running it would
//! re-wrap the scans it already narrowed.

use crate::LogicalPlan;
use common::Config;
use expr::{ColumnRef, Predicate};
use schema::Schema;
use std::collections::{BTreeMap, BTreeSet};

/// Apply all enabled rewrite rules.
pub fn rewrite(plan: LogicalPlan, schema: &Schema, config: &Config) -> LogicalPlan {
    let mut plan = plan;
    loop {
        let mut next = plan.clone();
        if config.predicate_pushdown {
            next = push_predicates(next);
        }
        next = infer_joins(next);
        if next == plan {
            break;
        }
        plan = next;
    }
    if config.projection_pushdown {
        plan = push_projections(plan, schema);
    }
    if config.constant_folding {
        plan = fold_constants(plan);
    }
    plan
}

/// Rule 1: split conjunctions and sink single-side selects below
/// cross products and joins. One level per pass; the fixpoint loop
/// drives predicates as deep as they can go.
fn push_predicates(plan: LogicalPlan) -> LogicalPlan {
    use LogicalPlan::*;
    match plan {
        Select { input, predicate } => {
            let input = push_predicates(*input);
            if let Predicate::And(children) = predicate {
                let mut plan = input;
                for pred in children {
                    plan = Select {
                        input: Box::new(plan),
                        predicate: pred,
                    };
                }
                return plan;
            }
            sink(input, predicate)
        }
        Project {
            input,
            columns,
            aggregates,
        } => Project {
            input: Box::new(push_predicates(*input)),
            columns,
            aggregates,
        },
        OrderBy { input, keys } => OrderBy {
            input: Box::new(push_predicates(*input)),
            keys,
        },
        Skip { input, count } => Skip {
            input: Box::new(push_predicates(*input)),
            count,
        },
        Limit { input, count } => Limit {
            input: Box::new(push_predicates(*input)),
            count,
        },
        Aggregate {
            input,
            calls,
            collapse,
        } => Aggregate {
            input: Box::new(push_predicates(*input)),
            calls,
            collapse,
        },
        Distinct { input, column } => Distinct {
            input: Box::new(push_predicates(*input)),
            column,
        },
        CrossProduct { left, right } => CrossProduct {
            left: Box::new(push_predicates(*left)),
            right: Box::new(push_predicates(*right)),
        },
        Join {
            left,
            right,
            predicate,
        } => Join {
            left: Box::new(push_predicates(*left)),
            right: Box::new(push_predicates(*right)),
            predicate,
        },
        Update {
            table,
            assignments,
            input,
        } => Update {
            table,
            assignments,
            input: Box::new(push_predicates(*input)),
        },
        Delete { table, input } => Delete {
            table,
            input: Box::new(push_predicates(*input)),
        },
        TableAccess { .. } | Insert { .. } => plan,
    }
}

/// Whether `predicate` can eventually move below `input`: some cross
/// product or join under the select chain has a side covering all of
/// the predicate's tables.
fn can_sink(input: &LogicalPlan, predicate: &Predicate) -> bool {
    use LogicalPlan::*;
    match input {
        CrossProduct { left, right } | Join { left, right, .. } => {
            let tables = predicate.tables();
            tables.is_subset(&left.tables()) || tables.is_subset(&right.tables())
        }
        Select { input, .. } => can_sink(input, predicate),
        _ => false,
    }
}

fn sink(input: LogicalPlan, predicate: Predicate) -> LogicalPlan {
    use LogicalPlan::*;
    if !can_sink(&input, &predicate) {
        return Select {
            input: Box::new(input),
            predicate,
        };
    }
    match input {
        CrossProduct { left, right } => {
            let tables = predicate.tables();
            if tables.is_subset(&left.tables()) {
                CrossProduct {
                    left: Box::new(Select {
                        input: left,
                        predicate,
                    }),
                    right,
                }
            } else {
                CrossProduct {
                    left,
                    right: Box::new(Select {
                        input: right,
                        predicate,
                    }),
                }
            }
        }
        Join {
            left,
            right,
            predicate: on,
        } => {
            let tables = predicate.tables();
            if tables.is_subset(&left.tables()) {
                Join {
                    left: Box::new(Select {
                        input: left,
                        predicate,
                    }),
                    right,
                    predicate: on,
                }
            } else {
                Join {
                    left,
                    right: Box::new(Select {
                        input: right,
                        predicate,
                    }),
                    predicate: on,
                }
            }
        }
        // Commute past a stuck select so the sinkable predicate keeps
        // moving toward its cross product.
        Select {
            input: inner,
            predicate: stuck,
        } => Select {
            input: Box::new(sink(*inner, predicate)),
            predicate: stuck,
        },
        other => Select {
            input: Box::new(other),
            predicate,
        },
    }
}

/// Rule 2: a `colA = colB` select immediately above a cross product,
/// with the columns on opposite sides, becomes a join.
fn infer_joins(plan: LogicalPlan) -> LogicalPlan {
    use LogicalPlan::*;
    match plan {
        Select { input, predicate } => {
            let input = infer_joins(*input);
            if let CrossProduct { left, right } = input {
                let straddles = match predicate.as_join_pair() {
                    Some((a, b)) => {
                        let lt = left.tables();
                        let rt = right.tables();
                        (lt.contains(&a.table) && rt.contains(&b.table))
                            || (lt.contains(&b.table) && rt.contains(&a.table))
                    }
                    None => false,
                };
                if straddles {
                    return Join {
                        left,
                        right,
                        predicate,
                    };
                }
                return Select {
                    input: Box::new(CrossProduct { left, right }),
                    predicate,
                };
            }
            Select {
                input: Box::new(input),
                predicate,
            }
        }
        Project {
            input,
            columns,
            aggregates,
        } => Project {
            input: Box::new(infer_joins(*input)),
            columns,
            aggregates,
        },
        OrderBy { input, keys } => OrderBy {
            input: Box::new(infer_joins(*input)),
            keys,
        },
        Skip { input, count } => Skip {
            input: Box::new(infer_joins(*input)),
            count,
        },
        Limit { input, count } => Limit {
            input: Box::new(infer_joins(*input)),
            count,
        },
        Aggregate {
            input,
            calls,
            collapse,
        } => Aggregate {
            input: Box::new(infer_joins(*input)),
            calls,
            collapse,
        },
        Distinct { input, column } => Distinct {
            input: Box::new(infer_joins(*input)),
            column,
        },
        CrossProduct { left, right } => CrossProduct {
            left: Box::new(infer_joins(*left)),
            right: Box::new(infer_joins(*right)),
        },
        Join {
            left,
            right,
            predicate,
        } => Join {
            left: Box::new(infer_joins(*left)),
            right: Box::new(infer_joins(*right)),
            predicate,
        },
        Update {
            table,
            assignments,
            input,
        } => Update {
            table,
            assignments,
            input: Box::new(infer_joins(*input)),
        },
        Delete { table, input } => Delete {
            table,
            input: Box::new(infer_joins(*input)),
        },
        TableAccess { .. } | Insert { .. } => plan,
    }
}

/// Rule 3: insert narrowing projections directly above each table
/// access, keeping every column any ancestor still needs. Only applies
/// to select pipelines with an explicit projection; write pipelines
/// must read full rows back.
fn push_projections(plan: LogicalPlan, schema: &Schema) -> LogicalPlan {
    if !has_explicit_project(&plan) {
        return plan;
    }
    let mut needed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    collect_needed(&plan, &mut needed);
    narrow(plan, &needed, schema)
}

fn has_explicit_project(plan: &LogicalPlan) -> bool {
    use LogicalPlan::*;
    match plan {
        Project { .. } => true,
        OrderBy { input, .. } | Skip { input, .. } | Limit { input, .. } => {
            has_explicit_project(input)
        }
        _ => false,
    }
}

fn note(needed: &mut BTreeMap<String, BTreeSet<String>>, column: &ColumnRef) {
    needed
        .entry(column.table.clone())
        .or_default()
        .insert(column.column.clone());
}

fn collect_needed(plan: &LogicalPlan, needed: &mut BTreeMap<String, BTreeSet<String>>) {
    use LogicalPlan::*;
    match plan {
        Select { input, predicate } => {
            for column in predicate.columns() {
                note(needed, &column);
            }
            collect_needed(input, needed);
        }
        Join {
            left,
            right,
            predicate,
        } => {
            for column in predicate.columns() {
                note(needed, &column);
            }
            collect_needed(left, needed);
            collect_needed(right, needed);
        }
        Project {
            input,
            columns,
            aggregates,
        } => {
            for column in columns {
                note(needed, column);
            }
            for call in aggregates {
                if let Some(column) = &call.column {
                    note(needed, column);
                }
            }
            collect_needed(input, needed);
        }
        OrderBy { input, keys } => {
            for key in keys {
                note(needed, &key.column);
            }
            collect_needed(input, needed);
        }
        Aggregate { input, calls, .. } => {
            for call in calls {
                if let Some(column) = &call.column {
                    note(needed, column);
                }
            }
            collect_needed(input, needed);
        }
        Distinct { input, column } => {
            note(needed, column);
            collect_needed(input, needed);
        }
        Skip { input, .. } | Limit { input, .. } => collect_needed(input, needed),
        CrossProduct { left, right } => {
            collect_needed(left, needed);
            collect_needed(right, needed);
        }
        Update { input, .. } | Delete { input, .. } => collect_needed(input, needed),
        TableAccess { .. } | Insert { .. } => {}
    }
}

fn narrow(
    plan: LogicalPlan,
    needed: &BTreeMap<String, BTreeSet<String>>,
    schema: &Schema,
) -> LogicalPlan {
    use LogicalPlan::*;
    match plan {
        TableAccess { table } => {
            let kept = needed.get(&table).cloned().unwrap_or_default();
            let declared = schema
                .table(&table)
                .map(|t| t.columns().len())
                .unwrap_or(kept.len());
            if kept.len() < declared {
                Project {
                    columns: kept
                        .into_iter()
                        .map(|column| ColumnRef::new(table.clone(), column))
                        .collect(),
                    aggregates: Vec::new(),
                    input: Box::new(TableAccess { table }),
                }
            } else {
                TableAccess { table }
            }
        }
        Select { input, predicate } => Select {
            input: Box::new(narrow(*input, needed, schema)),
            predicate,
        },
        Project {
            input,
            columns,
            aggregates,
        } => Project {
            input: Box::new(narrow(*input, needed, schema)),
            columns,
            aggregates,
        },
        OrderBy { input, keys } => OrderBy {
            input: Box::new(narrow(*input, needed, schema)),
            keys,
        },
        Skip { input, count } => Skip {
            input: Box::new(narrow(*input, needed, schema)),
            count,
        },
        Limit { input, count } => Limit {
            input: Box::new(narrow(*input, needed, schema)),
            count,
        },
        Aggregate {
            input,
            calls,
            collapse,
        } => Aggregate {
            input: Box::new(narrow(*input, needed, schema)),
            calls,
            collapse,
        },
        Distinct { input, column } => Distinct {
            input: Box::new(narrow(*input, needed, schema)),
            column,
        },
        CrossProduct { left, right } => CrossProduct {
            left: Box::new(narrow(*left, needed, schema)),
            right: Box::new(narrow(*right, needed, schema)),
        },
        Join {
            left,
            right,
            predicate,
        } => Join {
            left: Box::new(narrow(*left, needed, schema)),
            right: Box::new(narrow(*right, needed, schema)),
            predicate,
        },
        other @ (Insert { .. } | Update { .. } | Delete { .. }) => other,
    }
}

/// Rule 4: boolean simplification. `Select(true)` drops entirely;
/// `Select(false)` stays and produces the empty relation.
fn fold_constants(plan: LogicalPlan) -> LogicalPlan {
    use LogicalPlan::*;
    match plan {
        Select { input, predicate } => {
            let input = fold_constants(*input);
            match fold_predicate(predicate) {
                Predicate::Literal(true) => input,
                predicate => Select {
                    input: Box::new(input),
                    predicate,
                },
            }
        }
        Join {
            left,
            right,
            predicate,
        } => Join {
            left: Box::new(fold_constants(*left)),
            right: Box::new(fold_constants(*right)),
            predicate: fold_predicate(predicate),
        },
        Project {
            input,
            columns,
            aggregates,
        } => Project {
            input: Box::new(fold_constants(*input)),
            columns,
            aggregates,
        },
        OrderBy { input, keys } => OrderBy {
            input: Box::new(fold_constants(*input)),
            keys,
        },
        Skip { input, count } => Skip {
            input: Box::new(fold_constants(*input)),
            count,
        },
        Limit { input, count } => Limit {
            input: Box::new(fold_constants(*input)),
            count,
        },
        Aggregate {
            input,
            calls,
            collapse,
        } => Aggregate {
            input: Box::new(fold_constants(*input)),
            calls,
            collapse,
        },
        Distinct { input, column } => Distinct {
            input: Box::new(fold_constants(*input)),
            column,
        },
        CrossProduct { left, right } => CrossProduct {
            left: Box::new(fold_constants(*left)),
            right: Box::new(fold_constants(*right)),
        },
        Update {
            table,
            assignments,
            input,
        } => Update {
            table,
            assignments,
            input: Box::new(fold_constants(*input)),
        },
        Delete { table, input } => Delete {
            table,
            input: Box::new(fold_constants(*input)),
        },
        TableAccess { .. } | Insert { .. } => plan,
    }
}

fn fold_predicate(predicate: Predicate) -> Predicate {
    match predicate {
        Predicate::And(children) => {
            let mut kept = Vec::new();
            for child in children {
                match fold_predicate(child) {
                    Predicate::Literal(true) => {}
                    Predicate::Literal(false) => return Predicate::Literal(false),
                    other => kept.push(other),
                }
            }
            match kept.len() {
                0 => Predicate::Literal(true),
                1 => kept.pop().expect("one element"),
                _ => Predicate::And(kept),
            }
        }
        Predicate::Or(children) => {
            let mut kept = Vec::new();
            for child in children {
                match fold_predicate(child) {
                    Predicate::Literal(false) => {}
                    Predicate::Literal(true) => return Predicate::Literal(true),
                    other => kept.push(other),
                }
            }
            match kept.len() {
                0 => Predicate::Literal(false),
                1 => kept.pop().expect("one element"),
                _ => Predicate::Or(kept),
            }
        }
        Predicate::Not(inner) => match fold_predicate(*inner) {
            Predicate::Literal(b) => Predicate::Literal(!b),
            other => Predicate::Not(Box::new(other)),
        },
        leaf => leaf,
    }
}
