//! Declarative query descriptions.
//!
//! The query builder surface lives outside the core; callers hand the
//! engine one of the four fully-formed shapes defined here. Every
//! description is validated against the schema before planning.

mod validate;


pub use validate::validate;

use common::Row;
use expr::{ColumnRef, Predicate};
use serde::{Deserialize, Serialize};
use std::fmt;
use types::Value;

/// Sort direction for an order-by spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

/// One order-by key; multiple keys apply lexicographically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(column: ColumnRef) -> Self {
        Self {
            column,
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: ColumnRef) -> Self {
        Self {
            column,
            direction: Direction::Desc,
        }
    }
}

/// Reduction functions available in projections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    Min,
    Max,
    Sum,
    Avg,
    Count,
    Stddev,
    /// Collection form: one row per distinct value, not a scalar.
    Distinct,
}

impl AggregateFn {
    pub fn name(self) -> &'static str {
        match self {
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
            AggregateFn::Count => "count",
            AggregateFn::Stddev => "stddev",
            AggregateFn::Distinct => "distinct",
        }
    }

    /// True for the reductions that only accept numeric columns.
    pub fn requires_numeric(self) -> bool {
        matches!(self, AggregateFn::Sum | AggregateFn::Avg | AggregateFn::Stddev)
    }
}

/// An aggregator applied to a column (or to `*` for COUNT), optionally
/// over the distinct multiset of its values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateCall {
    pub func: AggregateFn,
    /// `None` only for `count(*)`.
    pub column: Option<ColumnRef>,
    pub distinct: bool,
}

impl AggregateCall {
    pub fn new(func: AggregateFn, column: ColumnRef) -> Self {
        Self {
            func,
            column: Some(column),
            distinct: false,
        }
    }

    pub fn over_distinct(func: AggregateFn, column: ColumnRef) -> Self {
        Self {
            func,
            column: Some(column),
            distinct: true,
        }
    }

    pub fn count_star() -> Self {
        Self {
            func: AggregateFn::Count,
            column: None,
            distinct: false,
        }
    }

    /// Name of the computed output column, e.g. `min(maxSalary)` or
    /// `count(distinct maxSalary)`.
    pub fn output_name(&self) -> String {
        match &self.column {
            None => format!("{}(*)", self.func.name()),
            Some(col) if self.distinct => {
                format!("{}(distinct {})", self.func.name(), col.column)
            }
            Some(col) => format!("{}({})", self.func.name(), col.column),
        }
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.output_name())
    }
}

/// One projected output: a plain column or an aggregator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Column(ColumnRef),
    Aggregate(AggregateCall),
}

/// Explicit inner join against one more table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinClause {
    pub table: String,
    pub on: Predicate,
}

/// Declarative select over one or more tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    pub from: Vec<String>,
    /// Empty means every column of every table in scope.
    pub columns: Vec<Projection>,
    pub predicate: Option<Predicate>,
    pub joins: Vec<JoinClause>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

impl SelectQuery {
    pub fn new(from: Vec<String>) -> Self {
        Self {
            from,
            columns: Vec::new(),
            predicate: None,
            joins: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            skip: None,
        }
    }

    /// All tables in scope: the from list plus joined tables.
    pub fn scope(&self) -> Vec<&str> {
        self.from
            .iter()
            .map(String::as_str)
            .chain(self.joins.iter().map(|j| j.table.as_str()))
            .collect()
    }

    /// The scalar aggregate calls in the projection.
    pub fn aggregate_calls(&self) -> Vec<&AggregateCall> {
        self.columns
            .iter()
            .filter_map(|p| match p {
                Projection::Aggregate(call) if call.func != AggregateFn::Distinct => Some(call),
                _ => None,
            })
            .collect()
    }

    /// The collection-form `distinct(col)` projection, if present.
    pub fn distinct_projection(&self) -> Option<&AggregateCall> {
        self.columns.iter().find_map(|p| match p {
            Projection::Aggregate(call) if call.func == AggregateFn::Distinct => Some(call),
            _ => None,
        })
    }

    /// The plain projected columns.
    pub fn plain_columns(&self) -> Vec<&ColumnRef> {
        self.columns
            .iter()
            .filter_map(|p| match p {
                Projection::Column(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}

/// What to do when an inserted row collides on identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// Fail the statement without writing anything.
    Error,
    /// Overwrite the stored row.
    Replace,
}

/// Insert a batch of rows into one table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsertQuery {
    pub table: String,
    pub rows: Vec<Row>,
    pub policy: ConflictPolicy,
}

/// A single `column = value` assignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Value,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: Value) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// Update matching rows of one table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateQuery {
    pub table: String,
    pub assignments: Vec<Assignment>,
    pub predicate: Option<Predicate>,
}

/// Delete matching rows of one table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeleteQuery {
    pub table: String,
    pub predicate: Option<Predicate>,
}

/// The four query shapes the engine accepts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum QueryDescription {
    Select(SelectQuery),
    Insert(InsertQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
}
