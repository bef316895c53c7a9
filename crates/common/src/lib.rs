
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use types::Value;

/// Hash map flavour shared across the workspace.
pub type Map<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// Identity of a row within its table: a non-negative integer,
/// unique per table.
///
/// Examples:
/// - `let first = RowId(0);`
/// - `let imported = RowId(41_217);`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(pub u64);

/// A stored row: identity plus a payload addressable by column name.
///
/// The payload holds, for every column of the owning table's schema,
/// either a value of the declared type or `Value::Null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    values: Map<String, Value>,
}

impl Row {
    pub fn new(id: RowId, values: Map<String, Value>) -> Self {
        Self { id, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, S>(id: RowId, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Self {
            id,
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}

/// One table's contribution to a row flowing through the plan:
/// the backing row identity plus the (possibly narrowed) column map.
#[derive(Clone, Debug, PartialEq)]
pub struct RowSlice {
    pub row_id: RowId,
    pub values: Map<String, Value>,
}

impl RowSlice {
    pub fn new(row_id: RowId, values: Map<String, Value>) -> Self {
        Self { row_id, values }
    }

    pub fn from_row(row: &Row) -> Self {
        Self {
            row_id: row.id,
            values: row.values.clone(),
        }
    }
}

/// A result row produced by a plan operator: one `RowSlice` per source
/// table in scope, keyed by table name.
///
/// Single-table queries are flattened by the engine façade; joins keep
/// the composite shape so callers can tell which table a column came
/// from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationRow {
    slices: Map<String, RowSlice>,
}

impl RelationRow {
    /// A relation row covering a single table.
    pub fn single(table: impl Into<String>, slice: RowSlice) -> Self {
        let mut slices = Map::default();
        slices.insert(table.into(), slice);
        Self { slices }
    }

    pub fn slice(&self, table: &str) -> Option<&RowSlice> {
        self.slices.get(table)
    }

    pub fn slice_mut(&mut self, table: &str) -> Option<&mut RowSlice> {
        self.slices.get_mut(table)
    }

    pub fn insert_slice(&mut self, table: impl Into<String>, slice: RowSlice) {
        self.slices.insert(table.into(), slice);
    }

    pub fn remove_slice(&mut self, table: &str) -> Option<RowSlice> {
        self.slices.remove(table)
    }

    /// Column lookup across the composite: `None` when the table is not
    /// in scope or the column was projected away.
    pub fn value(&self, table: &str, column: &str) -> Option<&Value> {
        self.slices.get(table).and_then(|s| s.values.get(column))
    }

    pub fn tables(&self) -> impl Iterator<Item = &String> {
        self.slices.keys()
    }

    pub fn table_count(&self) -> usize {
        self.slices.len()
    }

    pub fn slices(&self) -> &Map<String, RowSlice> {
        &self.slices
    }

    pub fn into_slices(self) -> Map<String, RowSlice> {
        self.slices
    }

    /// Merge the slices of `other` into `self` (cross-product join of
    /// two disjoint scopes).
    pub fn merged(mut self, other: RelationRow) -> Self {
        for (table, slice) in other.slices {
            self.slices.insert(table, slice);
        }
        self
    }
}

/// Canonical error type shared across engine subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("plan: {0}")]
    Plan(String),
    #[error("exec: {0}")]
    Exec(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("query cancelled")]
    Cancelled,
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Cooperative cancellation flag, checked at every storage touch.
///
/// # Example
/// ```
/// use common::CancelToken;
///
/// let token = CancelToken::new();
/// assert!(!token.is_cancelled());
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Planner configuration.
///
/// Every toggle is consumed by the planner: rewrite rules can be
/// switched off individually when chasing a plan-shape bug.
///
/// # Example
/// ```
/// use common::Config;
///
/// let config = Config::builder()
///     .hash_join_enabled(false)
///     .predicate_pushdown(true)
///     .build();
/// assert!(!config.hash_join_enabled);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Lower single-equality joins to hash joins; nested loop otherwise.
    #[builder(default = true)]
    pub hash_join_enabled: bool,
    /// Split conjunctions and push selections below joins.
    #[builder(default = true)]
    pub predicate_pushdown: bool,
    /// Insert narrowing projections above table access nodes.
    #[builder(default = true)]
    pub projection_pushdown: bool,
    /// Fold constant boolean structure in predicates.
    #[builder(default = true)]
    pub constant_folding: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hash_join_enabled: true,
            predicate_pushdown: true,
            projection_pushdown: true,
            constant_folding: true,
        }
    }
}

/// Execution statistics collected by each operator.
///
/// # Examples
/// ```
/// use common::ExecutionStats;
/// use std::time::Duration;
///
/// let stats = ExecutionStats {
///     open_time: Duration::from_millis(5),
///     total_next_time: Duration::from_millis(150),
///     close_time: Duration::from_millis(2),
///     rows_produced: 1000,
///     rows_filtered: 500,
///     rows_scanned: 1500,
/// };
/// assert_eq!(stats.total_time().as_millis(), 157);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ExecutionStats {
    /// Time spent in open()
    pub open_time: Duration,
    /// Cumulative time spent across all next() calls
    pub total_next_time: Duration,
    /// Time spent in close()
    pub close_time: Duration,
    /// Number of rows returned by this operator
    pub rows_produced: u64,
    /// Number of rows rejected (filter and join operators)
    pub rows_filtered: u64,
    /// Number of rows read from storage (scan operator)
    pub rows_scanned: u64,
}

impl ExecutionStats {
    /// Total execution time (open + next + close).
    pub fn total_time(&self) -> Duration {
        self.open_time + self.total_next_time + self.close_time
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{
        CancelToken, Config, DbError, DbResult, ExecutionStats, Map, RelationRow, Row, RowId,
        RowSlice,
    };
    pub use types::{Value, ValueType};
}
