//! Query engine façade.
//!
//! Ties the pipeline together: a [`QueryEngine`] owns the schema and
//! planner configuration, compiles query descriptions into physical
//! plans (`plan`, pure) and runs them against a storage set
//! (`execute`). Select results are shaped per the projection rules:
//! single-table scope flattens to one column map per row, multi-table
//! scope keeps the per-table composite.

use common::{DbResult, Map};
use planner::{PhysicalPlan, Planner};
use query::QueryDescription;
use schema::Schema;
use store::StorageSet;
use types::Value;

pub use common::{CancelToken, Config};
pub use executor::{execute_dml, execute_query, ExecutionContext};

/// One result row of a select.
///
/// The flat/composite distinction is observable: whoever consumes the
/// result can tell a single-table row from a join row.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputRow {
    /// Single-table scope: column name to value.
    Flat(Map<String, Value>),
    /// Multi-table scope: table name to that table's column map.
    Composite(Map<String, Map<String, Value>>),
}

impl OutputRow {
    /// Column lookup on a flat row.
    pub fn get(&self, column: &str) -> Option<&Value> {
        match self {
            OutputRow::Flat(values) => values.get(column),
            OutputRow::Composite(_) => None,
        }
    }

    /// Column lookup on a composite row.
    pub fn get_in(&self, table: &str, column: &str) -> Option<&Value> {
        match self {
            OutputRow::Flat(_) => None,
            OutputRow::Composite(tables) => tables.get(table).and_then(|m| m.get(column)),
        }
    }

    /// Number of columns across the whole row.
    pub fn width(&self) -> usize {
        match self {
            OutputRow::Flat(values) => values.len(),
            OutputRow::Composite(tables) => tables.values().map(|m| m.len()).sum(),
        }
    }
}

/// Result of executing a plan: rows for selects, an affected-count for
/// writes.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutput {
    Rows(Vec<OutputRow>),
    Affected(u64),
}

impl QueryOutput {
    pub fn rows(&self) -> &[OutputRow] {
        match self {
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Affected(_) => &[],
        }
    }

    pub fn affected(&self) -> u64 {
        match self {
            QueryOutput::Rows(_) => 0,
            QueryOutput::Affected(n) => *n,
        }
    }
}

/// The engine: schema plus planner configuration. Storage lives with
/// the caller and is threaded through [`ExecutionContext`].
pub struct QueryEngine {
    schema: Schema,
    config: Config,
}

impl QueryEngine {
    pub fn new(schema: Schema) -> Self {
        Self::with_config(schema, Config::default())
    }

    pub fn with_config(schema: Schema, config: Config) -> Self {
        Self { schema, config }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// An empty storage set with one memory table per schema table.
    pub fn open_storage(&self) -> StorageSet {
        let mut storage = StorageSet::new();
        for table in self.schema.tables() {
            storage
                .register(table.name.clone())
                .expect("schema tables are unique");
        }
        storage
    }

    /// Compile a query description into a physical plan. Pure: no
    /// storage access.
    pub fn plan(&self, query: &QueryDescription) -> DbResult<PhysicalPlan> {
        Planner::plan(query, &self.schema, &self.config)
    }

    /// Run a plan. The plan is consumed; it never outlives its
    /// execution.
    pub fn execute(
        &self,
        plan: PhysicalPlan,
        ctx: &mut ExecutionContext,
    ) -> DbResult<QueryOutput> {
        if plan.is_dml() {
            return Ok(QueryOutput::Affected(executor::execute_dml(plan, ctx)?));
        }

        let scope = plan.scope();
        let relation = executor::execute_query(plan, ctx)?;

        let rows = if scope.len() <= 1 {
            let table = scope.into_iter().next().unwrap_or_default();
            relation
                .into_iter()
                .map(|row| {
                    let values = row
                        .into_slices()
                        .remove(&table)
                        .map(|slice| slice.values)
                        .unwrap_or_default();
                    OutputRow::Flat(values)
                })
                .collect()
        } else {
            relation
                .into_iter()
                .map(|row| {
                    let tables = row
                        .into_slices()
                        .into_iter()
                        .map(|(table, slice)| (table, slice.values))
                        .collect();
                    OutputRow::Composite(tables)
                })
                .collect()
        };

        Ok(QueryOutput::Rows(rows))
    }
}
