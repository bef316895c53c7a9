//! In-memory row storage.
//!
//! [`Table`] is the storage capability the engine depends on; any
//! implementation honoring its contract can back query execution.
//! [`MemoryTable`] is the id-keyed map the engine ships with, and
//! [`StorageSet`] holds one table per registered schema table.


use common::{DbError, DbResult, Map, Row, RowId};

/// Storage capability consumed by the executor.
///
/// Operations report success or failure; failures are storage-level,
/// never user errors.
pub trait Table {
    /// With empty `ids`, a snapshot of all stored rows in unspecified
    /// order; otherwise exactly the rows whose identity is listed,
    /// silently skipping absent ids.
    fn get(&self, ids: &[RowId]) -> DbResult<Vec<Row>>;

    /// Upsert each row by identity, atomically for the whole call.
    fn put(&mut self, rows: Vec<Row>) -> DbResult<()>;

    /// With empty `ids`, or with as many ids as there are rows, clear
    /// the table; otherwise remove exactly the listed ids, skipping
    /// absent ones. The "empty means all" rule is a deliberate
    /// convention of this interface.
    fn remove(&mut self, ids: &[RowId]) -> DbResult<()>;

    /// Number of rows currently stored.
    fn row_count(&self) -> usize;
}

/// The engine's default storage: an identity-keyed association from
/// row id to row. Created empty at table registration, destroyed with
/// the storage set.
#[derive(Clone, Debug, Default)]
pub struct MemoryTable {
    rows: Map<RowId, Row>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Table for MemoryTable {
    fn get(&self, ids: &[RowId]) -> DbResult<Vec<Row>> {
        if ids.is_empty() {
            return Ok(self.rows.values().cloned().collect());
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.rows.get(id).cloned())
            .collect())
    }

    fn put(&mut self, rows: Vec<Row>) -> DbResult<()> {
        for row in rows {
            self.rows.insert(row.id, row);
        }
        Ok(())
    }

    fn remove(&mut self, ids: &[RowId]) -> DbResult<()> {
        if ids.is_empty() || ids.len() == self.rows.len() {
            self.rows.clear();
            return Ok(());
        }
        for id in ids {
            self.rows.remove(id);
        }
        Ok(())
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// One [`MemoryTable`] per registered table, keyed by table name.
#[derive(Debug, Default)]
pub struct StorageSet {
    tables: Map<String, MemoryTable>,
}

impl StorageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table under `name`.
    pub fn register(&mut self, name: impl Into<String>) -> DbResult<()> {
        let name = name.into();
        if self.tables.contains_key(&name) {
            return Err(DbError::Storage(format!(
                "table '{name}' already registered"
            )));
        }
        self.tables.insert(name, MemoryTable::new());
        Ok(())
    }

    pub fn table(&self, name: &str) -> DbResult<&MemoryTable> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::Storage(format!("no storage for table '{name}'")))
    }

    pub fn table_mut(&mut self, name: &str) -> DbResult<&mut MemoryTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::Storage(format!("no storage for table '{name}'")))
    }
}
