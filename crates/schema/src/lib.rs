//! Read-only schema model: tables, columns, primary keys and
//! cross-table references.
//!
//! Built once through [`SchemaBuilder`] and frozen; the planner and
//! validator resolve every column reference against it.

use common::{DbError, DbResult, Map};
use serde::{Deserialize, Serialize};
use types::ValueType;

/// Describes a logical column within a table schema.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ValueType,
    pub nullable: bool,
    pub unique: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            unique: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Declared link from a column to a column of another table.
/// Metadata only; the engine does not enforce referential integrity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reference {
    pub column: String,
    pub target_table: String,
    pub target_column: String,
}

/// Column layout of one registered table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    columns: Vec<Column>,
    primary_key: String,
    references: Vec<Reference>,
    #[serde(skip)]
    #[serde(default)]
    name_index: Map<String, usize>,
}

impl TableSchema {
    fn new(name: String, columns: Vec<Column>, primary_key: String) -> Self {
        let mut table = Self {
            name,
            columns,
            primary_key,
            references: Vec::new(),
            name_index: Map::default(),
        };
        table.rebuild_index();
        table
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.name_index.get(name).map(|&idx| &self.columns[idx])
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Columns carrying the unique flag, primary key included.
    pub fn unique_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.unique || c.name == self.primary_key)
            .map(|c| c.name.clone())
            .collect()
    }

    fn rebuild_index(&mut self) {
        self.name_index.clear();
        for (idx, column) in self.columns.iter().enumerate() {
            self.name_index.insert(column.name.clone(), idx);
        }
    }
}

/// The full schema: every registered table, read-only after build.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schema {
    tables: Vec<TableSchema>,
    #[serde(skip)]
    #[serde(default)]
    name_index: Map<String, usize>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Returns the table by name.
    pub fn table(&self, name: &str) -> DbResult<&TableSchema> {
        self.name_index
            .get(name)
            .map(|&idx| &self.tables[idx])
            .ok_or_else(|| DbError::Validation(format!("unknown table '{name}'")))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    /// Immutable iterator over all tables.
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    fn rebuild_index(&mut self) {
        self.name_index.clear();
        for (idx, table) in self.tables.iter_mut().enumerate() {
            self.name_index.insert(table.name.clone(), idx);
            table.rebuild_index();
        }
    }
}

/// Staged construction of a [`Schema`].
#[derive(Default, Debug)]
pub struct SchemaBuilder {
    tables: Vec<TableSchema>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table with its columns and primary-key column.
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<Column>,
        primary_key: &str,
    ) -> DbResult<&mut Self> {
        if self.tables.iter().any(|t| t.name == name) {
            return Err(DbError::Validation(format!(
                "table '{name}' already exists"
            )));
        }
        if columns.is_empty() {
            return Err(DbError::Validation(
                "table must contain at least one column".into(),
            ));
        }
        let mut seen = Map::default();
        for column in &columns {
            if seen.insert(column.name.clone(), ()).is_some() {
                return Err(DbError::Validation(format!(
                    "duplicate column '{}' on table '{name}'",
                    column.name
                )));
            }
        }
        let pk = columns
            .iter()
            .find(|c| c.name == primary_key)
            .ok_or_else(|| {
                DbError::Validation(format!(
                    "primary key '{primary_key}' is not a column of '{name}'"
                ))
            })?;
        if pk.nullable {
            return Err(DbError::Validation(format!(
                "primary key '{primary_key}' on '{name}' cannot be nullable"
            )));
        }

        self.tables
            .push(TableSchema::new(name.into(), columns, primary_key.into()));
        Ok(self)
    }

    /// Declare a reference from `table.column` to `target.target_column`.
    /// Both ends must exist and share a declared type.
    pub fn add_reference(
        &mut self,
        table: &str,
        column: &str,
        target_table: &str,
        target_column: &str,
    ) -> DbResult<&mut Self> {
        let target_ty = {
            let target = self
                .tables
                .iter()
                .find(|t| t.name == target_table)
                .ok_or_else(|| {
                    DbError::Validation(format!("unknown table '{target_table}'"))
                })?;
            target
                .column(target_column)
                .ok_or_else(|| {
                    DbError::Validation(format!(
                        "unknown column '{target_column}' on table '{target_table}'"
                    ))
                })?
                .ty
        };

        let table_schema = self
            .tables
            .iter_mut()
            .find(|t| t.name == table)
            .ok_or_else(|| DbError::Validation(format!("unknown table '{table}'")))?;
        let source = table_schema.column(column).ok_or_else(|| {
            DbError::Validation(format!("unknown column '{column}' on table '{table}'"))
        })?;
        if source.ty != target_ty {
            return Err(DbError::Validation(format!(
                "reference {table}.{column} -> {target_table}.{target_column} joins mismatched types"
            )));
        }

        table_schema.references.push(Reference {
            column: column.into(),
            target_table: target_table.into(),
            target_column: target_column.into(),
        });
        Ok(self)
    }

    pub fn finish(mut self) -> Schema {
        let mut schema = Schema {
            tables: std::mem::take(&mut self.tables),
            name_index: Map::default(),
        };
        schema.rebuild_index();
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job_columns() -> Vec<Column> {
        vec![
            Column::new("id", ValueType::Text),
            Column::new("title", ValueType::Text),
            Column::new("minSalary", ValueType::Int),
            Column::new("maxSalary", ValueType::Int).nullable(),
        ]
    }

    #[test]
    fn create_and_lookup_table() {
        let mut builder = Schema::builder();
        builder.create_table("Jobs", job_columns(), "id").unwrap();
        let schema = builder.finish();

        let jobs = schema.table("Jobs").unwrap();
        assert_eq!(jobs.primary_key(), "id");
        assert_eq!(jobs.column("minSalary").unwrap().ty, ValueType::Int);
        assert!(jobs.column("maxSalary").unwrap().nullable);
        assert!(!jobs.has_column("salary"));
        assert!(schema.table("Employees").is_err());
    }

    #[test]
    fn rejects_duplicate_tables() {
        let mut builder = Schema::builder();
        builder.create_table("Jobs", job_columns(), "id").unwrap();
        let err = builder
            .create_table("Jobs", job_columns(), "id")
            .unwrap_err();
        assert!(format!("{err}").contains("already exists"));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let mut builder = Schema::builder();
        let err = builder
            .create_table(
                "bad",
                vec![
                    Column::new("id", ValueType::Int),
                    Column::new("id", ValueType::Int),
                ],
                "id",
            )
            .unwrap_err();
        assert!(format!("{err}").contains("duplicate column"));
    }

    #[test]
    fn primary_key_must_exist_and_be_non_nullable() {
        let mut builder = Schema::builder();
        let err = builder
            .create_table("Jobs", job_columns(), "salary")
            .unwrap_err();
        assert!(format!("{err}").contains("primary key"));

        let err = builder
            .create_table(
                "bad",
                vec![Column::new("id", ValueType::Int).nullable()],
                "id",
            )
            .unwrap_err();
        assert!(format!("{err}").contains("nullable"));
    }

    #[test]
    fn references_are_type_checked() {
        let mut builder = Schema::builder();
        builder.create_table("Jobs", job_columns(), "id").unwrap();
        builder
            .create_table(
                "Employees",
                vec![
                    Column::new("id", ValueType::Text),
                    Column::new("jobId", ValueType::Text),
                    Column::new("salary", ValueType::Int),
                ],
                "id",
            )
            .unwrap();

        builder
            .add_reference("Employees", "jobId", "Jobs", "id")
            .unwrap();
        let err = builder
            .add_reference("Employees", "salary", "Jobs", "id")
            .unwrap_err();
        assert!(format!("{err}").contains("mismatched types"));

        let schema = builder.finish();
        let refs = schema.table("Employees").unwrap().references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target_table, "Jobs");
    }

    #[test]
    fn unique_columns_include_primary_key() {
        let mut builder = Schema::builder();
        builder
            .create_table(
                "Employees",
                vec![
                    Column::new("id", ValueType::Text),
                    Column::new("badge", ValueType::Int).unique(),
                    Column::new("name", ValueType::Text),
                ],
                "id",
            )
            .unwrap();
        let schema = builder.finish();

        let mut uniques = schema.table("Employees").unwrap().unique_columns();
        uniques.sort();
        assert_eq!(uniques, vec!["badge".to_string(), "id".to_string()]);
    }
}
