//! Process-wide database state: one file, one pager, a map of tables.

use crate::errors::Error;
use crate::storage::column::Column;
use crate::storage::encoding;
use crate::storage::pager::Pager;
use crate::storage::schema::{self, SCHEMA_TABLE_NAME};
use crate::storage::table::Table;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

pub struct Database {
    pub name: String,
    pager: Pager,
    tables: HashMap<String, Table>,
}

impl Database {
    /// Opens (or creates) the database file and bootstraps the schema
    /// table.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let mut pager = Pager::open(path)?;
        let tables = schema::bootstrap(&mut pager)?;
        info!(name = %name, tables = tables.len() - 1, "Opened database.");
        Ok(Database {
            name,
            pager,
            tables,
        })
    }

    /// Flushes every cached page to the file.
    pub fn flush(&mut self) -> Result<(), Error> {
        info!(name = %self.name, "Flushing database...");
        self.pager.flush_all()
    }

    pub fn close(&mut self) {
        if let Err(e) = self.flush() {
            warn!(name = %self.name, "Failed to flush the database: {}", e);
        }
    }

    pub fn table(&self, name: &str) -> Result<&Table, Error> {
        self.tables
            .get(name)
            .ok_or_else(|| err!(NotFound, "Table '{}' doesn't exist.", name))
    }

    /// Looks a table up and hands out the pager alongside it, so callers
    /// can run table operations without fighting the borrow of the map.
    pub fn table_and_pager(&mut self, name: &str) -> Result<(&Table, &mut Pager), Error> {
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| err!(NotFound, "Table '{}' doesn't exist.", name))?;
        Ok((table, &mut self.pager))
    }

    /// User tables, sorted; the schema table is not listed.
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .keys()
            .filter(|name| name.as_str() != SCHEMA_TABLE_NAME)
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Creates a table. The schema row is inserted first with a NULL root
    /// page; the root index is recorded once the page exists, since the
    /// schema insert itself may shuffle pages around.
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<Column>,
        sql: &str,
    ) -> Result<(), Error> {
        if self.tables.contains_key(name) {
            return Err(err!(Conflict, "Table '{}' already exists.", name));
        }
        Table::validate_columns(&columns)?;

        schema::record_table(&mut self.pager, name, sql)?;
        let root_page = self.pager.unused_page_idx();
        let page = self
            .pager
            .get_page(root_page, encoding::cell_value_size(&columns))?;
        page.lock()?.set_root(true);
        schema::set_root_page(&mut self.pager, name, root_page)?;

        let table = Table::new(name, columns, root_page)?;
        info!(table = %name, root_page, "Created table.");
        self.tables.insert(name.to_string(), table);
        Ok(())
    }

    /// Drops a table from the catalog; its pages stay orphaned in the file.
    pub fn drop_table(&mut self, name: &str) -> Result<(), Error> {
        if name == SCHEMA_TABLE_NAME {
            return Err(err!(Validation, "The schema table cannot be dropped."));
        }
        if self.tables.remove(name).is_none() {
            return Err(err!(NotFound, "Table '{}' doesn't exist.", name));
        }
        schema::remove_table(&mut self.pager, name)?;
        info!(table = %name, "Dropped table.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::CancelToken;
    use crate::storage::column::{ColumnKind, OptionalValue, Value};
    use crate::storage::row::Row;
    use tempfile::tempdir;

    fn user_columns() -> Vec<Column> {
        vec![
            Column::new("id", ColumnKind::Int8),
            Column::new("email", ColumnKind::Varchar(255)),
        ]
    }

    #[test]
    fn create_insert_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");

        {
            let mut db = Database::open(&path).unwrap();
            db.create_table("foo", user_columns(), "CREATE TABLE foo (id INT8, email VARCHAR(255));")
                .unwrap();
            let (table, pager) = db.table_and_pager("foo").unwrap();
            table
                .insert(
                    pager,
                    Row::new(vec![
                        OptionalValue::some(Value::Int8(1)),
                        OptionalValue::some(Value::Varchar("a@x".into())),
                    ]),
                )
                .unwrap();
            db.close();
        }

        let mut db = Database::open(&path).unwrap();
        assert_eq!(db.list_tables(), vec!["foo"]);
        let (table, pager) = db.table_and_pager("foo").unwrap();
        let rows: Vec<Row> = table
            .select(pager, None, None, None, CancelToken::new())
            .unwrap()
            .rows
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value(1), &OptionalValue::some(Value::Varchar("a@x".into())));
    }

    #[test]
    fn duplicate_table_names_conflict() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("db")).unwrap();
        db.create_table("foo", user_columns(), "CREATE TABLE foo (id INT8, email VARCHAR(255));")
            .unwrap();
        assert!(matches!(
            db.create_table("foo", user_columns(), "CREATE TABLE foo (id INT8, email VARCHAR(255));"),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn dropping_tables_updates_the_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");

        {
            let mut db = Database::open(&path).unwrap();
            db.create_table("foo", user_columns(), "CREATE TABLE foo (id INT8, email VARCHAR(255));")
                .unwrap();
            db.create_table("bar", user_columns(), "CREATE TABLE bar (id INT8, email VARCHAR(255));")
                .unwrap();
            db.drop_table("foo").unwrap();
            assert!(matches!(db.drop_table("foo"), Err(Error::NotFound(_))));
            assert!(matches!(
                db.drop_table(SCHEMA_TABLE_NAME),
                Err(Error::Validation(_))
            ));
            db.close();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_tables(), vec!["bar"]);
    }
}
