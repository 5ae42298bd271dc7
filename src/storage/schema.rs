//! The self-describing schema table.
//!
//! `minisql_schema` is rooted at page 0 and records `{type, name, root_page,
//! sql}` for every table including itself. A fresh file gets the table and
//! its self-describing row; an existing file is scanned and every user
//! table is rebuilt by re-parsing its stored CREATE TABLE text.

use super::column::{Column, ColumnKind, OptionalValue, Value};
use super::pager::Pager;
use super::row::Row;
use super::table::Table;
use crate::errors::Error;
use crate::executor::CancelToken;
use crate::sql::parser;
use crate::sql::statement::{
    CmpOp, Condition, Literal, Operand, Statement, WhereClause,
};
use std::collections::HashMap;
use tracing::{info, warn};

pub const SCHEMA_TABLE_NAME: &str = "minisql_schema";
pub const SCHEMA_ROOT_PAGE: u32 = 0;

/// Entry type for regular tables; indexes would get their own value.
const ENTRY_TYPE_TABLE: i32 = 1;

const SCHEMA_SQL: &str = "CREATE TABLE minisql_schema (type INT4 NOT NULL, \
                          name VARCHAR(255) NOT NULL, root_page INT4, sql VARCHAR(2056));";

/// The fixed definition of the schema table itself.
pub fn schema_table() -> Table {
    let columns = vec![
        Column::new("type", ColumnKind::Int4).not_null(),
        Column::new("name", ColumnKind::Varchar(255)).not_null(),
        Column::new("root_page", ColumnKind::Int4),
        Column::new("sql", ColumnKind::Varchar(2056)),
    ];
    let row_size = super::encoding::row_size(&columns);
    Table {
        name: SCHEMA_TABLE_NAME.to_string(),
        columns,
        root_page: SCHEMA_ROOT_PAGE,
        row_size,
    }
}

/// Creates or loads the schema table and returns the full table map,
/// schema table included.
pub fn bootstrap(pager: &mut Pager) -> Result<HashMap<String, Table>, Error> {
    let schema = schema_table();
    let mut tables = HashMap::new();

    if pager.total_pages() == 0 {
        let page = pager.get_page(SCHEMA_ROOT_PAGE, schema.cell_value_size())?;
        page.lock()?.set_root(true);
        schema.insert(
            pager,
            schema_row(ENTRY_TYPE_TABLE, SCHEMA_TABLE_NAME, Some(0), SCHEMA_SQL),
        )?;
        pager.flush(SCHEMA_ROOT_PAGE)?;
        info!("Initialized a fresh database.");
    } else {
        for entry in read_entries(pager, &schema)? {
            if entry.name == SCHEMA_TABLE_NAME {
                continue;
            }
            let root_page = match entry.root_page {
                Some(root_page) => root_page,
                None => {
                    warn!(table = %entry.name, "Schema row has no root page; skipping.");
                    continue;
                }
            };
            let table = table_from_sql(&entry.name, &entry.sql, root_page as u32)?;
            tables.insert(entry.name, table);
        }
        info!(tables = tables.len(), "Loaded schema.");
    }

    tables.insert(SCHEMA_TABLE_NAME.to_string(), schema);
    Ok(tables)
}

/// Registers a new table with a NULL root page; the root index is filled in
/// by [`set_root_page`] once the physical page exists.
pub fn record_table(pager: &mut Pager, name: &str, sql: &str) -> Result<(), Error> {
    let schema = schema_table();
    schema.insert(pager, schema_row(ENTRY_TYPE_TABLE, name, None, sql))?;
    Ok(())
}

/// Second step of table creation: stores the allocated root page index.
pub fn set_root_page(pager: &mut Pager, name: &str, root_page: u32) -> Result<(), Error> {
    let schema = schema_table();
    let affected = schema.update(
        pager,
        &[(
            "root_page".to_string(),
            Literal::Integer(root_page as i64),
        )],
        Some(&name_clause(name)),
        &CancelToken::new(),
    )?;
    if affected != 1 {
        return Err(err!(
            Storage,
            "Schema row for '{}' updated {} times.",
            name,
            affected
        ));
    }
    Ok(())
}

/// Drops the schema row of a table. Its pages stay orphaned in the file.
pub fn remove_table(pager: &mut Pager, name: &str) -> Result<(), Error> {
    let schema = schema_table();
    schema.delete(pager, Some(&name_clause(name)), &CancelToken::new())?;
    Ok(())
}

struct SchemaEntry {
    name: String,
    root_page: Option<i32>,
    sql: String,
}

fn read_entries(pager: &mut Pager, schema: &Table) -> Result<Vec<SchemaEntry>, Error> {
    let result = schema.select(pager, None, None, None, CancelToken::new())?;
    let rows: Vec<Row> = result.rows.collect::<Result<_, _>>()?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let name = match row.value(1).value() {
            Some(Value::Varchar(s)) => s.clone(),
            other => {
                return Err(err!(Corruption, "Schema row has a bad name: {:?}.", other));
            }
        };
        let root_page = match row.value(2).value() {
            Some(Value::Int4(v)) => Some(*v),
            None => None,
            other => {
                return Err(err!(Corruption, "Schema row has a bad root page: {:?}.", other));
            }
        };
        let sql = match row.value(3).value() {
            Some(Value::Varchar(s)) => s.clone(),
            other => {
                return Err(err!(Corruption, "Schema row has bad SQL: {:?}.", other));
            }
        };
        entries.push(SchemaEntry {
            name,
            root_page,
            sql,
        });
    }
    Ok(entries)
}

/// Rebuilds a table from its stored CREATE TABLE text.
fn table_from_sql(name: &str, sql: &str, root_page: u32) -> Result<Table, Error> {
    let cmd = parser::parse(sql)
        .map_err(|e| err!(Corruption, "Stored SQL for '{}' does not parse: {}", name, e))?;
    match cmd.statement {
        Statement::CreateTable(stmt) => Table::new(name, stmt.columns, root_page),
        _ => Err(err!(
            Corruption,
            "Stored SQL for '{}' is not a CREATE TABLE statement.",
            name
        )),
    }
}

fn schema_row(type_: i32, name: &str, root_page: Option<i32>, sql: &str) -> Row {
    Row::new(vec![
        OptionalValue::some(Value::Int4(type_)),
        OptionalValue::some(Value::Varchar(name.to_string())),
        match root_page {
            Some(idx) => OptionalValue::some(Value::Int4(idx)),
            None => OptionalValue::null(),
        },
        OptionalValue::some(Value::Varchar(sql.to_string())),
    ])
}

fn name_clause(name: &str) -> WhereClause {
    WhereClause {
        or_groups: vec![vec![Condition {
            left: Operand::Field("name".to_string()),
            op: CmpOp::Eq,
            right: Operand::Literal(Literal::Str(name.to_string())),
        }]],
    }
}
