//! Table façade over one B+Tree.
//!
//! A table owns its column list and root page index and translates between
//! `Statement`-level names and the positional slots the row codec uses.
//! Reads stream through the lazy [`Rows`] pipeline (producer → WHERE filter
//! → limit); UPDATE and DELETE first collect a snapshot of matching keys in
//! ascending order and only then mutate, so tree reshaping never skips or
//! revisits rows.

use super::btree::BTree;
use super::column::{Column, ColumnKind, MAX_COLUMNS, OptionalValue, Value};
use super::cursor::Cursor;
use super::encoding;
use super::node::{max_leaf_cells, PageIdx};
use super::pager::Pager;
use super::row::{coerce_literal, Row};
use crate::errors::Error;
use crate::executor::{row_matches, CancelToken};
use crate::sql::statement::{Literal, WhereClause};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub root_page: PageIdx,
    /// Sum of the declared column sizes (the null map is extra).
    pub row_size: usize,
}

impl Table {
    pub fn new(name: &str, columns: Vec<Column>, root_page: PageIdx) -> Result<Self, Error> {
        Self::validate_columns(&columns)?;
        let row_size = encoding::row_size(&columns);
        Ok(Table {
            name: name.to_string(),
            columns,
            root_page,
            row_size,
        })
    }

    /// Column-set rules shared by CREATE TABLE and the schema reload path.
    pub fn validate_columns(columns: &[Column]) -> Result<(), Error> {
        if columns.is_empty() {
            return Err(err!(Validation, "A table needs at least one column."));
        }
        if columns.len() > MAX_COLUMNS {
            return Err(err!(
                Validation,
                "Table has {} columns, the maximum is {}.",
                columns.len(),
                MAX_COLUMNS
            ));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(err!(Validation, "Duplicate column '{}'.", column.name));
            }
            if column.autoincrement
                && !(column.primary_key && column.kind == ColumnKind::Int8)
            {
                return Err(err!(
                    Validation,
                    "AUTOINCREMENT is only valid for INT8 PRIMARY KEY columns ('{}').",
                    column.name
                ));
            }
        }
        if max_leaf_cells(encoding::cell_value_size(columns)) == 0 {
            return Err(err!(
                Validation,
                "Row of {} bytes does not fit a leaf cell.",
                encoding::row_size(columns)
            ));
        }
        Ok(())
    }

    /// Leaf cell payload size for this table.
    pub fn cell_value_size(&self) -> usize {
        encoding::cell_value_size(&self.columns)
    }

    pub fn tree(&self) -> BTree {
        BTree::new(self.root_page, self.cell_value_size())
    }

    pub fn column_index(&self, name: &str) -> Result<usize, Error> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| err!(Validation, "Unknown column '{}'.", name))
    }

    /// Inserts one row under the next free key (`max_key + 1`, starting at
    /// 0 on a fresh table). Returns the assigned key.
    pub fn insert(&self, pager: &mut Pager, mut row: Row) -> Result<u64, Error> {
        let tree = self.tree();
        let key = match tree.seek_max_key(pager)? {
            Some(max_key) => max_key + 1,
            None => 0,
        };

        // An omitted AUTOINCREMENT column is materialized with the key.
        if let Some(idx) = self
            .columns
            .iter()
            .position(|c| c.autoincrement)
        {
            if row.values[idx].is_null() {
                row.values[idx] = OptionalValue::some(Value::Int8(key as i64));
            }
        }

        row.validate(&self.columns)?;
        let payload = encoding::encode_row(&self.columns, &row)?;
        tree.insert(pager, key, payload)?;
        debug!(table = %self.name, key, "Inserted row.");
        Ok(key)
    }

    /// Streaming read pipeline. Rows come back in ascending key order.
    pub fn select<'a>(
        &'a self,
        pager: &'a mut Pager,
        projection: Option<Vec<usize>>,
        filter: Option<&'a WhereClause>,
        limit: Option<usize>,
        cancel: CancelToken,
    ) -> Result<StatementResult<'a>, Error> {
        let columns = match &projection {
            Some(indices) => indices.iter().map(|&i| self.columns[i].clone()).collect(),
            None => self.columns.clone(),
        };
        let cursor = self.tree().seek_first(pager)?;
        Ok(StatementResult {
            columns,
            rows_affected: 0,
            rows: Rows {
                table: self,
                pager,
                cursor,
                filter,
                projection,
                remaining: limit,
                cancel,
            },
        })
    }

    /// Applies `SET` pairs to every matching row. Snapshots first, then
    /// seeks each key again and overwrites the payload in place.
    pub fn update(
        &self,
        pager: &mut Pager,
        sets: &[(String, Literal)],
        filter: Option<&WhereClause>,
        cancel: &CancelToken,
    ) -> Result<usize, Error> {
        let mut set_indices = Vec::with_capacity(sets.len());
        for (name, literal) in sets {
            let idx = self.column_index(name)?;
            set_indices.push((idx, coerce_literal(literal, &self.columns[idx])?));
        }

        let snapshot = self.collect_matches(pager, filter, cancel)?;
        let tree = self.tree();
        let mut affected = 0;
        for (key, mut row) in snapshot {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            for (idx, value) in &set_indices {
                row.values[*idx] = value.clone();
            }
            row.validate(&self.columns)?;
            let payload = encoding::encode_row(&self.columns, &row)?;

            let (cursor, found) = tree.seek(pager, key)?;
            if !found {
                return Err(err!(Storage, "Snapshotted key {} vanished mid-update.", key));
            }
            cursor.overwrite_value(pager, &payload)?;
            affected += 1;
        }
        debug!(table = %self.name, affected, "Updated rows.");
        Ok(affected)
    }

    /// Deletes every matching row: snapshot the keys, then delete one by
    /// one.
    pub fn delete(
        &self,
        pager: &mut Pager,
        filter: Option<&WhereClause>,
        cancel: &CancelToken,
    ) -> Result<usize, Error> {
        let snapshot = self.collect_matches(pager, filter, cancel)?;
        let tree = self.tree();
        let mut affected = 0;
        for (key, _) in snapshot {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if tree.delete(pager, key)? {
                affected += 1;
            }
        }
        debug!(table = %self.name, affected, "Deleted rows.");
        Ok(affected)
    }

    /// One pass over the leaf chain collecting `(key, row)` for every row
    /// the filter accepts, in ascending key order.
    fn collect_matches(
        &self,
        pager: &mut Pager,
        filter: Option<&WhereClause>,
        cancel: &CancelToken,
    ) -> Result<Vec<(u64, Row)>, Error> {
        let mut matches = Vec::new();
        let mut cursor = self.tree().seek_first(pager)?;
        while !cursor.end_of_table {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let key = cursor.key(pager)?;
            let row = encoding::decode_row(&self.columns, &cursor.value(pager)?)?;
            let accepted = match filter {
                Some(clause) => row_matches(clause, &self.columns, &row)?,
                None => true,
            };
            if accepted {
                matches.push((key, row));
            }
            cursor.advance(pager)?;
        }
        Ok(matches)
    }
}

/// Result of a table operation: the visible column set and a lazy,
/// single-pass sequence of rows.
pub struct StatementResult<'a> {
    pub columns: Vec<Column>,
    pub rows: Rows<'a>,
    pub rows_affected: usize,
}

/// Producer → filter → limit pipeline over the leaf chain. Yields one row
/// per call and is not restartable.
pub struct Rows<'a> {
    table: &'a Table,
    pager: &'a mut Pager,
    cursor: Cursor,
    filter: Option<&'a WhereClause>,
    projection: Option<Vec<usize>>,
    remaining: Option<usize>,
    cancel: CancelToken,
}

impl Rows<'_> {
    fn produce(&mut self) -> Result<Option<Row>, Error> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if self.cursor.end_of_table {
                return Ok(None);
            }
            if let Some(0) = self.remaining {
                return Ok(None);
            }

            let payload = self.cursor.value(self.pager)?;
            let row = encoding::decode_row(&self.table.columns, &payload)?;
            self.cursor.advance(self.pager)?;

            let accepted = match self.filter {
                Some(clause) => row_matches(clause, &self.table.columns, &row)?,
                None => true,
            };
            if !accepted {
                continue;
            }

            if let Some(remaining) = &mut self.remaining {
                *remaining -= 1;
            }
            let row = match &self.projection {
                Some(indices) => Row::new(
                    indices.iter().map(|&i| row.values[i].clone()).collect(),
                ),
                None => row,
            };
            return Ok(Some(row));
        }
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<Row, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.produce().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::statement::{CmpOp, Condition, Operand};
    use tempfile::tempdir;

    fn test_table(pager: &mut Pager) -> Table {
        let columns = vec![
            Column::new("id", ColumnKind::Int8),
            Column::new("email", ColumnKind::Varchar(255)),
            Column::new("age", ColumnKind::Int4),
        ];
        let root = pager.unused_page_idx();
        let page = pager.get_page(root, encoding::cell_value_size(&columns)).unwrap();
        page.lock().unwrap().set_root(true);
        Table::new("foo", columns, root).unwrap()
    }

    fn insert_person(table: &Table, pager: &mut Pager, id: i64, email: &str, age: i32) -> u64 {
        let row = Row::new(vec![
            OptionalValue::some(Value::Int8(id)),
            OptionalValue::some(Value::Varchar(email.to_string())),
            OptionalValue::some(Value::Int4(age)),
        ]);
        table.insert(pager, row).unwrap()
    }

    fn where_eq(field: &str, literal: Literal) -> WhereClause {
        WhereClause {
            or_groups: vec![vec![Condition {
                left: Operand::Field(field.to_string()),
                op: CmpOp::Eq,
                right: Operand::Literal(literal),
            }]],
        }
    }

    fn drain(result: StatementResult<'_>) -> Vec<Row> {
        result.rows.collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn keys_continue_from_the_max() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let table = test_table(&mut pager);

        assert_eq!(insert_person(&table, &mut pager, 1, "a@x", 30), 0);
        assert_eq!(insert_person(&table, &mut pager, 2, "b@x", 40), 1);

        let clause = where_eq("id", Literal::Integer(2));
        table
            .delete(&mut pager, Some(&clause), &CancelToken::new())
            .unwrap();
        assert_eq!(insert_person(&table, &mut pager, 3, "c@x", 50), 1);
    }

    #[test]
    fn select_streams_in_key_order() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let table = test_table(&mut pager);

        for i in 0..38 {
            insert_person(&table, &mut pager, i, &format!("u{}@x", i), 20 + i as i32);
        }

        let result = table
            .select(&mut pager, None, None, None, CancelToken::new())
            .unwrap();
        let rows = drain(result);
        assert_eq!(rows.len(), 38);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.value(0), &OptionalValue::some(Value::Int8(i as i64)));
        }
    }

    #[test]
    fn update_changes_only_matching_rows() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let table = test_table(&mut pager);

        for i in 0..38 {
            insert_person(&table, &mut pager, i, &format!("u{}@x", i), 20 + i as i32);
        }

        let clause = where_eq("id", Literal::Integer(5));
        let affected = table
            .update(
                &mut pager,
                &[("email".to_string(), Literal::Str("u@x".into()))],
                Some(&clause),
                &CancelToken::new(),
            )
            .unwrap();
        assert_eq!(affected, 1);

        let result = table
            .select(&mut pager, None, None, None, CancelToken::new())
            .unwrap();
        let rows = drain(result);
        assert_eq!(rows.len(), 38);
        for row in &rows {
            let id = match row.value(0).value().unwrap() {
                Value::Int8(v) => *v,
                other => panic!("unexpected id {:?}", other),
            };
            let email = match row.value(1).value().unwrap() {
                Value::Varchar(s) => s.clone(),
                other => panic!("unexpected email {:?}", other),
            };
            if id == 5 {
                assert_eq!(email, "u@x");
            } else {
                assert_eq!(email, format!("u{}@x", id));
            }
        }
    }

    #[test]
    fn delete_without_filter_empties_the_table() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let table = test_table(&mut pager);

        for i in 0..20 {
            insert_person(&table, &mut pager, i, "x@x", 30);
        }
        let affected = table
            .delete(&mut pager, None, &CancelToken::new())
            .unwrap();
        assert_eq!(affected, 20);

        let result = table
            .select(&mut pager, None, None, None, CancelToken::new())
            .unwrap();
        assert!(drain(result).is_empty());
        table.tree().check_invariants(&mut pager).unwrap();
    }

    #[test]
    fn projection_and_limit_shape_the_stream() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let table = test_table(&mut pager);

        for i in 0..10 {
            insert_person(&table, &mut pager, i, &format!("u{}@x", i), 20 + i as i32);
        }

        let result = table
            .select(&mut pager, Some(vec![1]), None, Some(3), CancelToken::new())
            .unwrap();
        assert_eq!(result.columns.len(), 1);
        assert_eq!(result.columns[0].name, "email");
        let rows = drain(result);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].values.len(), 1);
    }

    #[test]
    fn cancellation_surfaces_mid_stream() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let table = test_table(&mut pager);
        insert_person(&table, &mut pager, 1, "a@x", 30);

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = table
            .select(&mut pager, None, None, None, cancel)
            .unwrap();
        let outcome: Result<Vec<_>, _> = result.rows.collect();
        assert!(matches!(outcome, Err(Error::Cancelled)));
    }

    #[test]
    fn autoincrement_backfills_the_assigned_key() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let mut id = Column::new("id", ColumnKind::Int8);
        id.primary_key = true;
        id.autoincrement = true;
        let columns = vec![id, Column::new("email", ColumnKind::Varchar(64))];
        let root = pager.unused_page_idx();
        let page = pager.get_page(root, encoding::cell_value_size(&columns)).unwrap();
        page.lock().unwrap().set_root(true);
        let table = Table::new("users", columns, root).unwrap();

        let row = Row::new(vec![
            OptionalValue::null(),
            OptionalValue::some(Value::Varchar("a@x".into())),
        ]);
        table.insert(&mut pager, row).unwrap();
        let row = Row::new(vec![
            OptionalValue::null(),
            OptionalValue::some(Value::Varchar("b@x".into())),
        ]);
        table.insert(&mut pager, row).unwrap();

        let result = table
            .select(&mut pager, None, None, None, CancelToken::new())
            .unwrap();
        let rows = drain(result);
        assert_eq!(rows[0].value(0), &OptionalValue::some(Value::Int8(0)));
        assert_eq!(rows[1].value(0), &OptionalValue::some(Value::Int8(1)));
    }

    #[test]
    fn rejects_invalid_autoincrement_and_oversize_rows() {
        let mut age = Column::new("age", ColumnKind::Int4);
        age.autoincrement = true;
        assert!(matches!(
            Table::validate_columns(&[age]),
            Err(Error::Validation(_))
        ));

        let oversize = vec![Column::new("blob", ColumnKind::Text)];
        assert!(matches!(
            Table::validate_columns(&oversize),
            Err(Error::Validation(_))
        ));
    }
}
