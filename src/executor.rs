//! Query executor: dispatches parsed statements to table operations,
//! evaluates WHERE conditions, and drains the streaming row pipeline.

use crate::database::Database;
use crate::errors::Error;
use crate::sql::statement::{
    CmpOp, Columns, Condition, Literal, Operand, SqlCommand, Statement, WhereClause,
};
use crate::storage::column::{Column, ColumnKind, OptionalValue, Value};
use crate::storage::row::Row;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cooperative cancellation flag, observed at every pipeline suspension
/// point. Partial effects of a cancelled UPDATE/DELETE are not rolled back.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    CreateTable,
    DropTable,
    Insert,
    Select,
    Update,
    Delete,
    ShowTables,
    Begin,
    Commit,
    Rollback,
    /// Wire-only kinds: ping responses and failures before statement
    /// dispatch.
    Ping,
    Unknown,
}

/// The response kind a statement reports under, failure included.
pub fn statement_kind(statement: &Statement) -> StatementKind {
    match statement {
        Statement::Select(_) => StatementKind::Select,
        Statement::Insert(_) => StatementKind::Insert,
        Statement::Update(_) => StatementKind::Update,
        Statement::Delete(_) => StatementKind::Delete,
        Statement::CreateTable(_) => StatementKind::CreateTable,
        Statement::DropTable(_) => StatementKind::DropTable,
        Statement::ShowTables => StatementKind::ShowTables,
        Statement::Begin => StatementKind::Begin,
        Statement::Commit => StatementKind::Commit,
        Statement::Rollback => StatementKind::Rollback,
    }
}

/// The drained result of one statement, ready for the wire.
#[derive(Debug)]
pub struct ExecOutcome {
    pub kind: StatementKind,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<OptionalValue>>,
    pub rows_affected: usize,
    pub message: Option<String>,
}

impl ExecOutcome {
    fn affected(kind: StatementKind, rows_affected: usize) -> Self {
        ExecOutcome {
            kind,
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected,
            message: None,
        }
    }

    fn message(kind: StatementKind, message: String) -> Self {
        ExecOutcome {
            kind,
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: 0,
            message: Some(message),
        }
    }
}

pub fn execute(
    db: &mut Database,
    cmd: &SqlCommand,
    cancel: &CancelToken,
) -> Result<ExecOutcome, Error> {
    debug!(sql = %cmd.sql, "Executing statement.");
    match &cmd.statement {
        Statement::Select(stmt) => {
            let (table, pager) = db.table_and_pager(&stmt.table)?;
            let projection = match &stmt.columns {
                Columns::All => None,
                Columns::List(names) => Some(
                    names
                        .iter()
                        .map(|name| table.column_index(name))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
            };
            let result = table.select(
                pager,
                projection,
                stmt.where_clause.as_ref(),
                stmt.limit,
                cancel.clone(),
            )?;
            let columns = result.columns.clone();
            let mut rows = Vec::new();
            for row in result.rows {
                rows.push(row?.values);
            }
            Ok(ExecOutcome {
                kind: StatementKind::Select,
                columns,
                rows,
                rows_affected: 0,
                message: None,
            })
        }
        Statement::Insert(stmt) => {
            let (table, pager) = db.table_and_pager(&stmt.table)?;
            let mut affected = 0;
            for literals in &stmt.rows {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let row = Row::from_named_literals(&table.columns, &stmt.columns, literals)?;
                table.insert(pager, row)?;
                affected += 1;
            }
            Ok(ExecOutcome::affected(StatementKind::Insert, affected))
        }
        Statement::Update(stmt) => {
            let (table, pager) = db.table_and_pager(&stmt.table)?;
            let affected = table.update(pager, &stmt.sets, stmt.where_clause.as_ref(), cancel)?;
            Ok(ExecOutcome::affected(StatementKind::Update, affected))
        }
        Statement::Delete(stmt) => {
            let (table, pager) = db.table_and_pager(&stmt.table)?;
            let affected = table.delete(pager, stmt.where_clause.as_ref(), cancel)?;
            Ok(ExecOutcome::affected(StatementKind::Delete, affected))
        }
        Statement::CreateTable(stmt) => {
            db.create_table(&stmt.name, stmt.columns.clone(), &cmd.sql)?;
            Ok(ExecOutcome::message(
                StatementKind::CreateTable,
                format!("Created table '{}'.", stmt.name),
            ))
        }
        Statement::DropTable(name) => {
            db.drop_table(name)?;
            Ok(ExecOutcome::message(
                StatementKind::DropTable,
                format!("Dropped table '{}'.", name),
            ))
        }
        Statement::ShowTables => {
            let rows = db
                .list_tables()
                .into_iter()
                .map(|name| vec![OptionalValue::some(Value::Varchar(name))])
                .collect();
            Ok(ExecOutcome {
                kind: StatementKind::ShowTables,
                columns: vec![Column::new("name", ColumnKind::Varchar(255))],
                rows,
                rows_affected: 0,
                message: None,
            })
        }
        Statement::Begin => Ok(transaction_noop(StatementKind::Begin)),
        Statement::Commit => Ok(transaction_noop(StatementKind::Commit)),
        Statement::Rollback => Ok(transaction_noop(StatementKind::Rollback)),
    }
}

fn transaction_noop(kind: StatementKind) -> ExecOutcome {
    ExecOutcome::message(
        kind,
        "Transactions are not supported; the statement had no effect.".to_string(),
    )
}

/// Evaluates a WHERE clause (OR of AND groups) against one row.
pub fn row_matches(
    clause: &WhereClause,
    columns: &[Column],
    row: &Row,
) -> Result<bool, Error> {
    for group in &clause.or_groups {
        let mut all = true;
        for condition in group {
            if !eval_condition(condition, columns, row)? {
                all = false;
                break;
            }
        }
        if all {
            return Ok(true);
        }
    }
    Ok(false)
}

/// A stored or literal value lowered to comparison domains.
#[derive(Debug)]
enum CmpVal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

fn eval_condition(condition: &Condition, columns: &[Column], row: &Row) -> Result<bool, Error> {
    let (left, left_is_null_literal) = operand_value(&condition.left, columns, row)?;
    let (right, right_is_null_literal) = operand_value(&condition.right, columns, row)?;

    // `x = NULL` / `x != NULL` are the IS [NOT] NULL shorthands.
    if left_is_null_literal || right_is_null_literal {
        let other_is_null = if left_is_null_literal {
            right.is_none()
        } else {
            left.is_none()
        };
        return Ok(match condition.op {
            CmpOp::Eq => other_is_null,
            CmpOp::Ne => !other_is_null,
            _ => false,
        });
    }

    // A NULL stored value compares false against everything else.
    let (left, right) = match (left, right) {
        (Some(left), Some(right)) => (left, right),
        _ => return Ok(false),
    };
    compare(left, right, condition.op)
}

fn operand_value(
    operand: &Operand,
    columns: &[Column],
    row: &Row,
) -> Result<(Option<CmpVal>, bool), Error> {
    match operand {
        Operand::Field(name) => {
            let value = row.value_by_name(columns, name)?;
            Ok((value.value().map(cmp_val), false))
        }
        Operand::Literal(Literal::Null) => Ok((None, true)),
        Operand::Literal(Literal::Integer(v)) => Ok((Some(CmpVal::Int(*v)), false)),
        Operand::Literal(Literal::Float(v)) => Ok((Some(CmpVal::Float(*v)), false)),
        Operand::Literal(Literal::Str(s)) => Ok((Some(CmpVal::Str(s.clone())), false)),
        Operand::Literal(Literal::Boolean(b)) => Ok((Some(CmpVal::Bool(*b)), false)),
    }
}

fn cmp_val(value: &Value) -> CmpVal {
    match value {
        Value::Boolean(v) => CmpVal::Bool(*v),
        Value::Int4(v) => CmpVal::Int(*v as i64),
        Value::Int8(v) => CmpVal::Int(*v),
        Value::Timestamp(v) => CmpVal::Int(*v),
        Value::Real(v) => CmpVal::Float(*v as f64),
        Value::Double(v) => CmpVal::Float(*v),
        Value::Varchar(s) => CmpVal::Str(s.clone()),
        Value::Text(s) => CmpVal::Str(s.clone()),
    }
}

fn compare(left: CmpVal, right: CmpVal, op: CmpOp) -> Result<bool, Error> {
    use std::cmp::Ordering as Ord;

    let numeric = |a: f64, b: f64| a.partial_cmp(&b);
    let ordering = match (&left, &right) {
        (CmpVal::Int(a), CmpVal::Int(b)) => Some(a.cmp(b)),
        (CmpVal::Str(a), CmpVal::Str(b)) => Some(a.cmp(b)),
        (CmpVal::Bool(a), CmpVal::Bool(b)) => Some(a.cmp(b)),
        (CmpVal::Int(a), CmpVal::Float(b)) => numeric(*a as f64, *b),
        (CmpVal::Float(a), CmpVal::Int(b)) => numeric(*a, *b as f64),
        (CmpVal::Float(a), CmpVal::Float(b)) => numeric(*a, *b),
        _ => {
            return Err(err!(
                Validation,
                "Cannot compare {:?} with {:?} using {}.",
                left,
                right,
                op
            ));
        }
    };
    let ordering = match ordering {
        Some(ordering) => ordering,
        // NaN compares false against everything.
        None => return Ok(false),
    };

    Ok(match op {
        CmpOp::Eq => ordering == Ord::Equal,
        CmpOp::Ne => ordering != Ord::Equal,
        CmpOp::Lt => ordering == Ord::Less,
        CmpOp::Le => ordering != Ord::Greater,
        CmpOp::Gt => ordering == Ord::Greater,
        CmpOp::Ge => ordering != Ord::Less,
    })
}
