use crate::storage::column::Column;
use std::fmt;

/// Represents an SQL command with its parsed statement and original SQL
/// string. The raw text is kept because the schema table stores it.
#[derive(Debug)]
pub struct SqlCommand {
    pub statement: Statement,
    pub sql: String,
}

/// Core SQL statement types supported by the parser.
#[derive(Debug)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateTable(CreateTableStatement),
    DropTable(String),
    ShowTables,
    // Parsed but executed as no-ops; see the transaction notes in DESIGN.md.
    Begin,
    Commit,
    Rollback,
}

/// Represents column selection in a `SELECT` statement.
#[derive(Debug)]
pub enum Columns {
    All,
    List(Vec<String>),
}

#[derive(Debug)]
pub struct SelectStatement {
    pub table: String,
    pub columns: Columns,
    pub where_clause: Option<WhereClause>,
    pub limit: Option<usize>,
}

/// An `INSERT` statement: one column list, one or more value tuples.
#[derive(Debug)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Literal>>,
}

#[derive(Debug)]
pub struct UpdateStatement {
    pub table: String,
    pub sets: Vec<(String, Literal)>,
    pub where_clause: Option<WhereClause>,
}

#[derive(Debug)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<WhereClause>,
}

#[derive(Debug)]
pub struct CreateTableStatement {
    pub name: String,
    pub columns: Vec<Column>,
}

/// A parsed SQL literal, typed as far as the text allows.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Str(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Literal(Literal),
}

/// One atomic comparison, `operand op operand`. `IS [NOT] NULL` arrives
/// here normalized to `= NULL` / `!= NULL`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub left: Operand,
    pub op: CmpOp,
    pub right: Operand,
}

/// WHERE as a disjunction of conjunctions: OR over AND groups.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub or_groups: Vec<Vec<Condition>>,
}
