use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard cap on columns per table.
pub const MAX_COLUMNS: usize = 32;

/// Upper bound for a declared VARCHAR length.
pub const VARCHAR_MAX_LEN: u16 = u16::MAX;

const TEXT_SIZE: usize = 65_535;
const TIMESTAMP_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnKind {
    Boolean,      // bool: 1 byte
    Int4,         // i32: 4 bytes
    Int8,         // i64: 8 bytes
    Real,         // f32: 4 bytes
    Double,       // f64: 8 bytes
    Varchar(u16), // fixed slot of the declared length
    Text,         // bounded string, fixed 65535-byte slot
    Timestamp,    // i64 microseconds since the Unix epoch
}

impl ColumnKind {
    /// Number of bytes the kind occupies inside a row slab.
    pub fn fixed_size(&self) -> usize {
        match self {
            ColumnKind::Boolean => 1,
            ColumnKind::Int4 => 4,
            ColumnKind::Int8 => 8,
            ColumnKind::Real => 4,
            ColumnKind::Double => 8,
            ColumnKind::Varchar(max_len) => *max_len as usize,
            ColumnKind::Text => TEXT_SIZE,
            ColumnKind::Timestamp => TIMESTAMP_SIZE,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Boolean => write!(f, "BOOLEAN"),
            ColumnKind::Int4 => write!(f, "INT4"),
            ColumnKind::Int8 => write!(f, "INT8"),
            ColumnKind::Real => write!(f, "REAL"),
            ColumnKind::Double => write!(f, "DOUBLE"),
            ColumnKind::Varchar(max_len) => write!(f, "VARCHAR({})", max_len),
            ColumnKind::Text => write!(f, "TEXT"),
            ColumnKind::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub primary_key: bool,
    pub autoincrement: bool,
}

impl Column {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Column {
            name: name.to_string(),
            kind,
            nullable: true,
            primary_key: false,
            autoincrement: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Size of this column's slot inside a row slab.
    pub fn size(&self) -> usize {
        self.kind.fixed_size()
    }

    /// Renders the column the way it appears in a CREATE TABLE statement.
    pub fn to_sql(&self) -> String {
        let mut out = format!("{} {}", self.name, self.kind);
        if !self.nullable {
            out.push_str(" NOT NULL");
        }
        if self.primary_key {
            out.push_str(" PRIMARY KEY");
        }
        if self.autoincrement {
            out.push_str(" AUTOINCREMENT");
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Int4(i32),
    Int8(i64),
    Real(f32),
    Double(f64),
    Varchar(String),
    Text(String),
    Timestamp(i64),
}

impl Value {
    /// Whether the dynamic variant matches the declared column kind.
    pub fn matches_kind(&self, kind: &ColumnKind) -> bool {
        matches!(
            (self, kind),
            (Value::Boolean(_), ColumnKind::Boolean)
                | (Value::Int4(_), ColumnKind::Int4)
                | (Value::Int8(_), ColumnKind::Int8)
                | (Value::Real(_), ColumnKind::Real)
                | (Value::Double(_), ColumnKind::Double)
                | (Value::Varchar(_), ColumnKind::Varchar(_))
                | (Value::Text(_), ColumnKind::Text)
                | (Value::Timestamp(_), ColumnKind::Timestamp)
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Int4(v) => write!(f, "{}", v),
            Value::Int8(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Varchar(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v),
        }
    }
}

/// A NULL-or-value container aligned with one column of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionalValue {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl OptionalValue {
    pub fn some(value: Value) -> Self {
        OptionalValue {
            valid: true,
            value: Some(value),
        }
    }

    pub fn null() -> Self {
        OptionalValue {
            valid: false,
            value: None,
        }
    }

    pub fn is_null(&self) -> bool {
        !self.valid
    }

    pub fn value(&self) -> Option<&Value> {
        if self.valid {
            self.value.as_ref()
        } else {
            None
        }
    }
}

impl fmt::Display for OptionalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "NULL"),
        }
    }
}
