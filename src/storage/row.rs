//! # Row Management

use super::column::{Column, ColumnKind, OptionalValue, Value};
use crate::errors::Error;
use crate::sql::statement::Literal;
use std::fmt;

/// A database row: one [`OptionalValue`] per table column, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<OptionalValue>,
}

impl Row {
    pub fn new(values: Vec<OptionalValue>) -> Self {
        Row { values }
    }

    /// A row of all NULLs shaped for the given column list.
    pub fn nulls(columns: &[Column]) -> Self {
        Row {
            values: vec![OptionalValue::null(); columns.len()],
        }
    }

    /// Builds a row from `(column name, literal)` pairs as they appear in an
    /// INSERT statement. Unmentioned columns become NULL.
    pub fn from_named_literals(
        columns: &[Column],
        names: &[String],
        literals: &[Literal],
    ) -> Result<Self, Error> {
        if names.len() != literals.len() {
            return Err(err!(
                Validation,
                "Column count ({}) does not match value count ({}).",
                names.len(),
                literals.len()
            ));
        }
        for name in names {
            if !columns.iter().any(|c| &c.name == name) {
                return Err(err!(Validation, "Unknown column '{}'.", name));
            }
        }

        let mut row = Row::nulls(columns);
        for (idx, column) in columns.iter().enumerate() {
            if let Some(pos) = names.iter().position(|n| n == &column.name) {
                row.values[idx] = coerce_literal(&literals[pos], column)?;
            }
        }
        Ok(row)
    }

    pub fn value(&self, idx: usize) -> &OptionalValue {
        &self.values[idx]
    }

    /// Looks a value up by column name.
    pub fn value_by_name<'a>(
        &'a self,
        columns: &[Column],
        name: &str,
    ) -> Result<&'a OptionalValue, Error> {
        let idx = columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| err!(Validation, "Unknown column '{}'.", name))?;
        Ok(&self.values[idx])
    }

    /// Checks NOT NULL constraints and declared-kind agreement.
    pub fn validate(&self, columns: &[Column]) -> Result<(), Error> {
        if self.values.len() != columns.len() {
            return Err(err!(
                Validation,
                "Row has {} values, table has {} columns.",
                self.values.len(),
                columns.len()
            ));
        }
        for (value, column) in self.values.iter().zip(columns) {
            match value.value() {
                None => {
                    if !column.nullable {
                        return Err(err!(
                            Validation,
                            "Column '{}' is NOT NULL.",
                            column.name
                        ));
                    }
                }
                Some(v) => {
                    if !v.matches_kind(&column.kind) {
                        return Err(err!(
                            Validation,
                            "Value {:?} does not match column '{}' of type {}.",
                            v,
                            column.name,
                            column.kind
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Converts a parsed SQL literal into a typed value for the given column.
pub fn coerce_literal(literal: &Literal, column: &Column) -> Result<OptionalValue, Error> {
    let value = match (literal, &column.kind) {
        (Literal::Null, _) => return Ok(OptionalValue::null()),
        (Literal::Integer(v), ColumnKind::Int4) => {
            let v = i32::try_from(*v).map_err(|_| {
                err!(Validation, "Value {} overflows INT4 column '{}'.", v, column.name)
            })?;
            Value::Int4(v)
        }
        (Literal::Integer(v), ColumnKind::Int8) => Value::Int8(*v),
        (Literal::Integer(v), ColumnKind::Timestamp) => Value::Timestamp(*v),
        (Literal::Integer(v), ColumnKind::Real) => Value::Real(*v as f32),
        (Literal::Integer(v), ColumnKind::Double) => Value::Double(*v as f64),
        (Literal::Float(v), ColumnKind::Real) => Value::Real(*v as f32),
        (Literal::Float(v), ColumnKind::Double) => Value::Double(*v),
        (Literal::Boolean(v), ColumnKind::Boolean) => Value::Boolean(*v),
        (Literal::Str(s), ColumnKind::Varchar(max_len)) => {
            if s.len() > *max_len as usize {
                return Err(err!(
                    Validation,
                    "Value of {} bytes exceeds VARCHAR({}) column '{}'.",
                    s.len(),
                    max_len,
                    column.name
                ));
            }
            Value::Varchar(s.clone())
        }
        (Literal::Str(s), ColumnKind::Text) => Value::Text(s.clone()),
        (literal, kind) => {
            return Err(err!(
                Validation,
                "Literal {:?} is not valid for column '{}' of type {}.",
                literal,
                column.name,
                kind
            ));
        }
    };
    Ok(OptionalValue::some(value))
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "Row({})", formatted.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("id", ColumnKind::Int8).not_null(),
            Column::new("email", ColumnKind::Varchar(32)),
            Column::new("age", ColumnKind::Int4),
        ]
    }

    #[test]
    fn builds_row_with_defaulted_nulls() {
        let cols = columns();
        let row = Row::from_named_literals(
            &cols,
            &["id".into(), "email".into()],
            &[Literal::Integer(7), Literal::Str("a@x".into())],
        )
        .unwrap();
        assert_eq!(row.value(0), &OptionalValue::some(Value::Int8(7)));
        assert_eq!(row.value(1), &OptionalValue::some(Value::Varchar("a@x".into())));
        assert!(row.value(2).is_null());
        row.validate(&cols).unwrap();
    }

    #[test]
    fn rejects_unknown_column() {
        let err = Row::from_named_literals(&columns(), &["nope".into()], &[Literal::Integer(1)]);
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_not_null_violation() {
        let cols = columns();
        let row = Row::from_named_literals(
            &cols,
            &["age".into()],
            &[Literal::Integer(30)],
        )
        .unwrap();
        assert!(matches!(row.validate(&cols), Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_int4_overflow() {
        let err = Row::from_named_literals(
            &columns(),
            &["age".into()],
            &[Literal::Integer(i64::MAX)],
        );
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_oversize_varchar() {
        let err = Row::from_named_literals(
            &columns(),
            &["email".into()],
            &[Literal::Str("x".repeat(33))],
        );
        assert!(matches!(err, Err(Error::Validation(_))));
    }
}
