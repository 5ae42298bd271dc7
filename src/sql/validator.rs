use crate::errors;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENT_REGEX: Regex = Regex::new(r#"^[A-Za-z_][A-Za-z0-9_]*$"#).unwrap();
    static ref TYPE_REGEX: Regex = Regex::new(
        r#"(?i)^(BOOLEAN|INT4|INT8|REAL|DOUBLE|VARCHAR\(\d+\)|TEXT|TIMESTAMP)$"#
    )
    .unwrap();
}

/// Validates a table or column identifier against the regex.
///
/// # Arguments
/// * `name` - The identifier to validate.
///
/// # Returns
/// A `Result` containing the validated name or an `errors::Error`.
pub fn validate_identifier(name: &str) -> Result<String, errors::Error> {
    if name.is_empty() {
        return Err(errors::Error::Syntax(
            "Identifier cannot be empty.".to_owned(),
        ));
    }
    if IDENT_REGEX.is_match(name) {
        Ok(name.to_string())
    } else {
        Err(errors::Error::Syntax(format!(
            "Identifier ({}) must match regex {}.",
            name,
            IDENT_REGEX.as_str()
        )))
    }
}

/// Validates a column type spelling.
///
/// # Arguments
/// * `type_str` - The column type to validate.
///
/// # Returns
/// An `errors::Error` if the type is invalid.
pub fn validate_column_type(type_str: &str) -> Result<(), errors::Error> {
    if !TYPE_REGEX.is_match(type_str) {
        return Err(errors::Error::Syntax(format!(
            "Invalid column type: {}.",
            type_str
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_identifiers() {
        assert!(validate_identifier("foo").is_ok());
        assert!(validate_identifier("_foo_9").is_ok());
        assert!(validate_identifier("9foo").is_err());
        assert!(validate_identifier("fo-o").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn accepts_supported_types_only() {
        for t in ["BOOLEAN", "int4", "INT8", "REAL", "DOUBLE", "VARCHAR(255)", "TEXT", "timestamp"] {
            assert!(validate_column_type(t).is_ok(), "{} should validate", t);
        }
        assert!(validate_column_type("BLOB").is_err());
        assert!(validate_column_type("VARCHAR").is_err());
    }
}
