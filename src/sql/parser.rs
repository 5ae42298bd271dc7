use super::statement::*;
use super::tokenizer;
use super::validator;
use crate::errors;
use crate::storage::column::{Column, ColumnKind, VARCHAR_MAX_LEN};
use std::collections::VecDeque;

/// Parses a full SQL statement.
///
/// # Arguments
/// * `raw_sql` - The raw SQL string to parse.
///
/// # Returns
/// A `Result` containing the parsed `SqlCommand` or an `errors::Error`.
pub fn parse(raw_sql: &str) -> Result<SqlCommand, errors::Error> {
    let trimmed = raw_sql.trim();
    let mut tokens = tokenizer::tokenize_sql(trimmed.strip_suffix(';').unwrap_or(trimmed))?;

    let first = pop_token(&mut tokens, "SQL statement cannot be empty.")?.to_uppercase();
    let statement = match first.as_str() {
        "SELECT" => Statement::Select(parse_select(&mut tokens)?),
        "INSERT" => Statement::Insert(parse_insert(&mut tokens)?),
        "UPDATE" => Statement::Update(parse_update(&mut tokens)?),
        "DELETE" => Statement::Delete(parse_delete(&mut tokens)?),
        "CREATE" => Statement::CreateTable(parse_create(&mut tokens)?),
        "DROP" => Statement::DropTable(parse_drop(&mut tokens)?),
        "SHOW" => parse_show(&mut tokens)?,
        "BEGIN" => parse_transaction(&mut tokens, Statement::Begin)?,
        "COMMIT" => parse_transaction(&mut tokens, Statement::Commit)?,
        "ROLLBACK" => parse_transaction(&mut tokens, Statement::Rollback)?,
        _ => {
            return Err(errors::Error::Syntax(format!(
                "Unrecognized statement: {}.",
                first
            )))
        }
    };
    if !tokens.is_empty() {
        return Err(errors::Error::Syntax(
            "Unexpected tokens after statement.".to_owned(),
        ));
    }
    Ok(SqlCommand {
        statement,
        sql: trimmed.to_string(),
    })
}

/// Parses a `SELECT` statement from tokenized SQL.
///
/// # Arguments
/// * `tokens` - A mutable `VecDeque<String>` of SQL tokens.
///
/// # Returns
/// A `Result` containing the parsed `SelectStatement` or an `errors::Error`.
fn parse_select(tokens: &mut VecDeque<String>) -> Result<SelectStatement, errors::Error> {
    let mut columns_sql = String::new();
    loop {
        let token = pop_token(tokens, "'SELECT' columns must be followed by 'FROM'.")?;
        if token.to_uppercase() == "FROM" {
            break;
        }
        columns_sql.push_str(&token);
    }
    if columns_sql.is_empty() {
        return Err(errors::Error::Syntax(
            "'SELECT' must specify columns.".to_owned(),
        ));
    }
    let columns = parse_columns(columns_sql)?;
    let table = pop_token(tokens, "'SELECT ... FROM' must be followed by a table name.")?;
    let where_clause = parse_where_clause(tokens)?;
    let limit = parse_limit(tokens)?;
    Ok(SelectStatement {
        table: validator::validate_identifier(&table)?,
        columns,
        where_clause,
        limit,
    })
}

/// Parses an `INSERT` statement from tokenized SQL.
///
/// # Arguments
/// * `tokens` - A mutable `VecDeque<String>` of SQL tokens.
///
/// # Returns
/// A `Result` containing the parsed `InsertStatement` or an `errors::Error`.
fn parse_insert(tokens: &mut VecDeque<String>) -> Result<InsertStatement, errors::Error> {
    expect_token(tokens, "INTO", "'INSERT' must be followed by 'INTO'.")?;
    let table = pop_token(tokens, "'INSERT INTO' must be followed by a table name.")?;
    let columns_sql = pop_token(
        tokens,
        "'INSERT INTO table' must be followed by column names in parentheses.",
    )?;
    let columns = strip_parens(&columns_sql, "Column names")?
        .split(',')
        .map(|s| validator::validate_identifier(s.trim()))
        .collect::<Result<Vec<_>, _>>()?;

    expect_token(
        tokens,
        "VALUES",
        "'INSERT INTO table (...)' must be followed by 'VALUES'.",
    )?;

    let mut rows = Vec::new();
    loop {
        let tuple_sql = pop_token(tokens, "'VALUES' must be followed by a value tuple.")?;
        let tuple = strip_parens(&tuple_sql, "Values")?;
        let literals = split_csv(tuple)
            .iter()
            .map(|s| parse_literal(s.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        if literals.len() != columns.len() {
            return Err(errors::Error::Syntax(format!(
                "Column count ({}) does not match value count ({}).",
                columns.len(),
                literals.len()
            )));
        }
        rows.push(literals);

        match tokens.front().map(|t| t.as_str()) {
            Some(",") => {
                tokens.pop_front();
            }
            _ => break,
        }
    }

    Ok(InsertStatement {
        table: validator::validate_identifier(&table)?,
        columns,
        rows,
    })
}

/// Parses an `UPDATE` statement from tokenized SQL.
///
/// # Arguments
/// * `tokens` - A mutable `VecDeque<String>` of SQL tokens.
///
/// # Returns
/// A `Result` containing the parsed `UpdateStatement` or an `errors::Error`.
fn parse_update(tokens: &mut VecDeque<String>) -> Result<UpdateStatement, errors::Error> {
    let table = pop_token(tokens, "'UPDATE' must be followed by a table name.")?;
    expect_token(tokens, "SET", "'UPDATE table' must be followed by 'SET'.")?;

    let mut sets = Vec::new();
    loop {
        let column = pop_token(tokens, "Missing column in SET clause.")?;
        expect_token(tokens, "=", "Expected '=' after column in SET clause.")?;
        let value = pop_token(tokens, "Missing value after '=' in SET clause.")?;
        sets.push((
            validator::validate_identifier(&column)?,
            parse_literal(&value)?,
        ));

        match tokens.front().map(|t| t.as_str()) {
            Some(",") => {
                tokens.pop_front();
            }
            _ => break,
        }
    }

    let where_clause = parse_where_clause(tokens)?;
    Ok(UpdateStatement {
        table: validator::validate_identifier(&table)?,
        sets,
        where_clause,
    })
}

/// Parses a `DELETE` statement from tokenized SQL.
///
/// # Arguments
/// * `tokens` - A mutable `VecDeque<String>` of SQL tokens.
///
/// # Returns
/// A `Result` containing the parsed `DeleteStatement` or an `errors::Error`.
fn parse_delete(tokens: &mut VecDeque<String>) -> Result<DeleteStatement, errors::Error> {
    expect_token(tokens, "FROM", "'DELETE' must be followed by 'FROM'.")?;
    let table = pop_token(tokens, "'DELETE FROM' must be followed by a table name.")?;
    let where_clause = parse_where_clause(tokens)?;
    Ok(DeleteStatement {
        table: validator::validate_identifier(&table)?,
        where_clause,
    })
}

/// Parses a `CREATE TABLE` statement with column definitions.
///
/// # Arguments
/// * `tokens` - A mutable `VecDeque<String>` of SQL tokens.
///
/// # Returns
/// A `Result` containing the parsed `CreateTableStatement` or an `errors::Error`.
fn parse_create(tokens: &mut VecDeque<String>) -> Result<CreateTableStatement, errors::Error> {
    expect_token(tokens, "TABLE", "'CREATE' must be followed by 'TABLE'.")?;
    let name = pop_token(tokens, "'CREATE TABLE' must be followed by a table name.")?;
    let columns_sql = pop_token(
        tokens,
        "'CREATE TABLE name' must be followed by column definitions in parentheses.",
    )?;
    let columns_str = strip_parens(&columns_sql, "Column definitions")?;
    let columns = parse_column_defs(columns_str)?;
    Ok(CreateTableStatement {
        name: validator::validate_identifier(&name)?,
        columns,
    })
}

fn parse_drop(tokens: &mut VecDeque<String>) -> Result<String, errors::Error> {
    expect_token(tokens, "TABLE", "'DROP' must be followed by 'TABLE'.")?;
    let name = pop_token(tokens, "'DROP TABLE' must be followed by a table name.")?;
    validator::validate_identifier(&name)
}

fn parse_show(tokens: &mut VecDeque<String>) -> Result<Statement, errors::Error> {
    expect_token(tokens, "TABLES", "'SHOW' must be followed by 'TABLES'.")?;
    Ok(Statement::ShowTables)
}

fn parse_transaction(
    tokens: &mut VecDeque<String>,
    statement: Statement,
) -> Result<Statement, errors::Error> {
    // An optional TRANSACTION keyword is tolerated.
    if let Some(token) = tokens.front() {
        if token.to_uppercase() == "TRANSACTION" {
            tokens.pop_front();
        }
    }
    Ok(statement)
}

/// Parses column definitions for `CREATE TABLE`.
///
/// # Arguments
/// * `columns_str` - The string between the parentheses.
///
/// # Returns
/// A `Result` containing the column list or an `errors::Error`.
fn parse_column_defs(columns_str: &str) -> Result<Vec<Column>, errors::Error> {
    let mut columns = Vec::new();
    for column_def in split_csv(columns_str) {
        let parts: Vec<&str> = column_def.trim().split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        let name = validator::validate_identifier(parts[0])?;
        let type_str = parts.get(1).ok_or_else(|| {
            errors::Error::Syntax(format!("Column '{}' is missing a type.", name))
        })?;
        let kind = parse_column_type(type_str)?;

        let mut column = Column::new(&name, kind);
        let mut i = 2;
        while i < parts.len() {
            match parts[i].to_uppercase().as_str() {
                "NOT" => {
                    i += 1;
                    expect_keyword(&parts, i, "NULL", "'NOT' must be followed by 'NULL'.")?;
                    column.nullable = false;
                    i += 1;
                }
                "NULL" => {
                    column.nullable = true;
                    i += 1;
                }
                "PRIMARY" => {
                    i += 1;
                    expect_keyword(&parts, i, "KEY", "'PRIMARY' must be followed by 'KEY'.")?;
                    column.primary_key = true;
                    i += 1;
                }
                "AUTOINCREMENT" => {
                    column.autoincrement = true;
                    i += 1;
                }
                other => {
                    return Err(errors::Error::Syntax(format!(
                        "Unexpected token '{}' in the definition of column '{}'.",
                        other, name
                    )));
                }
            }
        }
        columns.push(column);
    }
    if columns.is_empty() {
        return Err(errors::Error::Syntax(
            "No valid column definitions found.".to_owned(),
        ));
    }
    Ok(columns)
}

/// Parses a column type from a string.
///
/// # Arguments
/// * `type_str` - The type string to parse.
///
/// # Returns
/// A `Result` containing the `ColumnKind` or an `errors::Error`.
fn parse_column_type(type_str: &str) -> Result<ColumnKind, errors::Error> {
    validator::validate_column_type(type_str)?;
    let upper = type_str.to_uppercase();

    match upper.as_str() {
        "BOOLEAN" => Ok(ColumnKind::Boolean),
        "INT4" => Ok(ColumnKind::Int4),
        "INT8" => Ok(ColumnKind::Int8),
        "REAL" => Ok(ColumnKind::Real),
        "DOUBLE" => Ok(ColumnKind::Double),
        "TEXT" => Ok(ColumnKind::Text),
        "TIMESTAMP" => Ok(ColumnKind::Timestamp),
        _ if upper.starts_with("VARCHAR(") && upper.ends_with(')') => {
            let len_str = &upper[8..upper.len() - 1];
            let len = len_str.parse::<u32>().map_err(|_| {
                errors::Error::Syntax(format!("Invalid VARCHAR length: {}.", len_str))
            })?;
            if len == 0 || len > VARCHAR_MAX_LEN as u32 {
                return Err(errors::Error::Syntax(format!(
                    "VARCHAR length must be between 1 and {}.",
                    VARCHAR_MAX_LEN
                )));
            }
            Ok(ColumnKind::Varchar(len as u16))
        }
        _ => Err(errors::Error::Syntax(format!(
            "Unsupported column type: {}.",
            type_str
        ))),
    }
}

/// Parses column names for `SELECT` statements.
///
/// # Arguments
/// * `columns_sql` - The string containing column names.
///
/// # Returns
/// A `Result` containing the `Columns` enum or an `errors::Error`.
fn parse_columns(columns_sql: String) -> Result<Columns, errors::Error> {
    let trimmed = columns_sql.replace(' ', "");
    if trimmed == "*" {
        Ok(Columns::All)
    } else {
        let columns = trimmed
            .split(',')
            .filter(|s| !s.is_empty())
            .map(validator::validate_identifier)
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return Err(errors::Error::Syntax(
                "No columns specified in SELECT.".to_owned(),
            ));
        }
        Ok(Columns::List(columns))
    }
}

/// Parses an optional `WHERE` clause into OR-of-AND condition groups.
///
/// # Arguments
/// * `tokens` - The token queue, positioned at a possible `WHERE`.
///
/// # Returns
/// A `Result` containing the optional clause or an `errors::Error`.
fn parse_where_clause(
    tokens: &mut VecDeque<String>,
) -> Result<Option<WhereClause>, errors::Error> {
    match tokens.front() {
        Some(token) if token.to_uppercase() == "WHERE" => {
            tokens.pop_front();
        }
        _ => return Ok(None),
    }

    let mut or_groups = Vec::new();
    let mut group = Vec::new();
    loop {
        group.push(parse_condition(tokens)?);

        match tokens.front().map(|t| t.to_uppercase()) {
            Some(connector) if connector == "AND" => {
                tokens.pop_front();
            }
            Some(connector) if connector == "OR" => {
                tokens.pop_front();
                or_groups.push(std::mem::take(&mut group));
            }
            _ => break,
        }
    }
    or_groups.push(group);
    Ok(Some(WhereClause { or_groups }))
}

/// Parses one `operand op operand` condition, normalizing `IS [NOT] NULL`
/// to `= NULL` / `!= NULL`.
fn parse_condition(tokens: &mut VecDeque<String>) -> Result<Condition, errors::Error> {
    let left_token = pop_token(tokens, "WHERE clause cannot be empty.")?;
    let left = parse_operand(&left_token)?;

    let op_token = pop_token(tokens, "Condition is missing an operator.")?;
    if op_token.to_uppercase() == "IS" {
        let mut negated = false;
        let mut next = pop_token(tokens, "'IS' must be followed by [NOT] NULL.")?;
        if next.to_uppercase() == "NOT" {
            negated = true;
            next = pop_token(tokens, "'IS NOT' must be followed by 'NULL'.")?;
        }
        if next.to_uppercase() != "NULL" {
            return Err(errors::Error::Syntax(
                "'IS' must be followed by [NOT] NULL.".to_owned(),
            ));
        }
        return Ok(Condition {
            left,
            op: if negated { CmpOp::Ne } else { CmpOp::Eq },
            right: Operand::Literal(Literal::Null),
        });
    }

    let op = match op_token.as_str() {
        "=" => CmpOp::Eq,
        "!=" | "<>" => CmpOp::Ne,
        "<" => CmpOp::Lt,
        "<=" => CmpOp::Le,
        ">" => CmpOp::Gt,
        ">=" => CmpOp::Ge,
        other => {
            return Err(errors::Error::Syntax(format!(
                "Unknown comparison operator: {}.",
                other
            )))
        }
    };
    let right_token = pop_token(tokens, "Condition is missing a right operand.")?;
    Ok(Condition {
        left,
        op,
        right: parse_operand(&right_token)?,
    })
}

/// An operand is a literal when it reads as one, otherwise a field name.
fn parse_operand(token: &str) -> Result<Operand, errors::Error> {
    if token.starts_with('\'') {
        return Ok(Operand::Literal(parse_literal(token)?));
    }
    match token.to_uppercase().as_str() {
        "NULL" => return Ok(Operand::Literal(Literal::Null)),
        "TRUE" => return Ok(Operand::Literal(Literal::Boolean(true))),
        "FALSE" => return Ok(Operand::Literal(Literal::Boolean(false))),
        _ => {}
    }
    if token.parse::<i64>().is_ok() || token.parse::<f64>().is_ok() {
        return Ok(Operand::Literal(parse_literal(token)?));
    }
    Ok(Operand::Field(validator::validate_identifier(token)?))
}

/// Parses a single SQL literal.
///
/// # Arguments
/// * `token` - The literal text, still carrying its quotes if any.
///
/// # Returns
/// A `Result` containing the `Literal` or an `errors::Error`.
fn parse_literal(token: &str) -> Result<Literal, errors::Error> {
    if token.is_empty() {
        return Err(errors::Error::Syntax("Value cannot be empty.".to_owned()));
    }
    if token.starts_with('\'') {
        if token.len() < 2 || !token.ends_with('\'') {
            return Err(errors::Error::Syntax(format!(
                "Unterminated string literal: {}.",
                token
            )));
        }
        return Ok(Literal::Str(token[1..token.len() - 1].to_string()));
    }
    match token.to_uppercase().as_str() {
        "NULL" => return Ok(Literal::Null),
        "TRUE" => return Ok(Literal::Boolean(true)),
        "FALSE" => return Ok(Literal::Boolean(false)),
        _ => {}
    }
    if let Ok(v) = token.parse::<i64>() {
        return Ok(Literal::Integer(v));
    }
    if let Ok(v) = token.parse::<f64>() {
        return Ok(Literal::Float(v));
    }
    // Bare single words pass through as strings.
    Ok(Literal::Str(token.to_string()))
}

fn parse_limit(tokens: &mut VecDeque<String>) -> Result<Option<usize>, errors::Error> {
    match tokens.front() {
        Some(token) if token.to_uppercase() == "LIMIT" => {
            tokens.pop_front();
        }
        _ => return Ok(None),
    }
    let value = pop_token(tokens, "'LIMIT' must be followed by a number.")?;
    let limit = value
        .parse::<usize>()
        .map_err(|_| errors::Error::Syntax(format!("Invalid LIMIT value: {}.", value)))?;
    Ok(Some(limit))
}

/// Helper function to expect and consume a specific token.
///
/// # Arguments
/// * `tokens` - The token queue.
/// * `expected` - The token to expect (case-insensitive).
/// * `error_msg` - The error message if the token is not found.
///
/// # Returns
/// A `Result` indicating success or an `errors::Error`.
fn expect_token(
    tokens: &mut VecDeque<String>,
    expected: &str,
    error_msg: &str,
) -> Result<(), errors::Error> {
    match tokens.pop_front() {
        Some(token) if token.to_uppercase() == expected.to_uppercase() => Ok(()),
        _ => Err(errors::Error::Syntax(error_msg.to_owned())),
    }
}

/// Helper function to pop a token or return an error.
///
/// # Arguments
/// * `tokens` - The token queue.
/// * `error_msg` - The error message if no token is available.
///
/// # Returns
/// A `Result` containing the token or an `errors::Error`.
fn pop_token(tokens: &mut VecDeque<String>, error_msg: &str) -> Result<String, errors::Error> {
    tokens
        .pop_front()
        .ok_or_else(|| errors::Error::Syntax(error_msg.to_owned()))
}

/// Helper to expect a keyword in a parts array.
fn expect_keyword(
    parts: &[&str],
    index: usize,
    expected: &str,
    error_msg: &str,
) -> Result<(), errors::Error> {
    if parts
        .get(index)
        .map_or(false, |&p| p.to_uppercase() == expected)
    {
        Ok(())
    } else {
        Err(errors::Error::Syntax(error_msg.to_owned()))
    }
}

fn strip_parens<'a>(token: &'a str, what: &str) -> Result<&'a str, errors::Error> {
    let trimmed = token.trim();
    if !trimmed.starts_with('(') || !trimmed.ends_with(')') {
        return Err(errors::Error::Syntax(format!(
            "{} must be enclosed in parentheses.",
            what
        )));
    }
    Ok(&trimmed[1..trimmed.len() - 1])
}

/// Splits on commas that sit outside single-quoted text.
fn split_csv(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut inside_text = false;
    for c in s.chars() {
        match c {
            '\'' => {
                inside_text = !inside_text;
                current.push(c);
            }
            ',' if !inside_text => {
                out.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !out.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_table() {
        let cmd = parse(
            "CREATE TABLE foo (id INT8 PRIMARY KEY AUTOINCREMENT, email VARCHAR(255) NOT NULL, age INT4);",
        )
        .unwrap();
        let stmt = match cmd.statement {
            Statement::CreateTable(stmt) => stmt,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(stmt.name, "foo");
        assert_eq!(stmt.columns.len(), 3);
        assert_eq!(stmt.columns[0].kind, ColumnKind::Int8);
        assert!(stmt.columns[0].primary_key);
        assert!(stmt.columns[0].autoincrement);
        assert_eq!(stmt.columns[1].kind, ColumnKind::Varchar(255));
        assert!(!stmt.columns[1].nullable);
        assert!(stmt.columns[2].nullable);
    }

    #[test]
    fn parses_multi_row_insert() {
        let cmd =
            parse("INSERT INTO foo (id, email, age) VALUES (1, 'a@x', 30), (2, 'b@x', 40);")
                .unwrap();
        let stmt = match cmd.statement {
            Statement::Insert(stmt) => stmt,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(stmt.columns, vec!["id", "email", "age"]);
        assert_eq!(
            stmt.rows,
            vec![
                vec![
                    Literal::Integer(1),
                    Literal::Str("a@x".into()),
                    Literal::Integer(30)
                ],
                vec![
                    Literal::Integer(2),
                    Literal::Str("b@x".into()),
                    Literal::Integer(40)
                ],
            ]
        );
    }

    #[test]
    fn parses_select_with_where_and_limit() {
        let cmd = parse("SELECT id, email FROM foo WHERE age >= 30 AND email != 'x' OR id IS NULL LIMIT 5").unwrap();
        let stmt = match cmd.statement {
            Statement::Select(stmt) => stmt,
            other => panic!("unexpected {:?}", other),
        };
        assert!(matches!(&stmt.columns, Columns::List(cols) if cols == &["id", "email"]));
        assert_eq!(stmt.limit, Some(5));

        let clause = stmt.where_clause.unwrap();
        assert_eq!(clause.or_groups.len(), 2);
        assert_eq!(clause.or_groups[0].len(), 2);
        assert_eq!(
            clause.or_groups[0][0],
            Condition {
                left: Operand::Field("age".into()),
                op: CmpOp::Ge,
                right: Operand::Literal(Literal::Integer(30)),
            }
        );
        assert_eq!(
            clause.or_groups[1][0],
            Condition {
                left: Operand::Field("id".into()),
                op: CmpOp::Eq,
                right: Operand::Literal(Literal::Null),
            }
        );
    }

    #[test]
    fn parses_update_with_multiple_sets() {
        let cmd = parse("UPDATE foo SET email = 'u@x', age = 31 WHERE id = 5").unwrap();
        let stmt = match cmd.statement {
            Statement::Update(stmt) => stmt,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(stmt.table, "foo");
        assert_eq!(stmt.sets.len(), 2);
        assert_eq!(stmt.sets[0], ("email".into(), Literal::Str("u@x".into())));
        assert_eq!(stmt.sets[1], ("age".into(), Literal::Integer(31)));
        assert!(stmt.where_clause.is_some());
    }

    #[test]
    fn parses_delete_and_drop_and_show() {
        assert!(matches!(
            parse("DELETE FROM foo").unwrap().statement,
            Statement::Delete(DeleteStatement { where_clause: None, .. })
        ));
        assert!(matches!(
            parse("DROP TABLE foo").unwrap().statement,
            Statement::DropTable(name) if name == "foo"
        ));
        assert!(matches!(
            parse("SHOW TABLES").unwrap().statement,
            Statement::ShowTables
        ));
        assert!(matches!(
            parse("BEGIN TRANSACTION").unwrap().statement,
            Statement::Begin
        ));
    }

    #[test]
    fn keeps_the_raw_sql() {
        let cmd = parse("  SELECT * FROM foo;  ").unwrap();
        assert_eq!(cmd.sql, "SELECT * FROM foo;");
    }

    #[test]
    fn rejects_malformed_statements() {
        assert!(parse("").is_err());
        assert!(parse("SELECT FROM foo").is_err());
        assert!(parse("INSERT INTO foo (a) VALUES (1, 2)").is_err());
        assert!(parse("CREATE TABLE foo ()").is_err());
        assert!(parse("CREATE TABLE foo (id BLOB)").is_err());
        assert!(parse("UPDATE foo SET WHERE id = 1").is_err());
        assert!(parse("SELECT * FROM foo WHERE").is_err());
        assert!(parse("FROB THE KNOB").is_err());
    }
}
