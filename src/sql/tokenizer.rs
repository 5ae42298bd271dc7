use crate::errors;
use std::collections::VecDeque;

/// Splits an SQL statement into tokens, respecting spaces inside parentheses
/// and quotes. Comparison operators (`= != <> < > <= >=`) and commas become
/// standalone tokens outside parentheses so WHERE and SET clauses parse
/// without whitespace discipline.
///
/// # Arguments
/// * `sql` - The raw SQL string to split.
///
/// # Returns
/// A `Result` containing a `VecDeque<String>` of tokens or an
/// `errors::Error` if syntax is invalid.
pub fn tokenize_sql(sql: &str) -> Result<VecDeque<String>, errors::Error> {
    let mut result = VecDeque::new();
    let mut current = String::new();
    let mut paren_depth = 0usize;
    let mut inside_text = false;

    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                inside_text = !inside_text;
                current.push(c);
            }
            ')' => {
                if !inside_text {
                    if paren_depth == 0 {
                        return Err(errors::Error::Syntax(
                            "Unmatched closing parenthesis.".to_owned(),
                        ));
                    }
                    paren_depth -= 1;
                }
                current.push(c);
            }
            '(' => {
                if !inside_text {
                    paren_depth += 1;
                }
                current.push(c);
            }
            ' ' | '\t' | '\n' | '\r' if paren_depth == 0 && !inside_text => {
                if !current.is_empty() {
                    result.push_back(current);
                    current = String::new();
                }
            }
            ',' if paren_depth == 0 && !inside_text => {
                if !current.is_empty() {
                    result.push_back(current);
                    current = String::new();
                }
                result.push_back(",".to_owned());
            }
            '=' | '<' | '>' | '!' if paren_depth == 0 && !inside_text => {
                if !current.is_empty() {
                    result.push_back(current);
                    current = String::new();
                }
                let mut op = String::from(c);
                if let Some(&next) = chars.peek() {
                    if matches!((c, next), ('<', '=') | ('>', '=') | ('!', '=') | ('<', '>')) {
                        op.push(next);
                        chars.next();
                    }
                }
                result.push_back(op);
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        result.push_back(current);
    }
    if paren_depth != 0 {
        return Err(errors::Error::Syntax(
            "Missing closing parenthesis.".to_owned(),
        ));
    }
    if inside_text {
        return Err(errors::Error::Syntax("Unclosed text literal.".to_owned()));
    }

    Ok(result)
}
