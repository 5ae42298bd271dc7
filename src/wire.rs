//! Newline-delimited JSON protocol: one complete object per line in each
//! direction.

use crate::executor::{ExecOutcome, StatementKind};
use crate::storage::column::{Column, OptionalValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Sql,
    Ping,
    ListTables,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

impl Request {
    pub fn sql(sql: &str) -> Self {
        Request {
            kind: RequestKind::Sql,
            sql: Some(sql.to_string()),
        }
    }

    pub fn ping() -> Self {
        Request {
            kind: RequestKind::Ping,
            sql: None,
        }
    }

    pub fn list_tables() -> Self {
        Request {
            kind: RequestKind::ListTables,
            sql: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub kind: StatementKind,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Column>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<OptionalValue>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    pub fn from_outcome(outcome: ExecOutcome) -> Self {
        let rows_bearing = matches!(
            outcome.kind,
            StatementKind::Select | StatementKind::ShowTables
        );
        Response {
            kind: outcome.kind,
            success: true,
            error: None,
            columns: rows_bearing.then_some(outcome.columns),
            rows: rows_bearing.then_some(outcome.rows),
            rows_affected: Some(outcome.rows_affected),
            message: outcome.message,
        }
    }

    pub fn failure(kind: StatementKind, error: String) -> Self {
        Response {
            kind,
            success: false,
            error: Some(error),
            columns: None,
            rows: None,
            rows_affected: None,
            message: None,
        }
    }

    pub fn pong() -> Self {
        Response {
            kind: StatementKind::Ping,
            success: true,
            error: None,
            columns: None,
            rows: None,
            rows_affected: None,
            message: Some("pong".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::column::Value;

    #[test]
    fn request_wire_shape() {
        let json = serde_json::to_string(&Request::sql("SELECT 1;")).unwrap();
        assert_eq!(json, r#"{"type":"sql","sql":"SELECT 1;"}"#);

        let parsed: Request = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(parsed.kind, RequestKind::Ping);
        assert!(parsed.sql.is_none());
    }

    #[test]
    fn response_round_trips_rows() {
        let outcome = ExecOutcome {
            kind: StatementKind::Select,
            columns: vec![Column::new("id", crate::storage::column::ColumnKind::Int8)],
            rows: vec![vec![
                OptionalValue::some(Value::Int8(7)),
            ]],
            rows_affected: 0,
            message: None,
        };
        let json = serde_json::to_string(&Response::from_outcome(outcome)).unwrap();
        assert!(json.contains(r#""kind":"select""#));
        assert!(json.contains(r#""success":true"#));
        assert!(json.contains(r#""valid":true"#));

        // Untagged deserialization picks the narrowest integer variant;
        // the client only renders values, so the width does not matter.
        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rows.unwrap()[0][0].value, Some(Value::Int4(7)));
    }

    #[test]
    fn failures_carry_the_error_text() {
        let json =
            serde_json::to_string(&Response::failure(StatementKind::Insert, "boom".into()))
                .unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.error.as_deref(), Some("boom"));
        assert!(parsed.rows.is_none());
    }
}
