//! TCP server: line-delimited JSON requests in, responses out.
//!
//! Connections each get a thread, but every request serializes through the
//! database mutex, so the engine itself stays single-writer. SIGINT/SIGTERM
//! flip a shutdown flag; the accept loop notices, flushes the database, and
//! exits cleanly.

use crate::database::Database;
use crate::errors::Error;
use crate::executor::{self, statement_kind, CancelToken, StatementKind};
use crate::sql::parser;
use crate::storage::column::{Column, ColumnKind, OptionalValue, Value};
use crate::wire::{Request, RequestKind, Response};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
fn install_signal_handlers() {
    extern "C" fn handle(_sig: libc::c_int) {
        SHUTDOWN.store(true, Ordering::SeqCst);
    }
    unsafe {
        libc::signal(libc::SIGINT, handle as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}

/// Runs the server until SIGINT/SIGTERM, then flushes and returns.
pub fn run(db_path: &Path, port: u16) -> Result<(), Error> {
    install_signal_handlers();

    let db = Arc::new(Mutex::new(Database::open(db_path)?));
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    listener.set_nonblocking(true)?;
    info!(port, db = %db_path.display(), "Server listening.");

    while !SHUTDOWN.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(%peer, "Client connected.");
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    if let Err(e) = handle_client(stream, db) {
                        warn!("Connection ended with an error: {}", e);
                    }
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Shutting down...");
    match db.lock() {
        Ok(mut db) => db.close(),
        Err(_) => warn!("Database lock poisoned during shutdown; skipping flush."),
    }
    Ok(())
}

/// Serves one connection: a complete JSON request per line, a complete JSON
/// response per line.
pub fn handle_client(stream: TcpStream, db: Arc<Mutex<Database>>) -> Result<(), Error> {
    // Accepted sockets should block regardless of the listener's mode.
    stream.set_nonblocking(false)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => respond(&db, request),
            Err(e) => Response::failure(
                StatementKind::Unknown,
                format!("Malformed request: {}", e),
            ),
        };
        let json = serde_json::to_string(&response)
            .map_err(|e| err!(Encoding, "Failed to encode response. {}", e))?;
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
    }
}

fn respond(db: &Arc<Mutex<Database>>, request: Request) -> Response {
    match request.kind {
        RequestKind::Ping => Response::pong(),
        RequestKind::ListTables => {
            let db = match db.lock() {
                Ok(db) => db,
                Err(_) => {
                    return Response::failure(
                        StatementKind::ShowTables,
                        "Database lock poisoned.".to_string(),
                    )
                }
            };
            let rows = db
                .list_tables()
                .into_iter()
                .map(|name| vec![OptionalValue::some(Value::Varchar(name))])
                .collect();
            Response {
                kind: StatementKind::ShowTables,
                success: true,
                error: None,
                columns: Some(vec![Column::new("name", ColumnKind::Varchar(255))]),
                rows: Some(rows),
                rows_affected: Some(0),
                message: None,
            }
        }
        RequestKind::Sql => {
            let sql = request.sql.unwrap_or_default();
            let cmd = match parser::parse(&sql) {
                Ok(cmd) => cmd,
                Err(e) => return Response::failure(StatementKind::Unknown, e.to_string()),
            };
            let kind = statement_kind(&cmd.statement);

            let mut db = match db.lock() {
                Ok(db) => db,
                Err(_) => {
                    return Response::failure(kind, "Database lock poisoned.".to_string())
                }
            };
            match executor::execute(&mut db, &cmd, &CancelToken::new()) {
                Ok(outcome) => Response::from_outcome(outcome),
                Err(e) => Response::failure(kind, e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn spawn_server(dir: &tempfile::TempDir) -> std::net::SocketAddr {
        let db = Arc::new(Mutex::new(
            Database::open(&dir.path().join("db")).unwrap(),
        ));
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || loop {
            let (stream, _) = match listener.accept() {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let db = Arc::clone(&db);
            std::thread::spawn(move || {
                let _ = handle_client(stream, db);
            });
        });
        addr
    }

    fn roundtrip(
        reader: &mut BufReader<TcpStream>,
        writer: &mut TcpStream,
        request: &Request,
    ) -> Response {
        let mut json = serde_json::to_string(request).unwrap();
        json.push('\n');
        writer.write_all(json.as_bytes()).unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[test]
    fn serves_sql_ping_and_list_tables() {
        let dir = tempdir().unwrap();
        let addr = spawn_server(&dir);

        let stream = TcpStream::connect(addr).unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;

        let response = roundtrip(&mut reader, &mut writer, &Request::ping());
        assert!(response.success);
        assert_eq!(response.message.as_deref(), Some("pong"));

        let response = roundtrip(
            &mut reader,
            &mut writer,
            &Request::sql("CREATE TABLE foo (id INT8, email VARCHAR(255));"),
        );
        assert!(response.success, "create failed: {:?}", response.error);

        let response = roundtrip(
            &mut reader,
            &mut writer,
            &Request::sql("INSERT INTO foo (id, email) VALUES (1, 'a@x'), (2, 'b@x');"),
        );
        assert!(response.success);
        assert_eq!(response.rows_affected, Some(2));

        let response = roundtrip(&mut reader, &mut writer, &Request::sql("SELECT * FROM foo;"));
        assert!(response.success);
        assert_eq!(response.rows.as_ref().unwrap().len(), 2);
        assert_eq!(response.rows_affected, Some(0));

        let response = roundtrip(&mut reader, &mut writer, &Request::list_tables());
        assert!(response.success);
        assert_eq!(response.rows.as_ref().unwrap().len(), 1);

        let response = roundtrip(&mut reader, &mut writer, &Request::sql("SELECT * FROM nope;"));
        assert!(!response.success);
        assert!(response.error.unwrap().contains("doesn't exist"));

        let response = roundtrip(&mut reader, &mut writer, &Request::sql("NOT SQL AT ALL"));
        assert!(!response.success);
    }
}
