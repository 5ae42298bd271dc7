//! Interactive client: a raw-mode console speaking the line-delimited JSON
//! protocol to a running server.

pub mod history;
pub mod prompt;

use crate::errors::Error;
use crate::executor::StatementKind;
use crate::wire::{Request, Response};
use crossterm::terminal;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

const BANNER: &str = r#"
SQL statements end with ;
Type .help for the list of meta-commands.
"#;

const HELP: &str = r#"List of all meta-commands:

.help     Show this help.
.exit     Quit the console.
.tables   List tables in the database.
.ping     Check the server connection.

Anything else is buffered until a ';' and submitted as SQL."#;

/// Connects to the server and runs the console until `.exit` or Ctrl-D.
pub fn start(addr: &str) -> Result<(), Error> {
    let addr = normalize_addr(addr);
    let stream = TcpStream::connect(&addr)
        .map_err(|e| err!(NotFound, "Cannot connect to {}: {}", addr, e))?;
    info!(%addr, "Connected.");

    println!("Welcome to the {} {} console.", NAME, VERSION);
    println!("{}", BANNER);

    terminal::enable_raw_mode()?;
    INIT.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let _ = terminal::disable_raw_mode();
            eprintln!("{}", info);
        }));
    });

    let mut console = Console::new(stream)?;
    let result = console.run();
    terminal::disable_raw_mode()?;
    match result {
        Err(Error::Io(e)) if e.kind() == io::ErrorKind::Interrupted => Ok(()),
        other => other,
    }
}

/// A bare `:port` address means localhost.
fn normalize_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("127.0.0.1{}", addr)
    } else {
        addr.to_string()
    }
}

struct Console {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    prompt: prompt::Prompt,
    buffer: String,
}

impl Console {
    fn new(stream: TcpStream) -> Result<Self, Error> {
        Ok(Console {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
            prompt: prompt::Prompt::new(),
            buffer: String::new(),
        })
    }

    fn run(&mut self) -> Result<(), Error> {
        loop {
            let prompt_text = if self.buffer.is_empty() {
                format!("{}> ", NAME)
            } else {
                format!("{}-> ", " ".repeat(NAME.len() - 1))
            };
            let line = match self.prompt.readline(&prompt_text)? {
                Some(line) => line,
                None => break, // Ctrl-D
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if self.buffer.is_empty() && trimmed.starts_with('.') {
                self.prompt.append_line(trimmed);
                if !self.handle_meta(trimmed)? {
                    break;
                }
                continue;
            }

            self.buffer.push_str(trimmed);
            self.buffer.push(' ');
            if trimmed.ends_with(';') {
                let sql = std::mem::take(&mut self.buffer).trim().to_string();
                self.prompt.append_line(&sql);
                self.submit(&Request::sql(&sql))?;
            }
        }
        echo("Bye");
        Ok(())
    }

    /// Runs one meta-command; returns false when the console should exit.
    fn handle_meta(&mut self, command: &str) -> Result<bool, Error> {
        match command {
            ".help" => echo(HELP),
            ".exit" => return Ok(false),
            ".tables" => self.submit(&Request::list_tables())?,
            ".ping" => self.submit(&Request::ping())?,
            other => echo(&format!(
                "Unknown command '{}'. Type .help for the list.",
                other
            )),
        }
        Ok(true)
    }

    fn submit(&mut self, request: &Request) -> Result<(), Error> {
        let json = serde_json::to_string(request)
            .map_err(|e| err!(Encoding, "Failed to encode request. {}", e))?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(err!(NotFound, "Server closed the connection."));
        }
        let response: Response = serde_json::from_str(line.trim())
            .map_err(|e| err!(Encoding, "Malformed response. {}", e))?;
        render(&response);
        Ok(())
    }
}

fn render(response: &Response) {
    if !response.success {
        echo(&format!(
            "Error: {}",
            response.error.as_deref().unwrap_or("unknown error")
        ));
        return;
    }
    if let (Some(columns), Some(rows)) = (&response.columns, &response.rows) {
        render_table(
            &columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>(),
            rows.iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        );
        echo(&format!("({} rows)", rows.len()));
        return;
    }
    if let Some(message) = &response.message {
        echo(message);
    }
    if matches!(
        response.kind,
        StatementKind::Insert | StatementKind::Update | StatementKind::Delete
    ) {
        if let Some(affected) = response.rows_affected {
            echo(&format!("{} rows affected.", affected));
        }
    }
}

/// Prints an aligned ASCII table.
fn render_table(headers: &[String], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        echo(&format!("| {} |", padded.join(" | ")));
    };

    let separator = format!(
        "+-{}-+",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-")
    );
    echo(&separator);
    line(&headers.to_vec());
    echo(&separator);
    for row in rows {
        line(&row);
    }
    echo(&separator);
}

/// Raw-mode-safe print: every newline gets a carriage return.
fn echo(text: &str) {
    for line in text.split('\n') {
        print!("{}\r\n", line);
    }
    let _ = io::stdout().flush();
}
