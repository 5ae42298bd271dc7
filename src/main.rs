#[macro_use]
mod errors;
mod database;
mod executor;
mod repl;
mod server;
mod sql;
mod storage;
mod wire;

use clap::Parser;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "minisql",
    version = VERSION,
    about = "Tiny SQL database with a paged B+Tree storage engine."
)]
struct Cli {
    /// Start the database server instead of the interactive client.
    #[arg(long, short, env = "MINISQL_SERVER", default_value = "false")]
    server: bool,

    /// Path of the database file (server mode).
    #[arg(long, env = "MINISQL_DB", default_value = "db")]
    db: PathBuf,

    /// Port to listen on (server mode).
    #[arg(long, env = "MINISQL_PORT", default_value = "8080")]
    port: u16,

    /// Server address to connect to (client mode).
    #[arg(short = 'a', env = "MINISQL_ADDR", default_value = ":8080")]
    addr: String,
}

/// Verbosity comes from LOG_LEVEL (debug|info|warn|error), defaulting to
/// info.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"))
}

fn main() {
    let cli = Cli::parse();

    if cli.server {
        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(env_filter())
            .init();
        if let Err(e) = server::run(&cli.db, cli.port) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // The client owns the terminal, so its logs go to a file.
    if let Ok(file) = OpenOptions::new()
        .append(true)
        .create(true)
        .open("minisql.log")
    {
        tracing_subscriber::fmt()
            .with_writer(file)
            .with_ansi(false)
            .with_env_filter(env_filter())
            .init();
    }

    match repl::start(&cli.addr) {
        Ok(_) => (),
        Err(errors::Error::Io(e)) if e.kind() == io::ErrorKind::Interrupted => (), // Silence Ctrl+C
        Err(e) => println!("\nError: {}", e),
    }
}
