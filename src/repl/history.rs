//! Persistent command history for the console: one entry per line in a
//! dotfile, loaded once at startup and appended to as commands are
//! submitted.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug)]
pub struct History {
    path: PathBuf,
    entries: Vec<String>,
}

impl History {
    /// Opens the history file named `filename` in the user's home directory
    /// (the current directory when no home is known).
    pub fn load(filename: &str) -> Self {
        let path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(filename);
        Self::open_at(path)
    }

    /// Opens history at an explicit path. A missing or unreadable file
    /// simply starts empty.
    pub fn open_at(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => Vec::new(),
        };
        History { path, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    /// Records a submitted command in memory and appends it to the file.
    /// Blank input is ignored.
    pub fn push(&mut self, line: &str) -> io::Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        self.entries.push(line.to_string());

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn pushed_commands_survive_a_reload() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        let mut history = History::open_at(path.clone());
        history.push("SELECT 1;").unwrap();
        history.push("  .tables  ").unwrap();
        history.push("   ").unwrap();

        let reloaded = History::open_at(path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.entry(0), Some("SELECT 1;"));
        assert_eq!(reloaded.entry(1), Some(".tables"));
        assert_eq!(reloaded.entry(2), None);
    }

    #[test]
    fn missing_file_starts_empty() {
        let history = History::open_at(PathBuf::from("/nonexistent/path/test_history"));
        assert_eq!(history.len(), 0);
    }
}
