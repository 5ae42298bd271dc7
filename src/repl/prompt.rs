use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::{self, Color, SetForegroundColor},
    terminal,
};
use std::io::{self, Write};
use tracing::warn;

use super::history::History;

const NAME: &str = env!("CARGO_PKG_NAME");

/// A raw-mode line editor with persistent history.
#[derive(Debug)]
pub struct Prompt {
    history: History,
    history_index: usize,
    /// Stashes the in-progress line while browsing history.
    pending: String,
}

impl Prompt {
    /// Creates a new Prompt instance with history loaded from the user's
    /// home directory.
    pub fn new() -> Self {
        let history = History::load(&format!(".{}_history", NAME));
        let history_index = history.len();

        Self {
            history,
            history_index,
            pending: String::new(),
        }
    }

    /// Records a submitted line in the command history.
    pub fn append_line(&mut self, line: &str) {
        if let Err(e) = self.history.push(line) {
            warn!("Failed to save history: {}", e);
        }
        self.history_index = self.history.len();
    }

    /// Reads one line of input with editing, arrow-key history, Ctrl-C
    /// (clears the line) and Ctrl-D (returns `None`).
    pub fn readline(&mut self, prompt_text: &str) -> io::Result<Option<String>> {
        let mut input = String::new();
        let mut cursor_pos = 0usize;
        self.history_index = self.history.len();
        self.pending.clear();
        self.render(prompt_text, &input, cursor_pos)?;

        loop {
            let key = match event::read()? {
                Event::Key(key) => key,
                _ => continue,
            };
            let KeyEvent {
                code, modifiers, ..
            } = key;
            match (code, modifiers) {
                (KeyCode::Enter, _) => {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(Some(input));
                }
                (KeyCode::Char('d'), KeyModifiers::CONTROL) => {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(None);
                }
                (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                    print!("^C\r\n");
                    io::stdout().flush()?;
                    return Ok(Some(String::new()));
                }
                (KeyCode::Up, _) => {
                    if self.history_index > 0 {
                        if self.history_index == self.history.len() {
                            self.pending = input.clone();
                        }
                        self.history_index -= 1;
                        if let Some(entry) = self.history.entry(self.history_index) {
                            input = entry.to_string();
                            cursor_pos = input.len();
                        }
                    }
                }
                (KeyCode::Down, _) => {
                    if self.history_index < self.history.len() {
                        self.history_index += 1;
                        input = match self.history.entry(self.history_index) {
                            Some(entry) => entry.to_string(),
                            None => self.pending.clone(),
                        };
                        cursor_pos = input.len();
                    }
                }
                (KeyCode::Backspace, _) => {
                    if cursor_pos > 0 {
                        cursor_pos -= 1;
                        input.remove(cursor_pos);
                    }
                }
                (KeyCode::Left, _) => {
                    cursor_pos = cursor_pos.saturating_sub(1);
                }
                (KeyCode::Right, _) => {
                    if cursor_pos < input.len() {
                        cursor_pos += 1;
                    }
                }
                (KeyCode::Home, _) => {
                    cursor_pos = 0;
                }
                (KeyCode::End, _) => {
                    cursor_pos = input.len();
                }
                (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                    input.insert(cursor_pos, c);
                    cursor_pos += 1;
                }
                _ => {}
            }
            self.render(prompt_text, &input, cursor_pos)?;
        }
    }

    /// Redraws the prompt line and positions the cursor.
    fn render(&self, prompt_text: &str, input: &str, cursor_pos: usize) -> io::Result<()> {
        execute!(
            io::stdout(),
            cursor::MoveToColumn(0),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::SetAttribute(style::Attribute::Bold),
            SetForegroundColor(Color::Green),
            style::Print(prompt_text),
            style::SetAttribute(style::Attribute::Reset),
            style::Print(input),
            cursor::MoveToColumn((prompt_text.len() + cursor_pos) as u16),
        )?;
        io::stdout().flush()
    }
}
