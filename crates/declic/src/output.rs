//! The sink command bodies write to.
//!
//! Plain lines always print. `verbose`/`debug`/`trace` lines only print once
//! the `--verbose` counter reaches their tier.

use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("a table needs a header row")]
    EmptyTable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    #[default]
    Normal,
    Verbose,
    Debug,
    Trace,
}

impl Verbosity {
    pub fn from_count(count: u32) -> Self {
        match count {
            0 => Self::Normal,
            1 => Self::Verbose,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

/// Source of answers for yes/no questions.
pub trait Prompter {
    /// Read one answer line. The question has already been written.
    fn answer(&self) -> io::Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn answer(&self) -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

/// Always gives the same answer. Useful in tests and non-interactive runs.
#[derive(Debug, Clone)]
pub struct FixedAnswer(pub String);

impl FixedAnswer {
    pub fn yes() -> Self {
        Self("y".to_string())
    }

    pub fn no() -> Self {
        Self("n".to_string())
    }
}

impl Prompter for FixedAnswer {
    fn answer(&self) -> io::Result<String> {
        Ok(self.0.clone())
    }
}

/// Shared in-memory writer; clones see the same bytes.
#[derive(Debug, Clone, Default)]
pub struct Buffer(Rc<RefCell<Vec<u8>>>);

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Output {
    writer: RefCell<Box<dyn Write>>,
    prompter: Box<dyn Prompter>,
    verbosity: Cell<Verbosity>,
}

impl Default for Output {
    fn default() -> Self {
        Self::stdout()
    }
}

impl Output {
    pub fn new(writer: impl Write + 'static) -> Self {
        Self {
            writer: RefCell::new(Box::new(writer)),
            prompter: Box::new(StdinPrompter),
            verbosity: Cell::new(Verbosity::Normal),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// An output writing into a fresh [`Buffer`], returned alongside it.
    pub fn buffered() -> (Self, Buffer) {
        let buffer = Buffer::new();
        (Self::new(buffer.clone()), buffer)
    }

    pub fn with_prompter(mut self, prompter: impl Prompter + 'static) -> Self {
        self.prompter = Box::new(prompter);
        self
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity.get()
    }

    pub fn set_verbosity(&self, verbosity: Verbosity) {
        self.verbosity.set(verbosity);
    }

    fn write_str(&self, text: &str) {
        // Write failures (e.g. a closed pipe) are ignored.
        let mut writer = self.writer.borrow_mut();
        let _ = writer.write_all(text.as_bytes());
        let _ = writer.flush();
    }

    pub fn print(&self, message: impl Display) {
        self.write_str(&message.to_string());
    }

    pub fn println(&self, message: impl Display) {
        self.write_str(&format!("{message}\n"));
    }

    pub fn info(&self, message: impl Display) {
        self.write_str(&format!("Info: {message}\n"));
    }

    pub fn warn(&self, message: impl Display) {
        self.write_str(&format!("Warning: {message}\n"));
    }

    pub fn error(&self, message: impl Display) {
        self.write_str(&format!("Error: {message}\n"));
    }

    pub fn verbose(&self, message: impl Display) {
        if self.verbosity() >= Verbosity::Verbose {
            self.write_str(&format!("{message}\n"));
        }
    }

    pub fn debug(&self, message: impl Display) {
        if self.verbosity() >= Verbosity::Debug {
            self.write_str(&format!("Debug: {message}\n"));
        }
    }

    pub fn trace(&self, message: impl Display) {
        if self.verbosity() >= Verbosity::Trace {
            self.write_str(&format!("Trace: {message}\n"));
        }
    }

    /// Render rows as aligned columns. The first row is the header and gets a
    /// dashed underline.
    pub fn table<R, S>(&self, rows: &[R]) -> Result<(), OutputError>
    where
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        let Some(header) = rows.first() else {
            return Err(OutputError::EmptyTable);
        };
        let columns = rows.iter().map(|r| r.as_ref().len()).max().unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for row in rows {
            for (i, cell) in row.as_ref().iter().enumerate() {
                widths[i] = widths[i].max(cell.as_ref().chars().count());
            }
        }

        let mut out = String::new();
        let mut push_row = |cells: Vec<&str>| {
            let line: Vec<String> = cells
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{cell:width$}", width = widths[i]))
                .collect();
            out.push_str(line.join("  ").trim_end());
            out.push('\n');
        };

        push_row(header.as_ref().iter().map(|c| c.as_ref()).collect());
        let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_row(dashes.iter().map(String::as_str).collect());
        for row in &rows[1..] {
            push_row(row.as_ref().iter().map(|c| c.as_ref()).collect());
        }

        self.write_str(&out);
        Ok(())
    }

    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), OutputError> {
        let text = serde_json::to_string(value)?;
        self.write_str(&format!("{text}\n"));
        Ok(())
    }

    pub fn json_pretty<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), OutputError> {
        let text = serde_json::to_string_pretty(value)?;
        self.write_str(&format!("{text}\n"));
        Ok(())
    }

    pub fn yaml<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), OutputError> {
        let text = serde_yaml::to_string(value)?;
        self.write_str(&text);
        Ok(())
    }

    /// Ask a yes/no question; anything but an answer starting with `y` is a no.
    pub fn confirm(&self, question: impl Display) -> Result<bool, OutputError> {
        self.write_str(&format!("{question} [y/N] "));
        let answer = self.prompter.answer()?;
        let yes = answer.trim().to_ascii_lowercase().starts_with('y');
        if !answer.ends_with('\n') {
            self.write_str("\n");
        }
        Ok(yes)
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("verbosity", &self.verbosity())
            .finish_non_exhaustive()
    }
}
