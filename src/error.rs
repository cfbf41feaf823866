// Shared diagnostic sink plus the taxonomy of things that can go wrong
// while running a Lox program.
//
// One `Diagnostics` is created per run (one per file, one per REPL line) so
// that `had_error` never leaks state across independent inputs.

use std::cell::Cell;
use std::io;

use log::error as log_error;
use thiserror::Error as ThisError;

use crate::object::Object;
use crate::token::{Token, TokenType};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("parse error")]
    Parse,

    #[error("{message}")]
    Runtime { token: Token, message: String },

    // Non-local exit used to carry a `return` value up to its call site.
    // Never surfaced to the user; always caught where a function call
    // invokes its body.
    #[error("return signal escaped its enclosing function call")]
    Return { value: Object },
}

pub struct Diagnostics {
    source: String,
    had_error: Cell<bool>,
}

impl Diagnostics {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            had_error: Cell::new(false),
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error.get()
    }

    /// Illegal character / unterminated string: the scanner has no span,
    /// only a line.
    pub fn lex_error(&self, line: i32, message: &str) {
        self.report(line, "", message);
        log_error!("lex error at line {line}: {message}");
    }

    /// Parse and resolve errors: underline the offending token's span
    /// beneath its source line.
    pub fn token_error(&self, token: &Token, message: &str) {
        let location = if token.token_type == TokenType::Eof {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        self.underline(token.line, token.start, token.end);
        self.report(token.line, &location, message);
        log_error!("static error at line {}: {message}", token.line);
    }

    /// Runtime errors: reported without a source excerpt, in the book's
    /// "message\n[line N]" style, since they fire mid-evaluation rather
    /// than during a static walk of the source.
    pub fn runtime_error(&self, token: &Token, message: &str) {
        eprintln!("{message}\n[line {}]", token.line);
        self.had_error.set(true);
        log_error!("runtime error at line {}: {message}", token.line);
    }

    fn report(&self, line: i32, location: &str, message: &str) {
        eprintln!("[line {line}] Error{location}: {message}");
        self.had_error.set(true);
    }

    fn underline(&self, line: i32, start: usize, end: usize) {
        if let Some((line_start, line_end)) = self.line_bounds(line) {
            let text = &self.source[line_start..line_end];
            let col = start.saturating_sub(line_start);
            let width = end.saturating_sub(start).max(1);
            eprintln!("{text}");
            eprintln!("{}{}", " ".repeat(col), "^".repeat(width));
        }
    }

    /// Byte range `[start, end)` of the 1-indexed source line, not
    /// including its trailing newline.
    fn line_bounds(&self, line: i32) -> Option<(usize, usize)> {
        let mut current_line = 1;
        let mut line_start = 0;
        for (idx, ch) in self.source.char_indices() {
            if ch == '\n' {
                if current_line == line {
                    return Some((line_start, idx));
                }
                current_line += 1;
                line_start = idx + 1;
            }
        }
        if current_line == line {
            Some((line_start, self.source.len()))
        } else {
            None
        }
    }
}
