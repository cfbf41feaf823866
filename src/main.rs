mod class;
mod environment;
mod error;
mod function;
mod interpreter;
mod object;
mod parser;
mod resolver;
mod scanner;
mod syntax;
mod token;

use std::fs;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use error::{Diagnostics, Error};
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// A tree-walking interpreter for Lox.
#[derive(ClapParser)]
#[command(name = "lox", version, about)]
struct Cli {
    /// Script to run. Omit to start an interactive prompt.
    script: Option<String>,
}

struct Lox {
    interpreter: Interpreter,
}

impl Lox {
    fn new() -> Self {
        Lox {
            interpreter: Interpreter::new(),
        }
    }

    /// Runs one chunk of source (a whole file, or one REPL line) through
    /// the full pipeline. Returns whether anything went wrong, so the
    /// caller can decide on an exit code without this function knowing
    /// whether it's being run once (file mode) or in a loop (REPL).
    fn run(&mut self, source: String) -> RunOutcome {
        let diagnostics = Diagnostics::new(source.clone());

        let tokens = Scanner::new(source, &diagnostics).scan_tokens();
        let statements = Parser::new(&tokens, &diagnostics).parse();

        if diagnostics.had_error() {
            return RunOutcome::ParseError;
        }

        // Skip the resolver's side-effects on `self.interpreter` entirely if
        // parsing already failed; running over a source tree with holes
        // from error recovery would just produce noise.
        Resolver::new(&mut self.interpreter, &diagnostics).resolve_stmts(&statements);

        if diagnostics.had_error() {
            return RunOutcome::ParseError;
        }

        self.interpreter.interpret(&statements, &diagnostics);

        if diagnostics.had_error() {
            RunOutcome::RuntimeError
        } else {
            RunOutcome::Ok
        }
    }

    fn run_file(&mut self, path: &str) -> Result<RunOutcome, Error> {
        let contents = fs::read_to_string(path)?;
        Ok(self.run(contents))
    }

    fn run_prompt(&mut self) -> Result<(), Error> {
        let mut editor = DefaultEditor::new().expect("failed to initialize line editor");

        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    // A runtime or parse error in one REPL line doesn't end
                    // the session, it just leaves globals as they were.
                    self.run(line);
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    log::error!("readline error: {err}");
                    break;
                }
            }
        }

        Ok(())
    }
}

enum RunOutcome {
    Ok,
    ParseError,
    RuntimeError,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let mut lox = Lox::new();

    match cli.script {
        Some(path) => match lox.run_file(&path) {
            Ok(RunOutcome::Ok) => ExitCode::SUCCESS,
            Ok(RunOutcome::ParseError) => ExitCode::from(65),
            Ok(RunOutcome::RuntimeError) => ExitCode::from(70),
            Err(err) => {
                eprintln!("{err}");
                ExitCode::from(74)
            }
        },
        None => match lox.run_prompt() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        },
    }
}
