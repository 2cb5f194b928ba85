//! User interface module - interaction (prompts) and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - `console` - Where text is written to and answers are read from
//! - This module - [`IoUtils`], the output/prompt API the tasks use

pub mod console;
pub mod formatter;

pub use console::{Console, ScriptedConsole, StdConsole};
pub use formatter::Color;

use crate::error::{Halt, Result, Step};

/// Colored output and line-based prompts for one task invocation.
pub struct IoUtils {
    console: Box<dyn Console>,
    verbose: bool,
}

impl IoUtils {
    /// IoUtils on the process terminal
    pub fn new(verbose: bool) -> Self {
        Self::with_console(verbose, StdConsole::new())
    }

    /// IoUtils on an arbitrary console
    pub fn with_console(verbose: bool, console: impl Console + 'static) -> Self {
        IoUtils {
            console: Box::new(console),
            verbose,
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn emit(&mut self, text: &str, color: Color, newline: bool) {
        let tty = self.console.is_tty();
        let mut painted = formatter::paint(text, color, tty);
        if newline {
            painted.push('\n');
        }
        if let Err(e) = self.console.write(&painted) {
            tracing::warn!("Failed writing to terminal: {}", e);
        }
    }

    /// Print a line in the given color.
    pub fn print_output(&mut self, color: Color, message: &str) {
        self.emit(message, color, true);
    }

    /// Print a regular progress line.
    pub fn standard_output(&mut self, message: &str) {
        self.emit(message, Color::GreenBold, true);
    }

    /// Print an error line, prefixed with `ERROR: `.
    pub fn error_output(&mut self, message: &str) {
        self.emit(&formatter::format_error(message), Color::RedBold, true);
    }

    /// Print a debug line, prefixed with `DEBUG: `, only in verbose mode.
    pub fn verbose_output(&mut self, message: &str) {
        if self.verbose {
            self.emit(&formatter::format_verbose(message), Color::GrayLight, true);
        }
    }

    /// Print an error line and terminate the process with exit code 1.
    pub fn error_output_exit(&mut self, message: &str) -> ! {
        self.error_output(message);
        std::process::exit(1)
    }

    /// Show a prompt and read one trimmed line.
    ///
    /// Returns `Ok(None)` when the operator interrupted the prompt (Ctrl-C or end
    /// of input), letting the caller decide what an interruption means.
    pub fn ask(&mut self, message: &str) -> Result<Option<String>> {
        self.emit(&formatter::format_prompt(message), Color::White, false);
        let line = self.console.read_line()?;
        Ok(line.map(|l| l.trim().to_string()))
    }

    /// Show a prompt and read one trimmed line; an interruption cancels the task.
    pub fn prompt(&mut self, message: &str) -> Step<String> {
        match self.ask(message)? {
            Some(answer) => Ok(answer),
            None => Err(Halt::Cancel),
        }
    }

    /// Like [`prompt`](Self::prompt), lowercased, and the answer "exit" cancels.
    pub fn prompt_choice(&mut self, message: &str) -> Step<String> {
        let answer = self.prompt(message)?.to_lowercase();
        if answer == "exit" {
            return Err(Halt::Cancel);
        }
        Ok(answer)
    }
}
