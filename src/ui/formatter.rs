//! Pure formatting functions for UI output.
//!
//! Nothing here touches a stream; the [`Console`](super::console::Console)
//! implementations decide where the formatted text goes.

use console::Style;

/// Output colors used by the release tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Regular progress output
    GreenBold,
    /// Errors and warnings the operator must act on
    RedBold,
    /// Prompts
    White,
    /// Verbose/debug output
    GrayLight,
}

impl Color {
    fn style(&self) -> Style {
        match self {
            Color::GreenBold => Style::new().green().bold(),
            Color::RedBold => Style::new().red().bold(),
            Color::White => Style::new().white(),
            Color::GrayLight => Style::new().color256(250),
        }
    }
}

/// Apply `color` to `text` when writing to a terminal, otherwise return it unchanged.
pub fn paint(text: &str, color: Color, tty: bool) -> String {
    if tty {
        color.style().force_styling(true).apply_to(text).to_string()
    } else {
        text.to_string()
    }
}

/// Format an error line.
pub fn format_error(message: &str) -> String {
    format!("ERROR: {}", message)
}

/// Format a verbose line.
pub fn format_verbose(message: &str) -> String {
    format!("DEBUG: {}", message)
}

/// Format a prompt; prompts are followed by a single space, not a newline.
pub fn format_prompt(message: &str) -> String {
    format!("{} ", message)
}

/// Indent every line by four spaces, one line per entry.
pub fn indent_lines(lines: &[String]) -> String {
    lines.iter().map(|line| format!("    {}\n", line)).collect()
}
