//! Changelog file parsing, writing and interactive editing.
//!
//! A changelog file is split into three parts:
//!
//! ```text
//! Changelog              <- header: the title and its `=` underline
//! =========
//!
//! - Unreleased change    <- message: details built up since the last release
//!
//! 1.2.3 (2024-01-31)     <- footer: every released section, untouched
//! ------------------
//! - Released change
//! ```

use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::context::TaskContext;
use crate::error::{ReleaseError, Result, Step};
use crate::git::SourceControl;
use crate::ui::formatter::indent_lines;

pub const EDITOR_ENV_VAR: &str = "INVOKE_RELEASE_EDITOR";
const DEFAULT_EDITOR: &str = "vim";
const EDITOR_HINT: &str = " Try setting $INVOKE_RELEASE_EDITOR or $EDITOR in your shell profile to the \
                           full path to Vim or another editor.";
const NO_DETAILS: &str = "(No changelog details)";

/// The three sections of a changelog file, as lines without line endings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Changelog {
    pub header: Vec<String>,
    pub message: Vec<String>,
    pub footer: Vec<String>,
}

fn is_underline(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c == '=')
}

fn is_release_heading(line: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d+\.\d+\.\d+\S*\s+\(\d{4}-\d{2}-\d{2}\)\s*$").expect("valid release heading regex")
    })
    .is_match(line)
}

fn trim_blank_lines(lines: &[String]) -> Vec<String> {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].to_vec(),
        _ => Vec::new(),
    }
}

impl Changelog {
    /// Split changelog text into header, unreleased message and released footer.
    ///
    /// The header is the first title with its `=` underline (and optional
    /// overline); a file without one has an empty header.
    pub fn parse(text: &str) -> Self {
        let lines: Vec<String> = text.lines().map(|l| l.trim_end_matches('\r').to_string()).collect();

        let first = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(lines.len());
        let line_at = |i: usize| lines.get(i).map(String::as_str).unwrap_or("");

        let header_end = if !is_underline(line_at(first)) && is_underline(line_at(first + 1)) {
            Some(first + 2)
        } else if is_underline(line_at(first))
            && !line_at(first + 1).trim().is_empty()
            && !is_underline(line_at(first + 1))
            && is_underline(line_at(first + 2))
        {
            Some(first + 3)
        } else {
            None
        };

        let (header, rest) = match header_end {
            Some(end) => (lines[first..end].to_vec(), &lines[end..]),
            None => (Vec::new(), &lines[..]),
        };

        let footer_start = rest.iter().position(|l| is_release_heading(l)).unwrap_or(rest.len());

        Changelog {
            header,
            message: trim_blank_lines(&rest[..footer_start]),
            footer: rest[footer_start..].to_vec(),
        }
    }

    /// Render the file with `message` released as `version` on `date`
    pub fn render(&self, version: &str, date: &str) -> String {
        let heading = format!("{} ({})", version, date);
        let mut out = String::new();

        for line in &self.header {
            out.push_str(line);
            out.push('\n');
        }
        if !self.header.is_empty() {
            out.push('\n');
        }

        out.push_str(&heading);
        out.push('\n');
        out.push_str(&"-".repeat(heading.chars().count()));
        out.push('\n');

        if self.message.is_empty() {
            out.push_str(NO_DETAILS);
            out.push('\n');
        } else {
            for line in &self.message {
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('\n');

        for line in &self.footer {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Read and parse a changelog file
pub fn read_changelog_file(path: &Path) -> Result<Changelog> {
    let text = fs::read_to_string(path).map_err(|e| {
        ReleaseError::failure(format!("Failed to read changelog file {}: {}", path.display(), e))
    })?;
    Ok(Changelog::parse(&text))
}

/// Rewrite the configured changelog file, releasing the changelog's message as `version` today.
pub fn write_to_changelog_file(ctx: &mut TaskContext<'_>, version: &str, changelog: &Changelog) -> Result<()> {
    let path = &ctx.config.changelog_file_name;
    ctx.io
        .verbose_output(&format!("Writing changelog contents to {}", path.display()));

    if !path.is_file() {
        return Err(ReleaseError::failure(format!(
            "Failed to find changelog file: {}",
            path.display()
        )));
    }

    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    fs::write(path, changelog.render(version, &today))?;

    ctx.io.verbose_output("Finished writing to changelog.");
    Ok(())
}

/// Split a command line into words, honoring single quotes, double quotes and backslash escapes.
pub fn split_command_line(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') => match chars.next() {
                Some(next @ ('"' | '\\' | '$' | '`')) => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => current.push('\\'),
            },
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

/// The editor command line: `$INVOKE_RELEASE_EDITOR`, then `$EDITOR`, then `vim`.
pub fn editor_command() -> Vec<String> {
    [EDITOR_ENV_VAR, "EDITOR"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .map(|value| split_command_line(&value))
        .find(|words| !words.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_EDITOR.to_string()])
}

/// Open `path` in the operator's editor and wait for it to exit.
pub fn open_editor(path: &Path) -> Result<()> {
    let command = editor_command();
    let (program, args) = match command.split_first() {
        Some((program, args)) => (program.as_str(), args),
        None => (DEFAULT_EDITOR, &[][..]),
    };
    debug!(program, ?args, path = %path.display(), "opening editor");

    let status = Command::new(program).args(args).arg(path).status().map_err(|e| {
        let code = e.raw_os_error().unwrap_or(0);
        let message = e.to_string();
        let message = message
            .strip_suffix(&format!(" (os error {})", code))
            .unwrap_or(&message)
            .to_string();
        ReleaseError::failure(format!(
            "Failed to open editor `{}` due to error: {} (err {}).{}",
            program, message, code, EDITOR_HINT
        ))
    })?;

    if !status.success() {
        return Err(ReleaseError::failure(format!(
            "Failed to open editor `{}` due to return code: {}.{}",
            program,
            status.code().unwrap_or(-1),
            EDITOR_HINT
        )));
    }
    Ok(())
}

fn editor_instructions(changelog_name: &str) -> [String; 5] {
    [
        "# Enter your changelog message above this comment, then save and close editor when finished.".to_string(),
        format!(
            "# Any existing contents were pulled from changes to {} since the last release.",
            changelog_name
        ),
        "# Leave it blank (delete all existing contents) to release with no changelog details.".to_string(),
        "# All lines starting with \"#\" are comments and ignored.".to_string(),
        "# As a best practice, if you are entering multiple items as a list, prefix each item with a \"-\"."
            .to_string(),
    ]
}

/// Build the text the editor opens with
fn editor_contents(lines: &[String], changelog_name: &str) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    for line in editor_instructions(changelog_name) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Read back what the operator saved, dropping comment lines
fn parse_editor_contents(text: &str) -> Vec<String> {
    let lines: Vec<String> = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.starts_with('#'))
        .map(str::to_string)
        .collect();
    trim_blank_lines(&lines)
}

fn edit_message(ctx: &TaskContext<'_>, initial: &[String]) -> Result<Vec<String>> {
    let changelog_name = ctx
        .config
        .changelog_file_name
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ctx.config.changelog_file_name.display().to_string());

    let mut file = tempfile::Builder::new()
        .prefix("CHANGELOG-")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(editor_contents(initial, &changelog_name).as_bytes())?;
    file.flush()?;

    open_editor(file.path())?;

    let text = fs::read_to_string(file.path())?;
    Ok(parse_editor_contents(&text))
}

/// Ask whether to gather commit titles, then open the editor on the combined message.
fn gather_and_edit(
    ctx: &mut TaskContext<'_>,
    source: &dyn SourceControl,
    existing: &[String],
    also: bool,
) -> Step<Vec<String>> {
    let (also, y_n) = if also { (" also", "y/N") } else { ("", "Y/n") };
    let answer = ctx.io.prompt_choice(&format!(
        "Would you like to{} gather commit messages from recent commits and add them to the changelog? ({}/exit):",
        also, y_n
    ))?;
    let gather = if y_n == "y/N" {
        answer.starts_with('y')
    } else {
        !answer.starts_with('n')
    };

    let mut lines: Vec<String> = Vec::new();
    if gather {
        lines.extend(
            source
                .gather_commit_messages_since_last_release()?
                .into_iter()
                .map(|title| format!("- {}", title)),
        );
    }
    lines.extend(existing.iter().cloned());

    Ok(edit_message(ctx, &lines)?)
}

/// Interactively decide the changelog message for the upcoming release.
///
/// Existing built-up details can be edited, accepted, replaced or deleted;
/// otherwise the operator is offered a fresh message. The returned changelog
/// keeps the file's header and footer.
pub fn prompt_for_changelog(ctx: &mut TaskContext<'_>, source: &dyn SourceControl) -> Step<Changelog> {
    let mut changelog = read_changelog_file(&ctx.config.changelog_file_name)?;

    if changelog.message.is_empty() {
        let answer = ctx
            .io
            .prompt_choice("Would you like to enter changelog details for this release? (Y/n/exit):")?;
        if !answer.starts_with('n') {
            changelog.message = gather_and_edit(ctx, source, &[], false)?;
        }
        return Ok(changelog);
    }

    ctx.io.standard_output(&format!(
        "There are existing changelog details for this release:\n{}",
        indent_lines(&changelog.message)
    ));
    ctx.io.standard_output(
        "You can \"edit\" the changes, \"accept\" them as-is, delete them and create a \"new\" changelog \
         message, or \"delete\" them and enter no changelog.",
    );

    loop {
        let instruction = ctx
            .io
            .prompt_choice("How would you like to proceed? (EDIT/new/accept/delete/exit):")?;
        match instruction.as_str() {
            "" | "edit" => {
                let existing = std::mem::take(&mut changelog.message);
                changelog.message = gather_and_edit(ctx, source, &existing, true)?;
                return Ok(changelog);
            }
            "new" => {
                changelog.message = gather_and_edit(ctx, source, &[], false)?;
                return Ok(changelog);
            }
            "accept" => return Ok(changelog),
            "delete" => {
                changelog.message.clear();
                return Ok(changelog);
            }
            _ => ctx
                .io
                .error_output("Invalid response. Please enter edit, new, accept, delete or exit."),
        }
    }
}
